//! Message origin (the `:prefix` of a protocol line).
//!
//! An origin is either a server name or a user's `nick!user@host` mask.

use std::fmt;
use std::str::FromStr;

/// Where a line came from.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Origin {
    /// A user mask, e.g. `nick!user@host`.
    User {
        /// Nickname.
        nick: String,
        /// Username (ident), empty when absent.
        user: String,
        /// Hostname, empty when absent.
        host: String,
    },
    /// A server name, e.g. `irc.example.net`.
    Server {
        /// Server host name.
        host: String,
    },
}

impl Origin {
    /// Build a user origin.
    pub fn user(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Origin::User {
            nick: nick.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// Build a server origin.
    pub fn server(host: impl Into<String>) -> Self {
        Origin::Server { host: host.into() }
    }

    /// Parse prefix text (without the leading `:`).
    ///
    /// Lenient: `!` or `@` makes a user mask and any bare token is a server
    /// name, dotted or not.
    pub fn parse(s: &str) -> Self {
        if s.contains('!') || s.contains('@') {
            let (before_at, host) = match s.split_once('@') {
                Some((before, host)) => (before, host),
                None => (s, ""),
            };
            let (nick, user) = match before_at.split_once('!') {
                Some((nick, user)) => (nick, user),
                None => (before_at, ""),
            };
            Origin::user(nick, user, host)
        } else {
            Origin::server(s)
        }
    }

    /// Nickname, if this is a user origin.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Origin::User { nick, .. } if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }

    /// Host part of either variant, if non-empty.
    pub fn host(&self) -> Option<&str> {
        match self {
            Origin::User { host, .. } | Origin::Server { host } if !host.is_empty() => Some(host),
            _ => None,
        }
    }
}

impl FromStr for Origin {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Origin::parse(s))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Server { host } => f.write_str(host),
            Origin::User { nick, user, host } => match (&user[..], &host[..]) {
                ("", "") => write!(f, "{}", nick),
                (user, "") => write!(f, "{}!{}", nick, user),
                ("", host) => write!(f, "{}@{}", nick, host),
                (user, host) => write!(f, "{}!{}@{}", nick, user, host),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mask() {
        let origin = Origin::parse("nick!user@host.example");
        assert_eq!(origin, Origin::user("nick", "user", "host.example"));
        assert_eq!(origin.nick(), Some("nick"));
        assert_eq!(origin.host(), Some("host.example"));
        assert_eq!(origin.to_string(), "nick!user@host.example");
    }

    #[test]
    fn test_server_name() {
        let origin = Origin::parse("irc.example.net");
        assert_eq!(origin, Origin::server("irc.example.net"));
        assert_eq!(origin.nick(), None);
        assert_eq!(origin.to_string(), "irc.example.net");
    }

    #[test]
    fn test_dotless_server_name() {
        let origin = Origin::parse("localhost");
        assert_eq!(origin, Origin::server("localhost"));
        assert_eq!(origin.nick(), None);
        assert_eq!(origin.host(), Some("localhost"));
    }

    #[test]
    fn test_partial_masks() {
        assert_eq!(Origin::parse("nick@host"), Origin::user("nick", "", "host"));
        assert_eq!(Origin::parse("nick!user"), Origin::user("nick", "user", ""));
        assert_eq!(Origin::parse("nick@host").to_string(), "nick@host");
    }
}
