//! Outbound command serialization.
//!
//! `Display` renders the wire form of a command without the line terminator;
//! the codec appends `\r\n`.

use std::fmt::{self, Write};

/// CTCP delimiter used to wrap `ACTION` messages.
pub const CTCP_DELIM: char = '\x01';

/// An outbound protocol command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `PASS <password>`
    Pass(String),
    /// `NICK <nick>`
    Nick(String),
    /// `USER <user> 0 * :<realname>`
    User {
        /// Username (ident).
        user: String,
        /// Real name (free text).
        realname: String,
    },
    /// `JOIN <channel> [key]`
    Join {
        /// Channel to join.
        channel: String,
        /// Optional channel key.
        key: Option<String>,
    },
    /// `PART <channel> [:reason]`
    Part {
        /// Channel to leave.
        channel: String,
        /// Optional reason.
        reason: Option<String>,
    },
    /// `PRIVMSG <target> :<text>`
    Privmsg {
        /// Channel or nick.
        target: String,
        /// Message text.
        text: String,
    },
    /// `NOTICE <target> :<text>`
    Notice {
        /// Channel or nick.
        target: String,
        /// Notice text.
        text: String,
    },
    /// CTCP `ACTION` carried in a `PRIVMSG`.
    Action {
        /// Channel or nick.
        target: String,
        /// Action text (the `/me` part).
        text: String,
    },
    /// `MODE <target> [args...]`
    Mode {
        /// Channel or nick.
        target: String,
        /// Mode string followed by its parameters.
        args: Vec<String>,
    },
    /// `KICK <channel> <nick> [:reason]`
    Kick {
        /// Channel.
        channel: String,
        /// Nick to remove.
        nick: String,
        /// Optional reason.
        reason: Option<String>,
    },
    /// `QUIT [:message]`
    Quit(Option<String>),
    /// `PING :<token>`
    Ping(String),
    /// `PONG :<token>`
    Pong(String),
    /// A pre-formatted line, sent verbatim.
    Raw(String),
}

/// Whether a final parameter must be sent in trailing form.
fn needs_colon_prefix(param: &str) -> bool {
    param.is_empty() || param.contains(' ') || param.starts_with(':')
}

/// Write `cmd` and its parameters; the last one becomes trailing only if it must.
fn write_cmd(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    let Some((last, middle)) = args.split_last() else {
        return Ok(());
    };
    for arg in middle {
        f.write_char(' ')?;
        f.write_str(arg)?;
    }
    f.write_char(' ')?;
    if needs_colon_prefix(last) {
        f.write_char(':')?;
    }
    f.write_str(last)
}

/// Write `cmd` and its parameters; the last one is always trailing.
fn write_cmd_freeform(f: &mut fmt::Formatter<'_>, cmd: &str, args: &[&str]) -> fmt::Result {
    f.write_str(cmd)?;
    let Some((last, middle)) = args.split_last() else {
        return Ok(());
    };
    for arg in middle {
        f.write_char(' ')?;
        f.write_str(arg)?;
    }
    f.write_str(" :")?;
    f.write_str(last)
}

impl Command {
    /// The command token this serializes to.
    pub fn token(&self) -> &str {
        match self {
            Command::Pass(_) => "PASS",
            Command::Nick(_) => "NICK",
            Command::User { .. } => "USER",
            Command::Join { .. } => "JOIN",
            Command::Part { .. } => "PART",
            Command::Privmsg { .. } | Command::Action { .. } => "PRIVMSG",
            Command::Notice { .. } => "NOTICE",
            Command::Mode { .. } => "MODE",
            Command::Kick { .. } => "KICK",
            Command::Quit(_) => "QUIT",
            Command::Ping(_) => "PING",
            Command::Pong(_) => "PONG",
            Command::Raw(line) => line.split(' ').next().unwrap_or_default(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(p) => write_cmd(f, "PASS", &[p]),
            Command::Nick(n) => write_cmd(f, "NICK", &[n]),
            Command::User { user, realname } => {
                write_cmd_freeform(f, "USER", &[user, "0", "*", realname])
            }
            Command::Join { channel, key: Some(k) } => write_cmd(f, "JOIN", &[channel, k]),
            Command::Join { channel, key: None } => write_cmd(f, "JOIN", &[channel]),
            Command::Part { channel, reason: Some(r) } => {
                write_cmd_freeform(f, "PART", &[channel, r])
            }
            Command::Part { channel, reason: None } => write_cmd(f, "PART", &[channel]),
            Command::Privmsg { target, text } => write_cmd_freeform(f, "PRIVMSG", &[target, text]),
            Command::Notice { target, text } => write_cmd_freeform(f, "NOTICE", &[target, text]),
            Command::Action { target, text } => write!(
                f,
                "PRIVMSG {} :{}ACTION {}{}",
                target, CTCP_DELIM, text, CTCP_DELIM
            ),
            Command::Mode { target, args } => {
                let mut params: Vec<&str> = Vec::with_capacity(args.len() + 1);
                params.push(target);
                params.extend(args.iter().map(String::as_str));
                write_cmd(f, "MODE", &params)
            }
            Command::Kick { channel, nick, reason: Some(r) } => {
                write_cmd_freeform(f, "KICK", &[channel, nick, r])
            }
            Command::Kick { channel, nick, reason: None } => write_cmd(f, "KICK", &[channel, nick]),
            Command::Quit(Some(m)) => write_cmd_freeform(f, "QUIT", &[m]),
            Command::Quit(None) => f.write_str("QUIT"),
            Command::Ping(t) => write_cmd_freeform(f, "PING", &[t]),
            Command::Pong(t) => write_cmd_freeform(f, "PONG", &[t]),
            Command::Raw(line) => f.write_str(line),
        }
    }
}
