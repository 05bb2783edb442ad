//! Hook declarations: what a module subscribes to and how it is called.
//!
//! A [`Hook`] binds one handler to either a list of event names or a
//! predicate over channel/private messages. Predicate hooks are installed on
//! `PRIVMSG` and filter before calling their handler, so every installed
//! handler has the same `Fn(&Event)` shape.

use parking_lot::RwLock;
use regex::{Captures, Regex};
use relaybot_proto::Event;
use std::sync::Arc;

/// Handler installed in the hook table.
pub type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Handler for a matched bot command.
pub type CommandHandler = Arc<dyn Fn(&Event, &CommandMatch) -> anyhow::Result<()> + Send + Sync>;

/// Handler for a matched message pattern.
pub type PatternHandler =
    Arc<dyn Fn(&Event, &Captures<'_>) -> anyhow::Result<()> + Send + Sync>;

/// The bot's current nickname, shared with command matchers.
#[derive(Debug, Clone)]
pub struct NickHandle(Arc<RwLock<String>>);

impl NickHandle {
    pub fn new(nick: impl Into<String>) -> Self {
        Self(Arc::new(RwLock::new(nick.into())))
    }

    pub fn get(&self) -> String {
        self.0.read().clone()
    }

    pub fn set(&self, nick: impl Into<String>) {
        *self.0.write() = nick.into();
    }
}

/// What a command hook responds to.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Command word, without the prefix.
    pub name: String,
    /// Minimum number of whitespace-separated arguments.
    pub min_args: usize,
    /// Fire on messages sent straight to the bot.
    pub allow_private: bool,
    /// Fire on `<nick>: <command>` addressing.
    pub allow_highlight: bool,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_args: 0,
            allow_private: true,
            allow_highlight: true,
        }
    }

    pub fn min_args(mut self, n: usize) -> Self {
        self.min_args = n;
        self
    }

    pub fn channel_only(mut self) -> Self {
        self.allow_private = false;
        self
    }

    pub fn no_highlight(mut self) -> Self {
        self.allow_highlight = false;
        self
    }
}

/// A message that matched a [`CommandSpec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    pub command: String,
    pub args: Vec<String>,
    /// Everything after the command word, verbatim.
    pub args_str: String,
    /// Sender's nick, when the origin is a user.
    pub sender: Option<String>,
    /// Channel for channel messages, the sender for private ones.
    pub reply_to: String,
    pub highlighted: bool,
}

pub(crate) enum HookKind {
    Events(Vec<String>, Handler),
    Command(CommandSpec, CommandHandler),
    Pattern(Regex, PatternHandler),
}

/// A module's subscription.
pub struct Hook {
    pub(crate) kind: HookKind,
}

impl Hook {
    /// Subscribe to one or more event names (or the `*` wildcard).
    pub fn on<F>(events: &[&str], handler: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: HookKind::Events(
                events.iter().map(|e| e.to_string()).collect(),
                Arc::new(handler),
            ),
        }
    }

    /// Respond to a bot command such as `.uptime`.
    pub fn command<F>(spec: CommandSpec, handler: F) -> Self
    where
        F: Fn(&Event, &CommandMatch) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: HookKind::Command(spec, Arc::new(handler)),
        }
    }

    /// Respond to any message text matching `pattern`.
    pub fn pattern<F>(pattern: Regex, handler: F) -> Self
    where
        F: Fn(&Event, &Captures<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            kind: HookKind::Pattern(pattern, Arc::new(handler)),
        }
    }

    /// Event names this hook is installed under.
    pub(crate) fn event_names(&self) -> Vec<String> {
        match &self.kind {
            HookKind::Events(names, _) => names.clone(),
            HookKind::Command(..) | HookKind::Pattern(..) => vec!["PRIVMSG".to_string()],
        }
    }

    /// Collapse into the uniform installed handler.
    pub(crate) fn into_handler(self, matcher: &Matcher) -> Handler {
        match self.kind {
            HookKind::Events(_, handler) => handler,
            HookKind::Command(spec, handler) => {
                let matcher = matcher.clone();
                Arc::new(move |event: &Event| match matcher.match_command(&spec, event) {
                    Some(m) => handler(event, &m),
                    None => Ok(()),
                })
            }
            HookKind::Pattern(regex, handler) => Arc::new(move |event: &Event| {
                let Some(text) = event.trailing.as_deref() else {
                    return Ok(());
                };
                match regex.captures(text) {
                    Some(caps) => handler(event, &caps),
                    None => Ok(()),
                }
            }),
        }
    }
}

fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Settings needed to recognise commands: the prefix and the bot's nick.
#[derive(Debug, Clone)]
pub struct Matcher {
    prefix: String,
    nick: NickHandle,
}

impl Matcher {
    pub fn new(prefix: impl Into<String>, nick: NickHandle) -> Self {
        Self {
            prefix: prefix.into(),
            nick,
        }
    }

    pub fn match_command(&self, spec: &CommandSpec, event: &Event) -> Option<CommandMatch> {
        if event.command != "PRIVMSG" {
            return None;
        }
        let target = event.arg(0)?;
        let text = event.trailing.as_deref()?.trim_start();
        let sender = event.nick().map(str::to_string);

        let private = !is_channel(target);
        if private && !spec.allow_private {
            return None;
        }
        let reply_to = if private {
            sender.clone()?
        } else {
            target.to_string()
        };

        let (body, highlighted) = match self.strip_highlight(text) {
            Some(rest) if spec.allow_highlight => (rest, true),
            Some(_) => return None,
            None => (text.strip_prefix(self.prefix.as_str())?, false),
        };

        let (word, rest) = match body.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (body, ""),
        };
        if !word.eq_ignore_ascii_case(&spec.name) {
            return None;
        }

        let args: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        if args.len() < spec.min_args {
            return None;
        }

        Some(CommandMatch {
            command: spec.name.clone(),
            args,
            args_str: rest.to_string(),
            sender,
            reply_to,
            highlighted,
        })
    }

    /// `"<nick>: rest"` or `"<nick>, rest"` → `rest` (prefix optional).
    fn strip_highlight<'a>(&self, text: &'a str) -> Option<&'a str> {
        let nick = self.nick.get();
        let head = text.get(..nick.len())?;
        if !head.eq_ignore_ascii_case(&nick) {
            return None;
        }
        let rest = text[nick.len()..].strip_prefix([':', ','])?.trim_start();
        Some(rest.strip_prefix(self.prefix.as_str()).unwrap_or(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaybot_proto::parse_line;

    fn matcher() -> Matcher {
        Matcher::new(".", NickHandle::new("relay"))
    }

    #[test]
    fn test_prefixed_command_in_channel() {
        let event = parse_line(":alice!a@host PRIVMSG #rust :.roll 2 d6").unwrap();
        let m = matcher()
            .match_command(&CommandSpec::new("roll"), &event)
            .unwrap();
        assert_eq!(m.args, vec!["2", "d6"]);
        assert_eq!(m.args_str, "2 d6");
        assert_eq!(m.reply_to, "#rust");
        assert_eq!(m.sender.as_deref(), Some("alice"));
        assert!(!m.highlighted);
    }

    #[test]
    fn test_highlight_addressing() {
        let spec = CommandSpec::new("uptime");
        let event = parse_line(":alice!a@host PRIVMSG #rust :Relay: uptime").unwrap();
        let m = matcher().match_command(&spec, &event).unwrap();
        assert!(m.highlighted);
        assert!(m.args.is_empty());

        let event = parse_line(":alice!a@host PRIVMSG #rust :relay, .uptime").unwrap();
        assert!(matcher().match_command(&spec, &event).is_some());

        let no_hl = CommandSpec::new("uptime").no_highlight();
        let event = parse_line(":alice!a@host PRIVMSG #rust :relay: uptime").unwrap();
        assert!(matcher().match_command(&no_hl, &event).is_none());
    }

    #[test]
    fn test_min_args_and_word_boundary() {
        let spec = CommandSpec::new("roll").min_args(1);
        let event = parse_line(":alice!a@host PRIVMSG #rust :.roll").unwrap();
        assert!(matcher().match_command(&spec, &event).is_none());

        let event = parse_line(":alice!a@host PRIVMSG #rust :.rollover 3").unwrap();
        assert!(matcher().match_command(&spec, &event).is_none());
    }

    #[test]
    fn test_private_messages() {
        let event = parse_line(":alice!a@host PRIVMSG relay :.uptime").unwrap();
        let m = matcher()
            .match_command(&CommandSpec::new("uptime"), &event)
            .unwrap();
        assert_eq!(m.reply_to, "alice");

        let channel_only = CommandSpec::new("uptime").channel_only();
        assert!(matcher().match_command(&channel_only, &event).is_none());
    }

    #[test]
    fn test_nick_change_is_seen_by_matcher() {
        let nick = NickHandle::new("relay");
        let matcher = Matcher::new("!", nick.clone());
        nick.set("relay_");
        let event = parse_line(":alice!a@host PRIVMSG #rust :relay_: ping").unwrap();
        assert!(matcher.match_command(&CommandSpec::new("ping"), &event).is_some());
    }

    #[test]
    fn test_pattern_hook_filters() {
        let hits = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = hits.clone();
        let hook = Hook::pattern(Regex::new(r"https?://(\S+)").unwrap(), move |_, caps| {
            seen.lock().push(caps[1].to_string());
            Ok(())
        });
        assert_eq!(hook.event_names(), vec!["PRIVMSG"]);
        let handler = hook.into_handler(&matcher());

        handler(&parse_line(":a!b@c PRIVMSG #r :see https://example.org/x").unwrap()).unwrap();
        handler(&parse_line(":a!b@c PRIVMSG #r :nothing here").unwrap()).unwrap();
        assert_eq!(*hits.lock(), vec!["example.org/x".to_string()]);
    }
}
