//! Line → [`Event`] conversion.
//!
//! Grammar of a single line (terminator already stripped):
//!
//! ```text
//! [':' prefix ' '] command [' ' args...] [' :' trailing]
//! ```
//!
//! The trailing parameter starts after the first `" :"` marker and is kept
//! verbatim, further colons and spaces included.

use crate::error::{extract_command_hint, ProtocolError};
use crate::origin::Origin;

/// One parsed protocol line, or an engine pseudo-event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Command token (upper-cased), numeric, or pseudo-event name.
    pub command: String,
    /// Positional arguments, in order.
    pub args: Vec<String>,
    /// Origin of the line, if it carried a prefix.
    pub prefix: Option<Origin>,
    /// Trailing free-text parameter.
    pub trailing: Option<String>,
}

impl Event {
    /// Create an event with no arguments, prefix or trailing text.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            prefix: None,
            trailing: None,
        }
    }

    /// Set the trailing parameter.
    pub fn with_trailing(mut self, trailing: impl Into<String>) -> Self {
        self.trailing = Some(trailing.into());
        self
    }

    /// Set the positional arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the origin.
    pub fn with_prefix(mut self, prefix: Origin) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Positional argument `n`, if present.
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.args.get(n).map(String::as_str)
    }

    /// Nickname of the sender, when the origin is a user.
    pub fn nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Origin::nick)
    }

    /// Prefix rendered back to its wire form.
    pub fn prefix_text(&self) -> Option<String> {
        self.prefix.as_ref().map(ToString::to_string)
    }
}

/// Parse one line of text.
///
/// Returns `None` for blank or whitespace-only input, and for a line that
/// holds a prefix but no command.
pub fn parse_line(raw: &str) -> Option<Event> {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let (prefix, rest) = match line.strip_prefix(':') {
        Some(stripped) => match stripped.split_once(' ') {
            Some((prefix, rest)) => (Some(Origin::parse(prefix)), rest.trim_start_matches(' ')),
            None => return None,
        },
        None => (None, line.trim_start_matches(' ')),
    };

    // `tail` keeps the separating space so a `" :"` marker directly after
    // the command is found by the same search as one after the arguments.
    let (command, tail) = match rest.find(' ') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if command.is_empty() {
        return None;
    }

    let (params, trailing) = match tail.find(" :") {
        Some(idx) => (&tail[..idx], Some(tail[idx + 2..].to_string())),
        None => (tail, None),
    };

    Some(Event {
        command: command.to_ascii_uppercase(),
        args: params
            .split(' ')
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect(),
        prefix,
        trailing,
    })
}

/// Decode and parse one raw line.
///
/// Decode failures stop here: they are reported through `tracing` and the
/// line is dropped.
pub fn parse_bytes(raw: &[u8]) -> Option<Event> {
    match std::str::from_utf8(raw) {
        Ok(text) => parse_line(text),
        Err(e) => {
            let err = ProtocolError::InvalidUtf8 {
                byte_pos: e.valid_up_to(),
                details: e.to_string(),
                command_hint: extract_command_hint(raw),
            };
            tracing::warn!(error = %err, len = raw.len(), "Dropping undecodable line");
            None
        }
    }
}
