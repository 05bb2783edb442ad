//! # relaybot-proto
//!
//! The stateless wire layer of the relaybot engine: framing of CRLF
//! terminated lines, conversion of a single line into an [`Event`], and
//! serialization of outbound [`Command`]s.
//!
//! The engine routes by command token only, so parsing stops at the
//! prefix/command/args/trailing split and never interprets numerics or
//! channel state.
//!
//! ## Quick Start
//!
//! ```rust
//! use relaybot_proto::{parse_line, Command, Origin};
//!
//! let event = parse_line(":nick!user@host PRIVMSG #rust :hello there").unwrap();
//! assert_eq!(event.command, "PRIVMSG");
//! assert_eq!(event.args, vec!["#rust"]);
//! assert_eq!(event.trailing.as_deref(), Some("hello there"));
//! assert_eq!(event.prefix, Some(Origin::user("nick", "user", "host")));
//!
//! let reply = Command::Privmsg { target: "#rust".into(), text: "hi".into() };
//! assert_eq!(reply.to_string(), "PRIVMSG #rust :hi");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod event;
#[cfg(feature = "tokio")]
pub mod line;
pub mod origin;

pub use self::command::Command;
pub use self::error::{ProtocolError, Result};
pub use self::event::{parse_bytes, parse_line, Event};
#[cfg(feature = "tokio")]
pub use self::line::LineCodec;
pub use self::origin::Origin;
