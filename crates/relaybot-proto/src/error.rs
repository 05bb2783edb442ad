//! Error types for the wire layer.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Extract the command token from raw line bytes (for error reporting).
///
/// Works on bytes that failed UTF-8 validation: skips an optional `:prefix`
/// and returns the following run of ASCII alphanumerics.
pub(crate) fn extract_command_hint(raw_line: &[u8]) -> Option<String> {
    let mut pos = 0;

    if raw_line.first() == Some(&b':') {
        while pos < raw_line.len() && raw_line[pos] != b' ' {
            pos += 1;
        }
        while pos < raw_line.len() && raw_line[pos] == b' ' {
            pos += 1;
        }
    }

    let start = pos;
    while pos < raw_line.len() && raw_line[pos].is_ascii_alphanumeric() {
        pos += 1;
    }

    if pos > start {
        Some(String::from_utf8_lossy(&raw_line[start..pos]).into_owned())
    } else {
        None
    }
}

/// Errors raised while framing or decoding protocol lines.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid UTF-8 bytes in a line.
    #[error("invalid UTF-8 in line at byte {byte_pos}: {details}")]
    InvalidUtf8 {
        /// Byte position where UTF-8 validation failed.
        byte_pos: usize,
        /// Detailed error message from the UTF-8 decoder.
        details: String,
        /// Command token recovered from the raw bytes, if any.
        command_hint: Option<String>,
    },

    /// A line exceeded the codec's maximum length and was discarded.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Bytes seen before the line was discarded.
        actual: usize,
        /// Maximum allowed length.
        limit: usize,
    },

    /// An outbound payload contained `\r` or `\n`.
    #[error("outbound payload contains a line break")]
    EmbeddedLineBreak,
}

impl ProtocolError {
    /// Whether the session can keep reading after this error.
    ///
    /// Over-long lines are dropped by the codec itself; I/O errors end the
    /// session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ProtocolError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_hint_with_prefix() {
        assert_eq!(
            extract_command_hint(b":srv.example 001 bot :\xff"),
            Some("001".to_string())
        );
    }

    #[test]
    fn test_command_hint_without_prefix() {
        assert_eq!(
            extract_command_hint(b"PRIVMSG #c :\xfe\xff"),
            Some("PRIVMSG".to_string())
        );
        assert_eq!(extract_command_hint(b"\xff"), None);
    }

    #[test]
    fn test_io_is_not_recoverable() {
        let err = ProtocolError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert!(!err.is_recoverable());
        let err = ProtocolError::LineTooLong { actual: 10, limit: 5 };
        assert!(err.is_recoverable());
    }
}
