//! Protocol error
use std::fmt;

/// An error when translating bytes from or into a postgres message.
///
/// Decoding never recovers from a protocol error, the stream offset of the
/// next message header is lost once a body is violated.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A fixed size message body has the wrong length.
    #[error("`{message}` body must be {expected} bytes, found {found}")]
    LengthMismatch {
        message: &'static str,
        expected: usize,
        found: usize,
    },
    /// Structural decode failure.
    #[error("malformed `{message}`: {reason}")]
    Malformed {
        message: &'static str,
        reason: &'static str,
    },
    /// The message type byte does not match any message of the expected origin.
    #[error("unknown {origin} message type `{}`", Tag(.tag))]
    UnknownTag {
        tag: u8,
        origin: Origin,
    },
    /// The length prefix of a message header is out of range.
    #[error("invalid length {len} for message type `{}`", Tag(.tag))]
    InvalidLength {
        tag: u8,
        len: i64,
    },
}

/// Which side of the protocol produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Message sent by the client.
    Frontend,
    /// Message sent by the postgres server.
    Backend,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frontend => f.write_str("frontend"),
            Self::Backend => f.write_str("backend"),
        }
    }
}

/// Message agnostic decode failure, attached to a message name by
/// [`Message::decode`][super::Message::decode].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Malformed(&'static str),
    Length { expected: usize, found: usize },
}

impl Violation {
    pub(crate) const TRUNCATED: Violation = Violation::Malformed("unexpected end of message");

    pub(crate) fn of(self, message: &'static str) -> ProtocolError {
        match self {
            Violation::Malformed(reason) => ProtocolError::Malformed { message, reason },
            Violation::Length { expected, found } => ProtocolError::LengthMismatch { message, expected, found },
        }
    }
}

impl ProtocolError {
    pub(crate) fn unknown(tag: u8, origin: Origin) -> ProtocolError {
        Self::UnknownTag { tag, origin }
    }

    /// Returns `true` if this is a [`ProtocolError::Malformed`].
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }

    /// Returns `true` if this is a [`ProtocolError::LengthMismatch`].
    pub fn is_length_mismatch(&self) -> bool {
        matches!(self, Self::LengthMismatch { .. })
    }
}

/// Printable message type.
struct Tag<'a>(&'a u8);

impl fmt::Display for Tag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_ascii_graphic() {
            write!(f, "{}", *self.0 as char)
        } else {
            write!(f, "\\x{:02x}", self.0)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let err = ProtocolError::unknown(b'?', Origin::Backend);
        assert_eq!(err.to_string(), "unknown backend message type `?`");

        let err = ProtocolError::InvalidLength { tag: 0, len: 2 };
        assert_eq!(err.to_string(), "invalid length 2 for message type `\\x00`");

        let err = Violation::Length { expected: 0, found: 3 }.of("BindComplete");
        assert!(err.is_length_mismatch());
        assert_eq!(err.to_string(), "`BindComplete` body must be 0 bytes, found 3");
    }
}
