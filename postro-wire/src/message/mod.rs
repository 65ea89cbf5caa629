//! Postgres Frontend and Backend Protocol Messages
//!
//! Docs here mostly quoted from the official postgres documentation.
//!
//! ## Messaging Overview
//!
//! All communication is through a stream of messages. The first byte of a message identifies the message type,
//! and the next four bytes specify the length of the rest of the message (this length count includes itself,
//! but not the message-type byte). The remaining contents of the message are determined by the message type.
//!
//! ```text
//! ┏━━━━┳━━━━━━━━━━━━━━━━━━━┳━━━━━━┓
//! ┃ Ty ┃       Length      ┃ Body ┃
//! ┣━━━━╋━━━━━━━━━━━━━━━━━━━╋━━━━━━┫
//! ┃ u8 ┃        i32        ┃ [u8] ┃
//! ┣━━━━╋━━━━━━━━━━━━━━━━━━━╋━━━━━━┫
//! ┃ 43 ┃ 00 | 00 | 00 | 32 ┃  ..  ┃
//! ┗━━━━┻━━━━━━━━━━━━━━━━━━━┻━━━━━━┛
//! ```
//!
//! For historical reasons, the very first message sent by the client (the startup message)
//! has no initial message-type byte, see [`Startup`][frontend::Startup].
//!
//! Message types are scoped by direction, `C` is [`CommandComplete`][backend::CommandComplete]
//! when sent by the backend, and [`Close`][frontend::Close] when sent by the frontend.
//!
//! Every message implements [`Message`], which decode a body **without** the type byte and
//! length prefix, and [`Encode`], which write the complete message.
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>
use bytes::{BufMut, Bytes, BytesMut};

use crate::ext::UsizeExt;

/// Postgres object identifier.
///
/// The oid type is implemented as an unsigned four-byte integer.
///
/// <https://www.postgresql.org/docs/current/datatype-oid.html>
pub type Oid = u32;

/// Message with empty body.
macro_rules! unit_msg {
    ($(
        $(#[$doc:meta])* struct $name:ident, $ty:literal, $origin:ident;
    )*) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub struct $name;

        impl crate::message::Message for $name {
            const MSGTYPE: u8 = $ty;
            const NAME: &'static str = stringify!($name);

            fn decode_body(body: bytes::Bytes) -> Result<Self, crate::message::Violation> {
                if !body.is_empty() {
                    return Err(crate::message::Violation::Length { expected: 0, found: body.len() });
                }
                Ok(Self)
            }

            fn encode_body(&self, _: &mut bytes::BytesMut) { }
        }

        impl crate::message::$origin for $name { }
    )*};
}

/// Implement [`BackendProtocol`] or [`FrontendProtocol`] marker.
macro_rules! origin {
    ($origin:ident: $($name:ty),* $(,)?) => {
        $(impl crate::message::$origin for $name { })*
    };
}

mod error;
mod row;

pub mod backend;
pub mod frontend;

#[cfg(feature = "serde")]
pub mod projection;

pub use error::{Origin, ProtocolError, Violation};
pub use row::{DataRow, FieldDescription, RowDescription};
pub use backend::BackendMessage;
pub use frontend::FrontendMessage;

/// A postgres message codec.
pub trait Message: Sized {
    /// Message type.
    const MSGTYPE: u8;

    /// Message name, used in error report.
    const NAME: &'static str;

    /// Decode message body, that is, without message type and length prefix.
    ///
    /// The returned [`Violation`] is not yet attached to the message name,
    /// prefer [`decode`][Message::decode].
    fn decode_body(body: Bytes) -> Result<Self, Violation>;

    /// Write the main body of the message.
    fn encode_body(&self, buf: &mut BytesMut);

    /// Decode message body, that is, without message type and length prefix.
    fn decode(body: Bytes) -> Result<Self, ProtocolError> {
        Self::decode_body(body).map_err(|v| v.of(Self::NAME))
    }
}

/// A type which can be written as a complete postgres message.
pub trait Encode {
    /// Write message type, length and body into `buf`.
    fn encode(&self, buf: &mut BytesMut);
}

impl<M: Message> Encode for M {
    fn encode(&self, buf: &mut BytesMut) {
        write(self, buf);
    }
}

/// Marker for messages sent by postgres server.
pub trait BackendProtocol: Encode { }

/// Marker for messages sent by client.
pub trait FrontendProtocol: Encode { }

/// Write a message to `buf`.
///
/// The length is written as placeholder, then patched after the body is written.
pub fn write<M: Message>(msg: &M, buf: &mut BytesMut) {
    let offset = buf.len();
    buf.put_u8(M::MSGTYPE);
    buf.put_i32(-1);

    msg.encode_body(buf);

    // length include itself but not the message type
    let len = (buf.len() - offset - 1).to_i32();
    let mut prefix = &mut buf[offset + 1..offset + 5];
    prefix.put_i32(len);
}

/// Encode message into a new buffer.
pub fn to_bytes<E: Encode + ?Sized>(msg: &E) -> Bytes {
    let mut buf = BytesMut::new();
    msg.encode(&mut buf);
    buf.freeze()
}

#[cfg(test)]
mod test {
    use bytes::Buf;

    use super::*;
    use crate::message::{backend::*, frontend::*};

    fn assert_len_prefix(bytes: Bytes) {
        let mut header = bytes.clone();
        header.advance(1);
        assert_eq!(header.get_i32() as usize, bytes.len() - 1);
    }

    #[test]
    fn length_prefix_include_itself() {
        assert_len_prefix(to_bytes(&BindComplete));
        assert_len_prefix(to_bytes(&CommandComplete { tag: "SELECT 1".into() }));
        assert_len_prefix(to_bytes(&Query { sql: "SELECT 1".into() }));
        assert_len_prefix(to_bytes(&DataRow::new(vec![Some(Bytes::from_static(b"420")), None])));
    }

    #[test]
    fn append_to_existing_buffer() {
        let mut buf = BytesMut::from(&b"xyz"[..]);
        Sync.encode(&mut buf);
        ReadyForQuery { status: TransactionStatus::Idle }.encode(&mut buf);
        assert_eq!(&buf[..], b"xyzS\0\0\0\x04Z\0\0\0\x05I");
    }

    #[test]
    fn bind_complete_literal() {
        assert_eq!(&to_bytes(&BindComplete)[..], &[b'2', 0, 0, 0, 4]);
        let err = BindComplete::decode(Bytes::from_static(b"x")).unwrap_err();
        assert!(err.is_length_mismatch());
    }
}
