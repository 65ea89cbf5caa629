//! Postgres Frontend Messages
//!
//! <https://www.postgresql.org/docs/current/protocol-message-formats.html>
use bytes::{BufMut, Bytes, BytesMut};

use super::{Encode, FrontendProtocol, Message, Oid, Origin, ProtocolError, Violation};
use crate::{
    common::ByteStr,
    ext::{BufMutExt, BytesExt, UsizeExt},
};

/// Postgres frontend messages
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(tag = "type"))]
pub enum FrontendMessage {
    Bind(Bind),
    Close(Close),
    Describe(Describe),
    Execute(Execute),
    Flush(Flush),
    Parse(Parse),
    PasswordMessage(PasswordMessage),
    Query(Query),
    Sync(Sync),
    Terminate(Terminate),
}

macro_rules! match_frontend {
    ($($name:ident,)*) => {
        impl FrontendMessage {
            /// Returns the message type.
            pub fn msgtype(&self) -> u8 {
                match self {
                    $(Self::$name(_) => $name::MSGTYPE,)*
                }
            }

            /// Get message name from message type.
            ///
            /// Returns `"Unknown"` for unknown message type.
            pub fn message_name(msgtype: u8) -> &'static str {
                match msgtype {
                    $($name::MSGTYPE => $name::NAME,)*
                    _ => "Unknown",
                }
            }

            /// Decode message body by its message type.
            pub fn decode(msgtype: u8, body: Bytes) -> Result<Self, ProtocolError> {
                let message = match msgtype {
                    $($name::MSGTYPE => Self::$name(<$name as Message>::decode(body)?),)*
                    _ => return Err(ProtocolError::unknown(msgtype, Origin::Frontend)),
                };
                Ok(message)
            }
        }

        impl Encode for FrontendMessage {
            fn encode(&self, buf: &mut BytesMut) {
                match self {
                    $(Self::$name(m) => m.encode(buf),)*
                }
            }
        }

        impl FrontendProtocol for FrontendMessage { }

        $(
            impl From<$name> for FrontendMessage {
                fn from(value: $name) -> Self {
                    Self::$name(value)
                }
            }
        )*
    };
}

match_frontend! {
    Bind,
    Close,
    Describe,
    Execute,
    Flush,
    Parse,
    PasswordMessage,
    Query,
    Sync,
    Terminate,
}

/// Postgres Startup frontend message
///
/// For historical reasons, the very first message sent by the client (the [`Startup`] message)
/// has no initial message-type byte, thus [`Startup`] does not implement [`Message`].
///
/// To write startup message, use [`Startup::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Startup {
    /// The protocol version number.
    ///
    /// The most significant 16 bits are the major version number (3 for the protocol described here).
    /// The least significant 16 bits are the minor version number (0 for the protocol described here).
    pub protocol_version: u32,
    /// Parameter name and value pairs, `user` is required.
    pub params: Vec<(ByteStr, ByteStr)>,
}

impl Startup {
    pub const NAME: &'static str = "Startup";

    /// Protocol version 3.0
    pub const PROTOCOL_VERSION: u32 = 196_608;

    /// Create startup message with the database user name to connect as.
    pub fn new(user: impl Into<ByteStr>) -> Self {
        Self {
            protocol_version: Self::PROTOCOL_VERSION,
            params: vec![(ByteStr::from_static("user"), user.into())],
        }
    }

    /// Add run-time parameter, e.g. `database` or `replication`.
    pub fn param(mut self, name: impl Into<ByteStr>, value: impl Into<ByteStr>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Returns parameter value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| &**v)
    }

    /// Write startup message to `buf`.
    pub fn write(&self, buf: &mut BytesMut) {
        let offset = buf.len();

        // Length of message contents in bytes, including self.
        // reserve 4 bytes for length
        buf.put_i32(0);
        buf.put_u32(self.protocol_version);

        for (name, value) in &self.params {
            buf.put_nul_string(name);
            buf.put_nul_string(value);
        }

        // A zero byte is required as a terminator after the last name/value pair.
        buf.put_u8(b'\0');

        // write the length
        let mut written_buf = &mut buf[offset..];
        written_buf.put_i32(written_buf.len().to_i32());
    }

    /// Decode startup body, that is, without the length prefix.
    pub fn decode(body: Bytes) -> Result<Self, ProtocolError> {
        Self::decode_body(body).map_err(|v| v.of(Self::NAME))
    }

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let protocol_version = body.take_u32()?;
        if protocol_version != Self::PROTOCOL_VERSION {
            return Err(Violation::Malformed("unsupported protocol version"));
        }
        let mut params = vec![];
        loop {
            let name = body.take_nul_str()?;
            if name.is_empty() {
                break;
            }
            params.push((name, body.take_nul_str()?));
        }
        body.finish()?;
        Ok(Self { protocol_version, params })
    }
}

/// Identifies the message as a Bind command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bind {
    /// The name of the destination portal (an empty string selects the unnamed portal).
    pub portal: ByteStr,
    /// The name of the source prepared statement (an empty string selects the unnamed prepared statement).
    pub statement: ByteStr,
    /// The parameter format codes.
    ///
    /// This can be empty to indicate that there are no parameters or that the parameters
    /// all use the default format (text); or one, in which case the specified format code
    /// is applied to all parameters; or it can equal the actual number of parameters.
    pub param_formats: Vec<u16>,
    /// The parameter values, `None` is NULL.
    #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::values"))]
    pub params: Vec<Option<Bytes>>,
    /// The result-column format codes, same rules as `param_formats`.
    pub result_formats: Vec<u16>,
}

fn take_formats(body: &mut Bytes) -> Result<Vec<u16>, Violation> {
    let len = body.take_u16()? as usize;
    if body.len() < len * 2 {
        return Err(Violation::TRUNCATED);
    }
    let mut formats = Vec::with_capacity(len);
    for _ in 0..len {
        formats.push(body.take_u16()?);
    }
    Ok(formats)
}

fn put_formats(formats: &[u16], buf: &mut BytesMut) {
    buf.put_u16(formats.len().to_u16());
    for format in formats {
        buf.put_u16(*format);
    }
}

impl Message for Bind {
    const MSGTYPE: u8 = b'B';
    const NAME: &'static str = "Bind";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let portal = body.take_nul_str()?;
        let statement = body.take_nul_str()?;
        let param_formats = take_formats(&mut body)?;
        let len = body.take_u16()? as usize;
        let mut params = Vec::with_capacity(len);
        for _ in 0..len {
            params.push(body.take_value()?);
        }
        let result_formats = take_formats(&mut body)?;
        body.finish()?;
        Ok(Self { portal, statement, param_formats, params, result_formats })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.portal);
        buf.put_nul_string(&self.statement);
        put_formats(&self.param_formats, buf);
        buf.put_u16(self.params.len().to_u16());
        for param in &self.params {
            buf.put_value(param.as_deref());
        }
        put_formats(&self.result_formats, buf);
    }
}

/// Object kind for [`Close`] and [`Describe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Target {
    /// `S`, a prepared statement.
    Statement,
    /// `P`, a portal.
    Portal,
}

impl Target {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Statement => b'S',
            Self::Portal => b'P',
        }
    }

    fn from_u8(kind: u8) -> Result<Self, Violation> {
        match kind {
            b'S' => Ok(Self::Statement),
            b'P' => Ok(Self::Portal),
            _ => Err(Violation::Malformed("unknown target kind")),
        }
    }
}

/// Decode kind byte followed by a name which terminator must be the last byte.
fn decode_target(body: Bytes) -> Result<(Target, ByteStr), Violation> {
    if body.len() < 2 {
        return Err(Violation::Malformed("body too short"));
    }
    let target = Target::from_u8(body[0])?;
    let name = body.slice(1..);
    if memchr::memchr(b'\0', &name) != Some(name.len() - 1) {
        return Err(Violation::Malformed("name terminator is not the last byte"));
    }
    let name = ByteStr::from_utf8(name.slice(..name.len() - 1))
        .map_err(|_| Violation::Malformed("string is not valid utf8"))?;
    Ok((target, name))
}

/// Identifies the message as a Close command
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Close {
    /// Whether to close a prepared statement or a portal.
    pub target: Target,
    /// The name of the prepared statement or portal to close
    /// (an empty string selects the unnamed prepared statement or portal).
    pub name: ByteStr,
}

impl Message for Close {
    const MSGTYPE: u8 = b'C';
    const NAME: &'static str = "Close";

    fn decode_body(body: Bytes) -> Result<Self, Violation> {
        let (target, name) = decode_target(body)?;
        Ok(Self { target, name })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.target.as_u8());
        buf.put_nul_string(&self.name);
    }
}

/// Identifies the message as a Describe command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Describe {
    /// Whether to describe a prepared statement or a portal.
    pub target: Target,
    /// The name of the prepared statement or portal to describe
    /// (an empty string selects the unnamed prepared statement or portal).
    pub name: ByteStr,
}

impl Message for Describe {
    const MSGTYPE: u8 = b'D';
    const NAME: &'static str = "Describe";

    fn decode_body(body: Bytes) -> Result<Self, Violation> {
        let (target, name) = decode_target(body)?;
        Ok(Self { target, name })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.target.as_u8());
        buf.put_nul_string(&self.name);
    }
}

/// Identifies the message as a Execute command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Execute {
    /// The name of the portal to execute (an empty string selects the unnamed portal).
    pub portal: ByteStr,
    /// Maximum number of rows to return, if portal contains a query that returns rows
    /// (ignored otherwise). Zero denotes “no limit”.
    pub max_rows: u32,
}

impl Message for Execute {
    const MSGTYPE: u8 = b'E';
    const NAME: &'static str = "Execute";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let portal = body.take_nul_str()?;
        let max_rows = body.take_u32()?;
        body.finish()?;
        Ok(Self { portal, max_rows })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.portal);
        buf.put_u32(self.max_rows);
    }
}

/// Identifies the message as a Parse command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Parse {
    /// Prepared statement name (an empty string selects the unnamed prepared statement).
    pub name: ByteStr,
    /// The query string to be parsed.
    pub query: ByteStr,
    /// Specifies the object ID of the parameter data type.
    ///
    /// Note that this is not an indication of the number of parameters that might appear
    /// in the query string, only the number that the frontend wants to prespecify types for.
    /// Placing a zero here is equivalent to leaving the type unspecified.
    pub param_types: Vec<Oid>,
}

impl Message for Parse {
    const MSGTYPE: u8 = b'P';
    const NAME: &'static str = "Parse";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let name = body.take_nul_str()?;
        let query = body.take_nul_str()?;
        let len = body.take_u16()? as usize;
        if body.len() < len * 4 {
            return Err(Violation::Malformed("parameter type count exceeds body"));
        }
        let mut param_types = Vec::with_capacity(len);
        for _ in 0..len {
            param_types.push(body.take_u32()?);
        }
        body.finish()?;
        Ok(Self { name, query, param_types })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.name);
        buf.put_nul_string(&self.query);
        buf.put_u16(self.param_types.len().to_u16());
        for oid in &self.param_types {
            buf.put_u32(*oid);
        }
    }
}

/// Identifies the message as a password response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PasswordMessage {
    /// The password (encrypted, if requested)
    pub password: ByteStr,
}

impl Message for PasswordMessage {
    const MSGTYPE: u8 = b'p';
    const NAME: &'static str = "PasswordMessage";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let password = body.take_nul_str()?;
        body.finish()?;
        Ok(Self { password })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.password);
    }
}

/// Identifies the message as a simple query
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Query {
    /// the query string itself
    pub sql: ByteStr,
}

impl Message for Query {
    const MSGTYPE: u8 = b'Q';
    const NAME: &'static str = "Query";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let sql = body.take_nul_str()?;
        body.finish()?;
        Ok(Self { sql })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.sql);
    }
}

unit_msg! {
    /// Identifies the message as a Flush command
    struct Flush, b'H', FrontendProtocol;

    /// Identifies the message as a Sync command
    struct Sync, b'S', FrontendProtocol;

    /// Identifies the message as a termination.
    struct Terminate, b'X', FrontendProtocol;
}

origin! {
    FrontendProtocol:
    Bind,
    Close,
    Describe,
    Execute,
    Parse,
    PasswordMessage,
    Query,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::to_bytes;

    fn s(value: &'static str) -> ByteStr {
        ByteStr::from_static(value)
    }

    fn roundtrip(message: FrontendMessage) {
        let bytes = to_bytes(&message);
        let decoded = FrontendMessage::decode(bytes[0], bytes.slice(5..)).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn roundtrip_all() {
        use FrontendMessage as F;
        let messages = [
            F::Bind(Bind::default()),
            F::Bind(Bind {
                portal: s("p1"),
                statement: s("stmt1"),
                param_formats: vec![1],
                params: vec![Some(Bytes::from_static(&[0, 0, 1, 164])), None, Some(Bytes::new())],
                result_formats: vec![0, 1],
            }),
            F::Close(Close { target: Target::Portal, name: s("") }),
            F::Describe(Describe { target: Target::Statement, name: s("stmt1") }),
            F::Execute(Execute { portal: s(""), max_rows: 0 }),
            F::Flush(Flush),
            F::Parse(Parse { name: s(""), query: s(""), param_types: vec![] }),
            F::Parse(Parse { name: s("stmt1"), query: s("SELECT $1, $2"), param_types: vec![23, 0] }),
            F::PasswordMessage(PasswordMessage { password: s("hunter2") }),
            F::Query(Query { sql: s("SELECT 1") }),
            F::Sync(Sync),
            F::Terminate(Terminate),
        ];
        for message in messages {
            roundtrip(message);
        }
    }

    #[test]
    fn close_layout() {
        let bytes = to_bytes(&Close { target: Target::Statement, name: s("stmt1") });
        assert_eq!(&bytes[..5], &[b'C', 0, 0, 0, 11]);
        assert_eq!(&bytes[5..], b"Sstmt1\0");
    }

    #[test]
    fn close_terminator_placement() {
        for body in [
            &b"Sstmt1"[..],
            b"Sst\0mt1\0",
            b"Sstmt1\0\0",
            b"S",
            b"",
            b"Xstmt1\0",
        ] {
            let err = Close::decode(Bytes::from_static(body)).unwrap_err();
            assert!(err.is_malformed(), "{body:?}: {err}");
        }
        let close = Close::decode(Bytes::from_static(b"P\0")).unwrap();
        assert_eq!(close, Close { target: Target::Portal, name: s("") });
    }

    #[test]
    fn parse_short_oids() {
        let mut body = BytesMut::new();
        body.put_nul_string("stmt1");
        body.put_nul_string("SELECT $1");
        body.put_u16(2);
        body.put_u32(23);
        let err = Parse::decode(body.freeze()).unwrap_err();
        assert!(err.is_malformed());

        let err = Parse::decode(Bytes::from_static(b"stmt1\0SELECT 1")).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn frontend_tag_scope() {
        let err = FrontendMessage::decode(b'Z', Bytes::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { tag: b'Z', origin: Origin::Frontend }));
        // `C` is CommandComplete from the backend
        assert_eq!(FrontendMessage::message_name(b'C'), "Close");
    }

    #[test]
    fn startup() {
        let startup = Startup::new("postgres").param("database", "post");
        let mut buf = BytesMut::new();
        startup.write(&mut buf);

        let mut len = [0u8; 4];
        len.copy_from_slice(&buf[..4]);
        assert_eq!(i32::from_be_bytes(len) as usize, buf.len());
        assert_eq!(&buf[4..8], &[0, 3, 0, 0]);

        let decoded = Startup::decode(buf.freeze().slice(4..)).unwrap();
        assert_eq!(decoded.get("user"), Some("postgres"));
        assert_eq!(decoded.get("database"), Some("post"));
        assert_eq!(decoded, startup);
    }

    #[test]
    fn startup_rejects_other_version() {
        // SSLRequest code
        let err = Startup::decode(Bytes::from_static(&[0x04, 0xd2, 0x16, 0x2f])).unwrap_err();
        assert!(err.is_malformed());
    }
}
