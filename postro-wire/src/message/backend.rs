//! Postgres Backend Messages
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use super::{BackendProtocol, Encode, Message, Oid, Origin, ProtocolError, Violation};
use crate::{
    common::ByteStr,
    ext::{BufMutExt, BytesExt, UsizeExt},
};

pub use super::row::{DataRow, FieldDescription, RowDescription};

/// Postgres backend messages
///
/// [`DataRow`] and [`RowDescription`] may borrow the slab of the
/// [`Frontend`][crate::Frontend] that decoded them, use
/// [`into_owned`][BackendMessage::into_owned] to keep them around.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(tag = "type"))]
pub enum BackendMessage<'a> {
    Authentication(Authentication),
    BackendKeyData(BackendKeyData),
    BindComplete(BindComplete),
    CloseComplete(CloseComplete),
    CommandComplete(CommandComplete),
    CopyBothResponse(CopyBothResponse),
    CopyData(CopyData),
    CopyDone(CopyDone),
    CopyFail(CopyFail),
    CopyInResponse(CopyInResponse),
    CopyOutResponse(CopyOutResponse),
    DataRow(DataRow<'a>),
    EmptyQueryResponse(EmptyQueryResponse),
    ErrorResponse(ErrorResponse),
    FunctionCallResponse(FunctionCallResponse),
    NegotiateProtocolVersion(NegotiateProtocolVersion),
    NoData(NoData),
    NoticeResponse(NoticeResponse),
    NotificationResponse(NotificationResponse),
    ParameterDescription(ParameterDescription),
    ParameterStatus(ParameterStatus),
    ParseComplete(ParseComplete),
    PortalSuspended(PortalSuspended),
    ReadyForQuery(ReadyForQuery),
    RowDescription(RowDescription<'a>),
}

macro_rules! match_backend {
    ($($name:ident,)* ; $($row:ident,)*) => {
        impl<'a> BackendMessage<'a> {
            /// Returns the message type.
            pub fn msgtype(&self) -> u8 {
                match self {
                    $(Self::$name(_) => <$name as Message>::MSGTYPE,)*
                    $(Self::$row(_) => <$row as Message>::MSGTYPE,)*
                }
            }

            /// Get message name from message type.
            ///
            /// Returns `"Unknown"` for unknown message type.
            pub fn message_name(msgtype: u8) -> &'static str {
                $(
                    if msgtype == <$name as Message>::MSGTYPE {
                        return <$name as Message>::NAME;
                    }
                )*
                $(
                    if msgtype == <$row as Message>::MSGTYPE {
                        return <$row as Message>::NAME;
                    }
                )*
                "Unknown"
            }

            /// Decode message body by its message type.
            ///
            /// The returned message owns all its storage.
            pub fn decode(msgtype: u8, body: Bytes) -> Result<BackendMessage<'static>, ProtocolError> {
                $(
                    if msgtype == <$name as Message>::MSGTYPE {
                        return Ok(BackendMessage::$name(<$name as Message>::decode(body)?));
                    }
                )*
                $(
                    if msgtype == <$row as Message>::MSGTYPE {
                        return Ok(BackendMessage::$row(<$row as Message>::decode(body)?));
                    }
                )*
                Err(ProtocolError::unknown(msgtype, Origin::Backend))
            }

            /// Detach from [`Frontend`][crate::Frontend] slab if borrowing.
            pub fn into_owned(self) -> BackendMessage<'static> {
                match self {
                    $(Self::$name(m) => BackendMessage::$name(m),)*
                    $(Self::$row(m) => BackendMessage::$row(m.into_owned()),)*
                }
            }
        }

        impl Encode for BackendMessage<'_> {
            fn encode(&self, buf: &mut BytesMut) {
                match self {
                    $(Self::$name(m) => m.encode(buf),)*
                    $(Self::$row(m) => m.encode(buf),)*
                }
            }
        }

        impl BackendProtocol for BackendMessage<'_> { }
    };
}

match_backend! {
    Authentication,
    BackendKeyData,
    BindComplete,
    CloseComplete,
    CommandComplete,
    CopyBothResponse,
    CopyData,
    CopyDone,
    CopyFail,
    CopyInResponse,
    CopyOutResponse,
    EmptyQueryResponse,
    ErrorResponse,
    FunctionCallResponse,
    NegotiateProtocolVersion,
    NoData,
    NoticeResponse,
    NotificationResponse,
    ParameterDescription,
    ParameterStatus,
    ParseComplete,
    PortalSuspended,
    ReadyForQuery,
    ;
    // carry a lifetime
    DataRow,
    RowDescription,
}

/// Identifies the message as an authentication request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Authentication {
    /// Specifies that the authentication was successful.
    Ok,
    /// Specifies that Kerberos V5 authentication is required.
    KerberosV5,
    /// Specifies that a clear-text password is required.
    CleartextPassword,
    /// Specifies that an MD5-encrypted password is required.
    MD5Password {
        /// The salt to use when encrypting the password.
        salt: [u8; 4],
    },
    /// Specifies that GSSAPI authentication is required.
    GSS,
    /// GSSAPI or SSPI authentication data.
    GSSContinue {
        #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::bytes"))]
        data: Bytes,
    },
    /// Specifies that SSPI authentication is required.
    SSPI,
    /// Specifies that SASL authentication is required.
    SASL {
        /// SASL authentication mechanisms, in the server's order of preference.
        mechanisms: Vec<ByteStr>,
    },
    /// Specifies that this message contains a SASL challenge.
    SASLContinue {
        /// SASL data, specific to the SASL mechanism being used.
        #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::bytes"))]
        data: Bytes,
    },
    /// Specifies that SASL authentication has completed.
    SASLFinal {
        /// SASL outcome "additional data", specific to the SASL mechanism being used.
        #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::bytes"))]
        data: Bytes,
    },
}

impl Authentication {
    /// Returns the authentication request code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::KerberosV5 => 2,
            Self::CleartextPassword => 3,
            Self::MD5Password { .. } => 5,
            Self::GSS => 7,
            Self::GSSContinue { .. } => 8,
            Self::SSPI => 9,
            Self::SASL { .. } => 10,
            Self::SASLContinue { .. } => 11,
            Self::SASLFinal { .. } => 12,
        }
    }
}

impl Message for Authentication {
    const MSGTYPE: u8 = b'R';
    const NAME: &'static str = "Authentication";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let auth = match body.take_i32()? {
            0 => Authentication::Ok,
            2 => Authentication::KerberosV5,
            3 => Authentication::CleartextPassword,
            5 => {
                let salt = body.take_bytes(4)?;
                Authentication::MD5Password { salt: [salt[0], salt[1], salt[2], salt[3]] }
            }
            7 => Authentication::GSS,
            8 => return Ok(Authentication::GSSContinue { data: body }),
            9 => Authentication::SSPI,
            10 => {
                let mut mechanisms = vec![];
                loop {
                    let name = body.take_nul_str()?;
                    if name.is_empty() {
                        break;
                    }
                    mechanisms.push(name);
                }
                Authentication::SASL { mechanisms }
            }
            11 => return Ok(Authentication::SASLContinue { data: body }),
            12 => return Ok(Authentication::SASLFinal { data: body }),
            _ => return Err(Violation::Malformed("unknown authentication request")),
        };
        body.finish()?;
        Ok(auth)
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_i32(self.code());
        match self {
            Self::MD5Password { salt } => buf.put_slice(salt),
            Self::GSSContinue { data } | Self::SASLContinue { data } | Self::SASLFinal { data } => {
                buf.put_slice(data)
            }
            Self::SASL { mechanisms } => {
                for name in mechanisms {
                    buf.put_nul_string(name);
                }
                buf.put_u8(b'\0');
            }
            _ => {}
        }
    }
}

/// Identifies the message as cancellation key data.
///
/// The frontend must save these values if it wishes to be able to issue CancelRequest messages later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BackendKeyData {
    /// The process ID of this backend.
    pub process_id: u32,
    /// The secret key of this backend.
    pub secret_key: u32,
}

impl Message for BackendKeyData {
    const MSGTYPE: u8 = b'K';
    const NAME: &'static str = "BackendKeyData";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        if body.len() != 8 {
            return Err(Violation::Length { expected: 8, found: body.len() });
        }
        Ok(Self {
            process_id: body.take_u32()?,
            secret_key: body.take_u32()?,
        })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u32(self.process_id);
        buf.put_u32(self.secret_key);
    }
}

/// Identifies the message as a command-completed response
///
/// For an INSERT command, the tag is INSERT oid rows, where rows is the number of rows inserted.
/// oid used to be the object ID of the inserted row if rows was 1 and the target table had OIDs,
/// but OIDs system columns are not supported anymore; therefore oid is always 0.
///
/// For a DELETE command, the tag is DELETE rows where rows is the number of rows deleted.
///
/// For an UPDATE command, the tag is UPDATE rows where rows is the number of rows updated.
///
/// For a SELECT or CREATE TABLE AS command, the tag is SELECT rows where rows is the number of rows retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CommandComplete {
    /// The command tag. This is usually a single word that identifies which SQL command was completed.
    pub tag: ByteStr,
}

impl CommandComplete {
    /// Number of rows affected, parsed from the last word of the tag.
    pub fn rows_affected(&self) -> Option<u64> {
        self.tag.rsplit(' ').next()?.parse().ok()
    }
}

impl Message for CommandComplete {
    const MSGTYPE: u8 = b'C';
    const NAME: &'static str = "CommandComplete";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let tag = body.take_nul_str()?;
        body.finish()?;
        Ok(Self { tag })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.tag);
    }
}

/// Identifies the message as COPY data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CopyData {
    /// Data that forms part of a COPY data stream.
    #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::bytes"))]
    pub data: Bytes,
}

impl Message for CopyData {
    const MSGTYPE: u8 = b'd';
    const NAME: &'static str = "CopyData";

    fn decode_body(body: Bytes) -> Result<Self, Violation> {
        Ok(Self { data: body })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.data);
    }
}

/// Identifies the message as a COPY-failure indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CopyFail {
    /// An error message to report as the cause of failure.
    pub message: ByteStr,
}

impl Message for CopyFail {
    const MSGTYPE: u8 = b'f';
    const NAME: &'static str = "CopyFail";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let message = body.take_nul_str()?;
        body.finish()?;
        Ok(Self { message })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.message);
    }
}

macro_rules! copy_response {
    ($(
        $(#[$doc:meta])* struct $name:ident, $ty:literal;
    )*) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub struct $name {
            /// 0 indicates the overall COPY format is textual, 1 indicates binary.
            pub overall_format: u8,
            /// The format codes to be used for each column.
            ///
            /// Each must presently be zero (text) or one (binary). All must be zero if the overall copy format is textual.
            pub column_formats: Vec<u16>,
        }

        impl Message for $name {
            const MSGTYPE: u8 = $ty;
            const NAME: &'static str = stringify!($name);

            fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
                let overall_format = body.take_u8()?;
                let len = body.take_u16()? as usize;
                if body.len() != len * 2 {
                    return Err(Violation::Malformed("column format count mismatch"));
                }
                let mut column_formats = Vec::with_capacity(len);
                for _ in 0..len {
                    column_formats.push(body.take_u16()?);
                }
                Ok(Self { overall_format, column_formats })
            }

            fn encode_body(&self, buf: &mut BytesMut) {
                buf.put_u8(self.overall_format);
                buf.put_u16(self.column_formats.len().to_u16());
                for format in &self.column_formats {
                    buf.put_u16(*format);
                }
            }
        }
    )*};
}

copy_response! {
    /// Identifies the message as a Start Copy Both response.
    ///
    /// This message is used only for Streaming Replication.
    struct CopyBothResponse, b'W';

    /// Identifies the message as a Start Copy In response.
    ///
    /// The frontend must now send copy-in data (if not prepared to do so, send a CopyFail message).
    struct CopyInResponse, b'G';

    /// Identifies the message as a Start Copy Out response.
    ///
    /// This message will be followed by copy-out data.
    struct CopyOutResponse, b'H';
}

/// A field of [`ErrorResponse`] or [`NoticeResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ErrorField {
    /// A code identifying the field type.
    ///
    /// <https://www.postgresql.org/docs/current/protocol-error-fields.html>
    pub code: u8,
    /// The field value.
    pub value: ByteStr,
}

/// Decode fields terminated by a zero byte.
fn decode_error_fields(mut body: Bytes) -> Result<Vec<ErrorField>, Violation> {
    let mut fields = vec![];
    loop {
        let code = body.take_u8()?;
        if code == b'\0' {
            break;
        }
        fields.push(ErrorField { code, value: body.take_nul_str()? });
    }
    body.finish()?;
    Ok(fields)
}

fn encode_error_fields(fields: &[ErrorField], buf: &mut BytesMut) {
    for field in fields {
        buf.put_u8(field.code);
        buf.put_nul_string(&field.value);
    }
    buf.put_u8(b'\0');
}

macro_rules! error_response {
    ($(
        $(#[$doc:meta])* struct $name:ident, $ty:literal;
    )*) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub struct $name {
            /// Identified fields, in the order sent.
            pub fields: Vec<ErrorField>,
        }

        impl $name {
            /// Returns the first field with given code.
            pub fn field(&self, code: u8) -> Option<&str> {
                self.fields.iter().find(|f| f.code == code).map(|f| &*f.value)
            }

            /// Severity, `ERROR`, `FATAL`, or `PANIC` (in an error message), or `WARNING`, `NOTICE`,
            /// `DEBUG`, `INFO`, or `LOG` (in a notice message), or a localized translation of one of these.
            pub fn severity(&self) -> Option<&str> {
                self.field(b'V').or_else(|| self.field(b'S'))
            }

            /// The SQLSTATE code for the error.
            pub fn code(&self) -> Option<&str> {
                self.field(b'C')
            }

            /// The primary human-readable error message.
            pub fn message(&self) -> Option<&str> {
                self.field(b'M')
            }

            /// An optional secondary error message carrying more detail about the problem.
            pub fn detail(&self) -> Option<&str> {
                self.field(b'D')
            }

            /// An optional suggestion what to do about the problem.
            pub fn hint(&self) -> Option<&str> {
                self.field(b'H')
            }
        }

        impl Message for $name {
            const MSGTYPE: u8 = $ty;
            const NAME: &'static str = stringify!($name);

            fn decode_body(body: Bytes) -> Result<Self, Violation> {
                Ok(Self { fields: decode_error_fields(body)? })
            }

            fn encode_body(&self, buf: &mut BytesMut) {
                encode_error_fields(&self.fields, buf);
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.severity().unwrap_or("ERROR"))?;
                if let Some(code) = self.code() {
                    write!(f, " [{code}]")?;
                }
                write!(f, ": {}", self.message().unwrap_or_default())?;
                if let Some(detail) = self.detail() {
                    write!(f, "\nDETAIL: {detail}")?;
                }
                if let Some(hint) = self.hint() {
                    write!(f, "\nHINT: {hint}")?;
                }
                Ok(())
            }
        }
    )*};
}

error_response! {
    /// Identifies the message as an error
    ///
    /// The message body consists of one or more identified fields, followed by a zero byte as a terminator.
    /// Fields can appear in any order.
    struct ErrorResponse, b'E';

    /// A warning message. The frontend should display the message.
    struct NoticeResponse, b'N';
}

impl std::error::Error for ErrorResponse { }

/// Identifies the message as a function call result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FunctionCallResponse {
    /// The value of the function result, `None` is NULL.
    #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::value"))]
    pub result: Option<Bytes>,
}

impl Message for FunctionCallResponse {
    const MSGTYPE: u8 = b'V';
    const NAME: &'static str = "FunctionCallResponse";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let result = body.take_value()?;
        body.finish()?;
        Ok(Self { result })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_value(self.result.as_deref());
    }
}

/// Identifies the message as a protocol version negotiation message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NegotiateProtocolVersion {
    /// Newest minor protocol version supported by the server for the major protocol version requested by the client.
    pub minor: u32,
    /// Protocol options not recognized by the server.
    pub options: Vec<ByteStr>,
}

impl Message for NegotiateProtocolVersion {
    const MSGTYPE: u8 = b'v';
    const NAME: &'static str = "NegotiateProtocolVersion";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let minor = body.take_u32()?;
        let len = body.take_u32()?;
        let mut options = vec![];
        for _ in 0..len {
            options.push(body.take_nul_str()?);
        }
        body.finish()?;
        Ok(Self { minor, options })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u32(self.minor);
        buf.put_u32(self.options.len().to_i32() as u32);
        for option in &self.options {
            buf.put_nul_string(option);
        }
    }
}

/// Identifies the message as a notification response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NotificationResponse {
    /// The process ID of the notifying backend process.
    pub process_id: u32,
    /// The name of the channel that the notify has been raised on.
    pub channel: ByteStr,
    /// The “payload” string passed from the notifying process.
    pub payload: ByteStr,
}

impl Message for NotificationResponse {
    const MSGTYPE: u8 = b'A';
    const NAME: &'static str = "NotificationResponse";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let message = Self {
            process_id: body.take_u32()?,
            channel: body.take_nul_str()?,
            payload: body.take_nul_str()?,
        };
        body.finish()?;
        Ok(message)
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u32(self.process_id);
        buf.put_nul_string(&self.channel);
        buf.put_nul_string(&self.payload);
    }
}

/// Identifies the message as a parameter description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParameterDescription {
    /// Specifies the object ID of each parameter data type.
    pub oids: Vec<Oid>,
}

impl Message for ParameterDescription {
    const MSGTYPE: u8 = b't';
    const NAME: &'static str = "ParameterDescription";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let len = body.take_u16()? as usize;
        if body.len() != len * 4 {
            return Err(Violation::Malformed("parameter count mismatch"));
        }
        let mut oids = Vec::with_capacity(len);
        for _ in 0..len {
            oids.push(body.take_u32()?);
        }
        Ok(Self { oids })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.oids.len().to_u16());
        for oid in &self.oids {
            buf.put_u32(*oid);
        }
    }
}

/// Identifies the message as a run-time parameter status report
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParameterStatus {
    /// The name of the run-time parameter being reported
    pub name: ByteStr,
    /// The current value of the parameter
    pub value: ByteStr,
}

impl Message for ParameterStatus {
    const MSGTYPE: u8 = b'S';
    const NAME: &'static str = "ParameterStatus";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let message = Self {
            name: body.take_nul_str()?,
            value: body.take_nul_str()?,
        };
        body.finish()?;
        Ok(message)
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.name);
        buf.put_nul_string(&self.value);
    }
}

/// Current backend transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TransactionStatus {
    /// `I`, not in a transaction block.
    Idle,
    /// `T`, in a transaction block.
    Transaction,
    /// `E`, in a failed transaction block, queries will be rejected until block is ended.
    Failed,
}

impl TransactionStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Idle => b'I',
            Self::Transaction => b'T',
            Self::Failed => b'E',
        }
    }
}

/// Identifies the message type. ReadyForQuery is sent whenever the backend is ready for a new query cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReadyForQuery {
    pub status: TransactionStatus,
}

impl Message for ReadyForQuery {
    const MSGTYPE: u8 = b'Z';
    const NAME: &'static str = "ReadyForQuery";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        if body.len() != 1 {
            return Err(Violation::Length { expected: 1, found: body.len() });
        }
        let status = match body.take_u8()? {
            b'I' => TransactionStatus::Idle,
            b'T' => TransactionStatus::Transaction,
            b'E' => TransactionStatus::Failed,
            _ => return Err(Violation::Malformed("unknown transaction status")),
        };
        Ok(Self { status })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u8(self.status.as_u8());
    }
}

unit_msg! {
    /// Identifies the message as a Bind-complete indicator.
    struct BindComplete, b'2', BackendProtocol;

    /// Identifies the message as a Close-complete indicator.
    struct CloseComplete, b'3', BackendProtocol;

    /// Identifies the message as a COPY-complete indicator.
    struct CopyDone, b'c', BackendProtocol;

    /// Identifies the message as a response to an empty query string.
    ///
    /// This substitutes for CommandComplete.
    struct EmptyQueryResponse, b'I', BackendProtocol;

    /// Identifies the message as a no-data indicator.
    struct NoData, b'n', BackendProtocol;

    /// Identifies the message as a Parse-complete indicator.
    struct ParseComplete, b'1', BackendProtocol;

    /// Identifies the message as a portal-suspended indicator.
    ///
    /// Note this only appears if an Execute message's row-count limit was reached.
    struct PortalSuspended, b's', BackendProtocol;
}

origin! {
    BackendProtocol:
    Authentication,
    BackendKeyData,
    CommandComplete,
    CopyBothResponse,
    CopyData,
    CopyFail,
    CopyInResponse,
    CopyOutResponse,
    ErrorResponse,
    FunctionCallResponse,
    NegotiateProtocolVersion,
    NoticeResponse,
    NotificationResponse,
    ParameterDescription,
    ParameterStatus,
    ReadyForQuery,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::to_bytes;

    fn roundtrip(message: BackendMessage<'static>) {
        let bytes = to_bytes(&message);
        assert_eq!(bytes[0], message.msgtype());
        let decoded = BackendMessage::decode(bytes[0], bytes.slice(5..)).unwrap();
        assert_eq!(decoded, message);
    }

    fn s(value: &'static str) -> ByteStr {
        ByteStr::from_static(value)
    }

    #[test]
    fn roundtrip_all() {
        use BackendMessage as B;
        let messages = [
            B::Authentication(Authentication::Ok),
            B::Authentication(Authentication::MD5Password { salt: [1, 2, 3, 4] }),
            B::Authentication(Authentication::SASL { mechanisms: vec![s("SCRAM-SHA-256"), s("SCRAM-SHA-256-PLUS")] }),
            B::Authentication(Authentication::SASLContinue { data: Bytes::from_static(b"r=abc,s=xyz,i=4096") }),
            B::Authentication(Authentication::SASLFinal { data: Bytes::new() }),
            B::BackendKeyData(BackendKeyData { process_id: 4200, secret_key: 0xdead_beef }),
            B::BindComplete(BindComplete),
            B::CloseComplete(CloseComplete),
            B::CommandComplete(CommandComplete { tag: s("INSERT 0 3") }),
            B::CopyBothResponse(CopyBothResponse { overall_format: 1, column_formats: vec![0, 1] }),
            B::CopyData(CopyData { data: Bytes::from_static(b"1\tfoo\n") }),
            B::CopyDone(CopyDone),
            B::CopyFail(CopyFail { message: s("aborted") }),
            B::CopyInResponse(CopyInResponse::default()),
            B::CopyOutResponse(CopyOutResponse { overall_format: 0, column_formats: vec![0] }),
            B::DataRow(DataRow::new(vec![])),
            B::EmptyQueryResponse(EmptyQueryResponse),
            B::ErrorResponse(ErrorResponse {
                fields: vec![
                    ErrorField { code: b'S', value: s("ERROR") },
                    ErrorField { code: b'C', value: s("42P01") },
                    ErrorField { code: b'M', value: s("relation \"foo\" does not exist") },
                ],
            }),
            B::FunctionCallResponse(FunctionCallResponse { result: None }),
            B::FunctionCallResponse(FunctionCallResponse { result: Some(Bytes::from_static(b"42")) }),
            B::NegotiateProtocolVersion(NegotiateProtocolVersion { minor: 0, options: vec![s("_pq_.foo")] }),
            B::NoData(NoData),
            B::NoticeResponse(NoticeResponse::default()),
            B::NotificationResponse(NotificationResponse { process_id: 7, channel: s("jobs"), payload: s("") }),
            B::ParameterDescription(ParameterDescription { oids: vec![23, 25] }),
            B::ParameterDescription(ParameterDescription::default()),
            B::ParameterStatus(ParameterStatus { name: s("TimeZone"), value: s("UTC") }),
            B::ParseComplete(ParseComplete),
            B::PortalSuspended(PortalSuspended),
            B::ReadyForQuery(ReadyForQuery { status: TransactionStatus::Failed }),
            B::RowDescription(RowDescription::new(vec![])),
        ];
        for message in messages {
            roundtrip(message);
        }
    }

    #[test]
    fn copy_both_response_layout() {
        let bytes = to_bytes(&CopyBothResponse { overall_format: 1, column_formats: vec![0, 1] });
        assert_eq!(&bytes[..], &[b'W', 0, 0, 0, 11, 1, 0, 2, 0, 0, 0, 1]);
    }

    #[test]
    fn fixed_size() {
        let err = BackendKeyData::decode(Bytes::from_static(&[0; 7])).unwrap_err();
        assert!(err.is_length_mismatch());
        let err = ReadyForQuery::decode(Bytes::from_static(b"II")).unwrap_err();
        assert!(err.is_length_mismatch());
        let err = ReadyForQuery::decode(Bytes::from_static(b"X")).unwrap_err();
        assert!(err.is_malformed());
        for msgtype in [b'1', b'2', b'3', b'c', b'I', b'n', b's'] {
            let err = BackendMessage::decode(msgtype, Bytes::from_static(b"\0")).unwrap_err();
            assert!(err.is_length_mismatch(), "{err}");
        }
    }

    #[test]
    fn unknown_message_type() {
        let err = BackendMessage::decode(b'P', Bytes::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { tag: b'P', origin: Origin::Backend }));
        assert_eq!(BackendMessage::message_name(b'P'), "Unknown");
        assert_eq!(BackendMessage::message_name(b'C'), "CommandComplete");
        assert_eq!(BackendMessage::message_name(b'D'), "DataRow");
    }

    #[test]
    fn malformed_bodies() {
        // missing nul
        assert!(CommandComplete::decode(Bytes::from_static(b"SELECT 1")).unwrap_err().is_malformed());
        // trailing bytes
        assert!(CommandComplete::decode(Bytes::from_static(b"SELECT 1\0x")).unwrap_err().is_malformed());
        // unknown auth
        assert!(Authentication::decode(Bytes::from_static(&[0, 0, 0, 99])).unwrap_err().is_malformed());
        // declared count larger than body
        assert!(ParameterDescription::decode(Bytes::from_static(&[0, 2, 0, 0, 0, 23])).unwrap_err().is_malformed());
        assert!(CopyInResponse::decode(Bytes::from_static(&[0, 0, 3, 0, 0])).unwrap_err().is_malformed());
        // missing terminator
        assert!(ErrorResponse::decode(Bytes::from_static(b"SERROR\0")).unwrap_err().is_malformed());
    }

    #[test]
    fn error_response_display() {
        let err = ErrorResponse {
            fields: vec![
                ErrorField { code: b'S', value: s("ERROR") },
                ErrorField { code: b'V', value: s("ERROR") },
                ErrorField { code: b'C', value: s("22012") },
                ErrorField { code: b'M', value: s("division by zero") },
                ErrorField { code: b'H', value: s("don't") },
            ],
        };
        assert_eq!(err.to_string(), "ERROR [22012]: division by zero\nHINT: don't");
    }

    #[test]
    fn rows_affected() {
        assert_eq!(CommandComplete { tag: s("INSERT 0 3") }.rows_affected(), Some(3));
        assert_eq!(CommandComplete { tag: s("BEGIN") }.rows_affected(), None);
    }
}
