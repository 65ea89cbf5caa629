//! Structured projection of messages.
//!
//! Raw values are rendered as `{"text": ..}` when every byte is printable,
//! or `{"binary": ..}` in base64 otherwise, NULL is rendered as `null`.
//!
//! ```text
//! b"420"          -> {"text":"420"}
//! [0, 0, 1, 164]  -> {"binary":"AAABpA=="}
//! NULL            -> null
//! ```
use base64::{Engine, engine::general_purpose::STANDARD};
use ::bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeSeq};

/// Projection of a raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projected {
    /// Value is printable as is.
    Text(String),
    /// Base64 encoded value.
    Binary(String),
}

fn is_printable(b: u8) -> bool {
    matches!(b, b' '..=b'~' | b'\r' | b'\n' | b'\t')
}

impl Projected {
    /// Project raw value.
    pub fn new(value: &[u8]) -> Self {
        if value.iter().copied().all(is_printable) {
            // printable bytes are all ascii
            Self::Text(value.iter().map(|&b| b as char).collect())
        } else {
            Self::Binary(STANDARD.encode(value))
        }
    }

    /// Restore the raw value.
    pub fn restore(&self) -> Result<Bytes, base64::DecodeError> {
        match self {
            Self::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Binary(b64) => STANDARD.decode(b64).map(Bytes::from),
        }
    }
}

/// Project nullable value.
pub fn project(value: Option<&[u8]>) -> Option<Projected> {
    value.map(Projected::new)
}

/// Serialize raw bytes field as [`Projected`].
pub fn bytes<S: Serializer>(bytes: &Bytes, s: S) -> Result<S::Ok, S::Error> {
    Projected::new(bytes).serialize(s)
}

/// Serialize nullable field as [`Projected`] or `null`.
pub fn value<S: Serializer>(value: &Option<Bytes>, s: S) -> Result<S::Ok, S::Error> {
    project(value.as_deref()).serialize(s)
}

/// Serialize nullable values as a sequence of [`Projected`] or `null`.
pub fn values<V, S>(values: &V, s: S) -> Result<S::Ok, S::Error>
where
    V: AsRef<[Option<Bytes>]>,
    S: Serializer,
{
    let values = values.as_ref();
    let mut seq = s.serialize_seq(Some(values.len()))?;
    for value in values {
        seq.serialize_element(&project(value.as_deref()))?;
    }
    seq.end()
}

/// Render message as a JSON string.
#[cfg(feature = "json")]
pub fn to_json<T: Serialize + ?Sized>(message: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}
