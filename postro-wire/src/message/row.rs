//! Row data and row metadata messages.
//!
//! These are the most frequent messages in a query response, so their storage
//! is either a reused vector ([`DataRow::decode_into`]) or a slice lent by a
//! [`Frontend`][crate::Frontend] slab.
use bytes::{BufMut, Bytes, BytesMut};
use std::{borrow::Cow, fmt};

use super::{BackendProtocol, Message, Oid, Violation};
use crate::{
    common::ByteStr,
    ext::{BufMutExt, BytesExt, FmtExt, UsizeExt},
};

/// Retained capacity above the field count before the storage is shrunk.
///
/// One abnormally wide row must not keep its allocation for the whole connection.
pub const CAPACITY_SLACK: usize = 32;

/// Reuse `vec` for `len` elements when its capacity is close enough, otherwise
/// replace it. Returns `true` when a new allocation is made.
fn reserve_exact_slack<T>(vec: &mut Vec<T>, len: usize) -> bool {
    vec.clear();
    if vec.capacity() < len || vec.capacity() - len > CAPACITY_SLACK {
        *vec = Vec::with_capacity(len.max(CAPACITY_SLACK));
        return true;
    }
    false
}

/// Take the owned vector out of `cow` for reuse, a borrowed one is dropped.
fn owned_vec<T: Clone>(cow: &mut Cow<'_, [T]>) -> Vec<T> {
    match std::mem::take(cow) {
        Cow::Owned(vec) => vec,
        Cow::Borrowed(_) => Vec::new(),
    }
}

/// Identifies the message as a data row.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DataRow<'a> {
    /// Column values, `None` is SQL NULL.
    ///
    /// Values are kept raw, in the format requested for the column.
    #[cfg_attr(feature = "serde", serde(serialize_with = "super::projection::values"))]
    pub values: Cow<'a, [Option<Bytes>]>,
}

impl<'a> DataRow<'a> {
    /// Create owned `DataRow`.
    pub fn new(values: Vec<Option<Bytes>>) -> DataRow<'static> {
        DataRow { values: Cow::Owned(values) }
    }

    /// Create `DataRow` borrowing values.
    pub fn borrowed(values: &'a [Option<Bytes>]) -> Self {
        Self { values: Cow::Borrowed(values) }
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns column value, `None` is returned for both SQL NULL and out of bounds.
    pub fn get(&self, idx: usize) -> Option<&[u8]> {
        self.values.get(idx)?.as_deref()
    }

    /// Returns `true` if borrowing a [`Frontend`][crate::Frontend] slab.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.values, Cow::Borrowed(_))
    }

    /// Detach from the slab it was decoded into.
    ///
    /// Values themselves are reference counted, this only copy the slot array.
    pub fn into_owned(self) -> DataRow<'static> {
        DataRow { values: Cow::Owned(self.values.into_owned()) }
    }

    /// Decode body into `self`, reusing the value storage when possible.
    ///
    /// Returns `true` if the value storage was reallocated.
    pub fn decode_into(&mut self, mut body: Bytes) -> Result<bool, super::ProtocolError> {
        let mut values = owned_vec(&mut self.values);
        let result = (|| -> Result<bool, Violation> {
            let len = body.take_u16()? as usize;
            let realloc = reserve_exact_slack(&mut values, len);
            for _ in 0..len {
                values.push(body.take_value()?);
            }
            body.finish()?;
            Ok(realloc)
        })();
        self.values = Cow::Owned(values);
        result.map_err(|v| v.of(Self::NAME))
    }

    /// Decode values directly into `slots`, which length is the declared field count.
    pub(crate) fn decode_slots(body: &mut Bytes, slots: &mut [Option<Bytes>]) -> Result<(), Violation> {
        for slot in slots {
            *slot = body.take_value()?;
        }
        body.finish()
    }
}

impl Message for DataRow<'_> {
    const MSGTYPE: u8 = b'D';
    const NAME: &'static str = "DataRow";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let len = body.take_u16()? as usize;
        let mut values = vec![None; len];
        Self::decode_slots(&mut body, &mut values)?;
        Ok(Self { values: Cow::Owned(values) })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.values.len().to_u16());
        for value in self.values.iter() {
            buf.put_value(value.as_deref());
        }
    }
}

origin!(BackendProtocol: DataRow<'_>);

impl fmt::Debug for DataRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_list();
        for value in self.values.iter() {
            match value {
                Some(value) => dbg.entry(&value.lossy()),
                None => dbg.entry(&format_args!("NULL")),
            };
        }
        dbg.finish()
    }
}

/// A field in [`RowDescription`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDescription {
    /// The field name.
    pub name: ByteStr,
    /// If the field can be identified as a column of a specific table,
    /// the object ID of the table; otherwise zero.
    pub table_oid: Oid,
    /// If the field can be identified as a column of a specific table,
    /// the attribute number of the column; otherwise zero.
    pub column_attribute: u16,
    /// The object ID of the field's data type.
    pub type_oid: Oid,
    /// The data type size (see pg_type.typlen).
    ///
    /// Note that negative values denote variable-width types.
    pub type_size: i16,
    /// The type modifier (see pg_attribute.atttypmod).
    ///
    /// The meaning of the modifier is type-specific.
    pub type_modifier: i32,
    /// The format code being used for the field.
    ///
    /// Currently will be zero (text) or one (binary). In a RowDescription returned
    /// from the statement variant of Describe, the format code is not yet known
    /// and will always be zero.
    pub format: u16,
}

impl FieldDescription {
    fn decode(body: &mut Bytes) -> Result<Self, Violation> {
        Ok(Self {
            name: body.take_nul_str()?,
            table_oid: body.take_u32()?,
            column_attribute: body.take_u16()?,
            type_oid: body.take_u32()?,
            type_size: body.take_i16()?,
            type_modifier: body.take_i32()?,
            format: body.take_u16()?,
        })
    }

    fn encode(&self, buf: &mut BytesMut) {
        buf.put_nul_string(&self.name);
        buf.put_u32(self.table_oid);
        buf.put_u16(self.column_attribute);
        buf.put_u32(self.type_oid);
        buf.put_i16(self.type_size);
        buf.put_i32(self.type_modifier);
        buf.put_u16(self.format);
    }
}

/// Identifies the message as a row description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RowDescription<'a> {
    /// Field descriptions, one for each column of the following [`DataRow`]s.
    pub fields: Cow<'a, [FieldDescription]>,
}

impl<'a> RowDescription<'a> {
    /// Create owned `RowDescription`.
    pub fn new(fields: Vec<FieldDescription>) -> RowDescription<'static> {
        RowDescription { fields: Cow::Owned(fields) }
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there is no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns `true` if borrowing a [`Frontend`][crate::Frontend] slab.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.fields, Cow::Borrowed(_))
    }

    /// Detach from the slab it was decoded into.
    pub fn into_owned(self) -> RowDescription<'static> {
        RowDescription { fields: Cow::Owned(self.fields.into_owned()) }
    }

    /// Decode body into `self`, reusing the field storage when possible.
    ///
    /// Returns `true` if the field storage was reallocated.
    pub fn decode_into(&mut self, mut body: Bytes) -> Result<bool, super::ProtocolError> {
        let mut fields = owned_vec(&mut self.fields);
        let result = (|| -> Result<bool, Violation> {
            let len = body.take_u16()? as usize;
            let realloc = reserve_exact_slack(&mut fields, len);
            for _ in 0..len {
                fields.push(FieldDescription::decode(&mut body)?);
            }
            body.finish()?;
            Ok(realloc)
        })();
        self.fields = Cow::Owned(fields);
        result.map_err(|v| v.of(Self::NAME))
    }

    pub(crate) fn decode_slots(body: &mut Bytes, slots: &mut [FieldDescription]) -> Result<(), Violation> {
        for slot in slots {
            *slot = FieldDescription::decode(body)?;
        }
        body.finish()
    }
}

impl Message for RowDescription<'_> {
    const MSGTYPE: u8 = b'T';
    const NAME: &'static str = "RowDescription";

    fn decode_body(mut body: Bytes) -> Result<Self, Violation> {
        let len = body.take_u16()? as usize;
        let mut fields = vec![FieldDescription::default(); len];
        Self::decode_slots(&mut body, &mut fields)?;
        Ok(Self { fields: Cow::Owned(fields) })
    }

    fn encode_body(&self, buf: &mut BytesMut) {
        buf.put_u16(self.fields.len().to_u16());
        for field in self.fields.iter() {
            field.encode(buf);
        }
    }
}

origin!(BackendProtocol: RowDescription<'_>);
