use bytes::{Buf, BufMut, Bytes};

use crate::{common::ByteStr, message::Violation};

/// Integer signess in postgres docs is awful.
pub trait UsizeExt {
    /// Length is `usize` in rust, while postgres want `i32`,
    /// this will panic when overflow instead of wrapping.
    fn to_i32(self) -> i32;
    /// Length is `usize` in rust, while sometime postgres want `u16`,
    /// this will panic when overflow instead of wrapping.
    fn to_u16(self) -> u16;
}

impl UsizeExt for usize {
    fn to_i32(self) -> i32 {
        match i32::try_from(self) {
            Ok(ok) => ok,
            Err(err) => panic!("message size too large for protocol: {err}"),
        }
    }

    fn to_u16(self) -> u16 {
        match u16::try_from(self) {
            Ok(ok) => ok,
            Err(err) => panic!("field count too large for protocol: {err}"),
        }
    }
}

/// Nul string and nullable value writing in [`BufMut`].
pub trait BufMutExt {
    /// Write string and nul termination.
    fn put_nul_string(&mut self, string: &str);

    /// Write length prefixed value, `None` is written as length `-1` without payload.
    fn put_value(&mut self, value: Option<&[u8]>);
}

impl<B: BufMut> BufMutExt for B {
    fn put_nul_string(&mut self, string: &str) {
        self.put(string.as_bytes());
        self.put_u8(b'\0');
    }

    fn put_value(&mut self, value: Option<&[u8]>) {
        match value {
            Some(value) => {
                self.put_i32(value.len().to_i32());
                self.put(value);
            }
            None => self.put_i32(-1),
        }
    }
}

/// Bounds checked reads from a message body.
///
/// Unlike [`Buf`] getters, these never panic on a short body.
pub trait BytesExt {
    fn take_u8(&mut self) -> Result<u8, Violation>;

    fn take_u16(&mut self) -> Result<u16, Violation>;

    fn take_i16(&mut self) -> Result<i16, Violation>;

    fn take_u32(&mut self) -> Result<u32, Violation>;

    fn take_i32(&mut self) -> Result<i32, Violation>;

    /// Split off exactly `len` bytes.
    fn take_bytes(&mut self, len: usize) -> Result<Bytes, Violation>;

    /// Split off bytes until nul, the nul itself is consumed and not returned.
    fn take_nul_bytes(&mut self) -> Result<Bytes, Violation>;

    /// Same as [`take_nul_bytes`][BytesExt::take_nul_bytes] but validated as utf8.
    fn take_nul_str(&mut self) -> Result<ByteStr, Violation>;

    /// Read an `i32` length prefixed value where `-1` denotes NULL.
    fn take_value(&mut self) -> Result<Option<Bytes>, Violation>;

    /// Assert the whole body is consumed.
    fn finish(&self) -> Result<(), Violation>;
}

macro_rules! take_int {
    ($($name:ident -> $ty:ty = $get:ident;)*) => {$(
        fn $name(&mut self) -> Result<$ty, Violation> {
            if self.remaining() < size_of::<$ty>() {
                return Err(Violation::TRUNCATED);
            }
            Ok(self.$get())
        }
    )*};
}

impl BytesExt for Bytes {
    take_int! {
        take_u8 -> u8 = get_u8;
        take_u16 -> u16 = get_u16;
        take_i16 -> i16 = get_i16;
        take_u32 -> u32 = get_u32;
        take_i32 -> i32 = get_i32;
    }

    fn take_bytes(&mut self, len: usize) -> Result<Bytes, Violation> {
        if self.len() < len {
            return Err(Violation::TRUNCATED);
        }
        Ok(self.split_to(len))
    }

    fn take_nul_bytes(&mut self) -> Result<Bytes, Violation> {
        let end = memchr::memchr(b'\0', self)
            .ok_or(Violation::Malformed("string is not nul terminated"))?;
        let me = self.split_to(end);
        self.advance(1); // nul
        Ok(me)
    }

    fn take_nul_str(&mut self) -> Result<ByteStr, Violation> {
        ByteStr::from_utf8(self.take_nul_bytes()?)
            .map_err(|_| Violation::Malformed("string is not valid utf8"))
    }

    fn take_value(&mut self) -> Result<Option<Bytes>, Violation> {
        match self.take_i32()? {
            -1 => Ok(None),
            len if len < 0 => Err(Violation::Malformed("negative value length")),
            len => self.take_bytes(len as usize).map(Some),
        }
    }

    fn finish(&self) -> Result<(), Violation> {
        match self.is_empty() {
            true => Ok(()),
            false => Err(Violation::Malformed("trailing bytes after last field")),
        }
    }
}

/// Helper trait to [`Display`][std::fmt::Display] bytes.
pub trait FmtExt {
    /// Lossy [`Display`][std::fmt::Display] bytes.
    fn lossy(&self) -> LossyFmt<'_>;
}

/// Lossy [`Display`][std::fmt::Display] implementation for bytes.
pub struct LossyFmt<'a>(pub &'a [u8]);

impl FmtExt for [u8] {
    fn lossy(&self) -> LossyFmt<'_> {
        LossyFmt(self)
    }
}

impl std::fmt::Display for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &b in self.0 {
            if b.is_ascii_graphic() || b.is_ascii_whitespace() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:x}")?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for LossyFmt<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nul_bytes() {
        let mut body = Bytes::from_static(b"name\0rest");
        assert_eq!(body.take_nul_bytes().unwrap(), "name");
        assert_eq!(body, "rest");
        assert_eq!(body.take_nul_bytes(), Err(Violation::Malformed("string is not nul terminated")));
    }

    #[test]
    fn value_sentinel() {
        let mut body = Bytes::from_static(&[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(body.take_value(), Ok(None));
        assert_eq!(body.take_value(), Ok(Some(Bytes::new())));
        assert_eq!(body.take_value(), Err(Violation::Malformed("negative value length")));
    }

    #[test]
    fn short_reads() {
        let mut body = Bytes::from_static(&[0, 0, 0, 9, 1]);
        assert_eq!(body.take_value(), Err(Violation::TRUNCATED));
        assert_eq!(Bytes::from_static(&[1]).take_u16(), Err(Violation::TRUNCATED));
        assert!(Bytes::from_static(&[1]).finish().is_err());
    }

    #[test]
    fn lossy() {
        assert_eq!(b"ab\x01".lossy().to_string(), "ab\\x1");
    }
}
