//! The [`ChunkReader`] trait.
use bytes::{Bytes, BytesMut};
use std::io::{self, Read};

const DEFAULT_BUF_CAPACITY: usize = 8 * 1024;

/// A byte source which returns exactly the requested amount of bytes, or fails.
///
/// A failed read must not lose bytes already received, so that a retry with
/// the same size continues where the failed one left off.
pub trait ChunkReader {
    /// Read exactly `n` bytes.
    fn next(&mut self, n: usize) -> io::Result<Bytes>;
}

impl<C> ChunkReader for &mut C where C: ChunkReader + ?Sized {
    fn next(&mut self, n: usize) -> io::Result<Bytes> {
        C::next(self, n)
    }
}

/// In memory chunk source.
///
/// Requesting more than remaining bytes fails without consuming anything.
impl ChunkReader for Bytes {
    fn next(&mut self, n: usize) -> io::Result<Bytes> {
        if self.len() < n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(self.split_to(n))
    }
}

/// Buffered chunk source over [`Read`].
#[derive(Debug)]
pub struct BufferedReader<R> {
    read: R,
    buf: BytesMut,
}

impl<R> BufferedReader<R> {
    pub fn new(read: R) -> Self {
        Self::with_capacity(DEFAULT_BUF_CAPACITY, read)
    }

    pub fn with_capacity(capacity: usize, read: R) -> Self {
        Self { read, buf: BytesMut::with_capacity(capacity), }
    }

    /// Returns bytes read from the underlying io but not yet returned.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    pub fn get_ref(&self) -> &R {
        &self.read
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.read
    }

    pub fn into_inner(self) -> R {
        self.read
    }
}

impl<R: Read> BufferedReader<R> {
    /// Read once from the underlying io into the buffer.
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] when the underlying io is exhausted.
    fn fill(&mut self, at_least: usize) -> io::Result<()> {
        let filled = self.buf.len();
        self.buf.resize(filled + at_least.max(DEFAULT_BUF_CAPACITY), 0);

        let result = loop {
            match self.read.read(&mut self.buf[filled..]) {
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                result => break result,
            }
        };

        match result {
            Ok(0) => {
                self.buf.truncate(filled);
                Err(io::ErrorKind::UnexpectedEof.into())
            },
            Ok(read) => {
                self.buf.truncate(filled + read);
                Ok(())
            },
            Err(err) => {
                self.buf.truncate(filled);
                Err(err)
            },
        }
    }
}

impl<R: Read> ChunkReader for BufferedReader<R> {
    fn next(&mut self, n: usize) -> io::Result<Bytes> {
        while self.buf.len() < n {
            self.fill(n - self.buf.len())?;
        }
        Ok(self.buf.split_to(n).freeze())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Yield scripted results, one per read call.
    struct Script(Vec<io::Result<&'static [u8]>>);

    impl Read for Script {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0)?;
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn bytes_source() {
        let mut src = Bytes::from_static(b"abcde");
        assert_eq!(src.next(2).unwrap(), "ab");
        assert_eq!(src.next(4).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!((&mut src).next(3).unwrap(), "cde");
        assert_eq!(src.next(0).unwrap(), "");
    }

    #[test]
    fn buffered_keep_bytes_on_failure() {
        let mut src = BufferedReader::new(Script(vec![
            Ok(&b"ab"[..]),
            Err(io::ErrorKind::WouldBlock.into()),
            Ok(&b"cdef"[..]),
        ]));
        assert_eq!(src.next(3).unwrap_err().kind(), io::ErrorKind::WouldBlock);
        assert_eq!(src.buffer(), b"ab");
        assert_eq!(src.next(3).unwrap(), "abc");
        assert_eq!(src.next(3).unwrap(), "def");
        assert_eq!(src.next(1).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
