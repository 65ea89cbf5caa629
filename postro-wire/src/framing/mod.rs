//! Message framing over a [`ChunkReader`].
//!
//! Reading a message is two requests to the chunk source, the 5 bytes header
//! then the body. If the body request fails, the header is kept, so the next
//! call only request the body again.
//!
//! ```text
//!        ┌────────── header ok ──────────┐
//!        │                               ▼
//!  ┏━━━━━━━━┓                      ┏━━━━━━━━━━┓
//!  ┃ Header ┃ ◀────── body ok ──── ┃   Body   ┃ ──┐
//!  ┗━━━━━━━━┛                      ┗━━━━━━━━━━┛   │ body error
//!                                        ▲        │
//!                                        └────────┘
//! ```
use bytes::{Buf, Bytes};

use crate::{
    Result,
    common::{log_error, verbose},
    io::ChunkReader,
    message::ProtocolError,
};

mod slab;

pub use slab::Slab;

#[derive(Debug, Clone, Copy)]
enum State {
    Header,
    Body { msgtype: u8, len: usize },
}

/// Message type recorded for the untagged startup message.
const UNTAGGED: u8 = 0;

/// Split a chunk source into message type and body.
#[derive(Debug)]
pub struct Framer<C> {
    chunk: C,
    state: State,
    max_len: usize,
}

impl<C> Framer<C> {
    /// Create new framer, body larger than `max_len` is a protocol error.
    pub fn new(chunk: C, max_len: usize) -> Self {
        Self { chunk, state: State::Header, max_len }
    }

    /// Returns `true` if a header is read but the body is not.
    pub fn is_partial(&self) -> bool {
        matches!(self.state, State::Body { .. })
    }

    pub fn get_ref(&self) -> &C {
        &self.chunk
    }

    pub fn get_mut(&mut self) -> &mut C {
        &mut self.chunk
    }

    pub fn into_inner(self) -> C {
        self.chunk
    }

    fn body_len(&self, msgtype: u8, len: i32) -> Result<usize> {
        match usize::try_from(len).ok().and_then(|len| len.checked_sub(4)) {
            Some(body) if body <= self.max_len => Ok(body),
            _ => {
                log_error!("invalid message length {len} for message type {msgtype:#04x}");
                Err(ProtocolError::InvalidLength { tag: msgtype, len: len.into() }.into())
            },
        }
    }
}

impl<C: ChunkReader> Framer<C> {
    /// Read the next message, returns the message type and its body.
    ///
    /// If reading the body fails, calling this again resumes the same message.
    pub fn next(&mut self) -> Result<(u8, Bytes)> {
        let (msgtype, len) = match self.state {
            State::Body { msgtype, len } => (msgtype, len),
            State::Header => {
                let mut header = self.chunk.next(5)?;
                let msgtype = header.get_u8();
                let len = self.body_len(msgtype, header.get_i32())?;
                verbose!("header {:?}, body length {len}", msgtype as char);
                (msgtype, len)
            },
        };
        self.body(msgtype, len)
    }

    /// Read the untagged startup message body.
    ///
    /// Must not be interleaved with [`next`][Framer::next] while a body is pending.
    pub fn next_untagged(&mut self) -> Result<Bytes> {
        let len = match self.state {
            State::Body { len, .. } => len,
            State::Header => {
                let mut header = self.chunk.next(4)?;
                let len = self.body_len(UNTAGGED, header.get_i32())?;
                verbose!("untagged header, body length {len}");
                len
            },
        };
        let (_, body) = self.body(UNTAGGED, len)?;
        Ok(body)
    }

    fn body(&mut self, msgtype: u8, len: usize) -> Result<(u8, Bytes)> {
        self.state = State::Body { msgtype, len };
        let body = self.chunk.next(len)?;
        self.state = State::Header;
        Ok((msgtype, body))
    }
}

#[cfg(test)]
mod test {
    use bytes::{BufMut, BytesMut};
    use std::io;

    use super::*;
    use crate::error::ErrorKind;

    /// Fails the first read of every size listed in `fail`, records every request.
    struct Flaky {
        bytes: Bytes,
        fail: Vec<usize>,
        requests: Vec<usize>,
    }

    impl ChunkReader for Flaky {
        fn next(&mut self, n: usize) -> io::Result<Bytes> {
            self.requests.push(n);
            if let Some(i) = self.fail.iter().position(|&f| f == n) {
                self.fail.remove(i);
                return Err(io::ErrorKind::WouldBlock.into());
            }
            self.bytes.next(n)
        }
    }

    fn frames() -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(b'C');
        buf.put_i32(4 + 9);
        buf.put(&b"SELECT 1\0"[..]);
        buf.put_u8(b'Z');
        buf.put_i32(5);
        buf.put_u8(b'I');
        buf.freeze()
    }

    #[test]
    fn split_messages() {
        let mut framer = Framer::new(frames(), 1024);
        assert_eq!(framer.next().unwrap(), (b'C', Bytes::from_static(b"SELECT 1\0")));
        assert_eq!(framer.next().unwrap(), (b'Z', Bytes::from_static(b"I")));
        assert!(framer.next().unwrap_err().is_io());
    }

    #[test]
    fn resume_partial_body() {
        let flaky = Flaky { bytes: frames(), fail: vec![9], requests: vec![] };
        let mut framer = Framer::new(flaky, 1024);

        assert!(framer.next().unwrap_err().is_io());
        assert!(framer.is_partial());
        assert_eq!(framer.next().unwrap().0, b'C');
        assert!(!framer.is_partial());

        // header requested once, body twice
        assert_eq!(framer.get_ref().requests, [5, 9, 9]);
    }

    #[test]
    fn invalid_length() {
        for len in [0, 3, -1, i32::MIN, 1029] {
            let mut buf = BytesMut::new();
            buf.put_u8(b'D');
            buf.put_i32(len);
            let mut framer = Framer::new(buf.freeze(), 1024);
            let err = framer.next().unwrap_err();
            assert!(matches!(
                err.kind(),
                ErrorKind::Protocol(ProtocolError::InvalidLength { tag: b'D', .. })
            ), "{len}");
        }

        // exactly max
        let mut buf = BytesMut::new();
        buf.put_u8(b'd');
        buf.put_i32(4 + 1024);
        buf.put_bytes(0, 1024);
        let mut framer = Framer::new(buf.freeze(), 1024);
        assert_eq!(framer.next().unwrap().1.len(), 1024);
    }

    #[test]
    fn untagged() {
        let mut buf = BytesMut::new();
        buf.put_i32(8);
        buf.put_u32(196_608);
        buf.put(frames());
        let mut framer = Framer::new(buf.freeze(), 1024);
        assert_eq!(framer.next_untagged().unwrap(), &[0, 3, 0, 0][..]);
        assert_eq!(framer.next().unwrap().0, b'C');
    }
}
