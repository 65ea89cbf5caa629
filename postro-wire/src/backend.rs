//! Server side of the protocol.
use bytes::BytesMut;
use std::io::Write;

use crate::{
    Config, Result,
    common::{log_error, verbose},
    framing::Framer,
    io::ChunkReader,
    message::{BackendProtocol, Encode, FrontendMessage, ProtocolError, frontend::Startup},
};

/// Server side protocol engine.
///
/// Receive [`FrontendMessage`] from a [`ChunkReader`], and send backend messages to [`Write`].
#[derive(Debug)]
pub struct Backend<C, W> {
    framer: Framer<C>,
    write: W,
    write_buf: BytesMut,
}

impl<C, W> Backend<C, W> {
    pub fn new(chunk: C, write: W) -> Self {
        Self::with_config(chunk, write, Config::new())
    }

    pub fn with_config(chunk: C, write: W, config: Config) -> Self {
        Self {
            framer: Framer::new(chunk, config.max_message_len),
            write,
            write_buf: BytesMut::new(),
        }
    }

    /// Returns `true` if a message header is received but its body is not.
    pub fn is_partial(&self) -> bool {
        self.framer.is_partial()
    }

    pub fn get_writer(&self) -> &W {
        &self.write
    }

    pub fn get_reader(&self) -> &C {
        self.framer.get_ref()
    }

    pub fn into_parts(self) -> (C, W) {
        (self.framer.into_inner(), self.write)
    }
}

impl<C: ChunkReader, W> Backend<C, W> {
    /// Receive the untagged [`Startup`] message, which must be the first message of a connection.
    pub fn receive_startup(&mut self) -> Result<Startup> {
        let body = self.framer.next_untagged()?;
        let startup = Startup::decode(body)?;
        verbose!("{startup:?}");
        Ok(startup)
    }

    /// Receive the next frontend message.
    ///
    /// When the chunk source fails in the middle of a message, calling
    /// `receive` again resumes that message. Any protocol error is fatal.
    pub fn receive(&mut self) -> Result<FrontendMessage> {
        let (msgtype, body) = self.framer.next()?;
        match FrontendMessage::decode(msgtype, body) {
            Ok(message) => {
                verbose!("{message:?}");
                Ok(message)
            },
            Err(err) => {
                if let ProtocolError::UnknownTag { .. } = err {
                    log_error!("{err}");
                }
                Err(err.into())
            },
        }
    }
}

impl<C, W: Write> Backend<C, W> {
    /// Write message to the underlying io.
    ///
    /// Each message is written with a single `write_all`.
    pub fn send<B: BackendProtocol>(&mut self, message: B) -> Result<()> {
        self.write_buf.clear();
        message.encode(&mut self.write_buf);
        self.write.write_all(&self.write_buf)?;
        Ok(())
    }

    /// Flush the underlying io.
    pub fn flush(&mut self) -> Result<()> {
        self.write.flush()?;
        Ok(())
    }
}
