//! Client side of the protocol.
use bytes::{Bytes, BytesMut};
use std::{borrow::Cow, io::Write};

use crate::{
    Config, Result,
    common::{log_error, span, verbose},
    ext::BytesExt,
    framing::{Framer, Slab},
    io::ChunkReader,
    message::{
        BackendMessage, DataRow, Encode, FieldDescription, FrontendProtocol, Message,
        ProtocolError, RowDescription, frontend::Startup,
    },
};

/// Client side protocol engine.
///
/// Receive [`BackendMessage`] from a [`ChunkReader`], and send frontend messages to [`Write`].
///
/// [`DataRow`] and [`RowDescription`] are decoded into engine owned slabs, the
/// returned message borrows the engine until the next [`receive`][Frontend::receive].
/// Use `into_owned` to keep them longer.
///
/// ```
/// use bytes::Bytes;
/// use postro_wire::{Frontend, message::BackendMessage};
///
/// let mut frontend = Frontend::new(Bytes::from_static(b"D\0\0\0\x0b\0\x01\0\0\0\x01x"), std::io::sink());
///
/// let BackendMessage::DataRow(row) = frontend.receive()? else {
///     unreachable!()
/// };
/// assert_eq!(row.get(0), Some(&b"x"[..]));
/// # Ok::<_, postro_wire::Error>(())
/// ```
#[derive(Debug)]
pub struct Frontend<C, W> {
    framer: Framer<C>,
    write: W,
    write_buf: BytesMut,
    values: Slab<Option<Bytes>>,
    fields: Slab<FieldDescription>,
}

impl<C, W> Frontend<C, W> {
    pub fn new(chunk: C, write: W) -> Self {
        Self::with_config(chunk, write, Config::new())
    }

    pub fn with_config(chunk: C, write: W, config: Config) -> Self {
        Self {
            framer: Framer::new(chunk, config.max_message_len),
            write,
            write_buf: BytesMut::new(),
            values: Slab::new(config.value_batch),
            fields: Slab::new(config.field_batch),
        }
    }

    /// Returns how many times [`DataRow`] value storage is allocated.
    pub fn value_allocations(&self) -> usize {
        self.values.allocations()
    }

    /// Returns how many times [`RowDescription`] field storage is allocated.
    pub fn field_allocations(&self) -> usize {
        self.fields.allocations()
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

impl<C: ChunkReader, W> Frontend<C, W> {
    /// Receive the next backend message.
    ///
    /// When the chunk source fails in the middle of a message, calling
    /// `receive` again resumes that message. Any protocol error is fatal.
    pub fn receive(&mut self) -> Result<BackendMessage<'_>> {
        let (msgtype, mut body) = self.framer.next()?;
        span!("receive", msgtype = BackendMessage::message_name(msgtype));

        match msgtype {
            DataRow::MSGTYPE => {
                let len = body.take_u16().map_err(|v| v.of(DataRow::NAME))? as usize;
                let slots = self.values.claim(len);
                DataRow::decode_slots(&mut body, slots).map_err(|v| v.of(DataRow::NAME))?;
                Ok(BackendMessage::DataRow(DataRow::borrowed(slots)))
            },
            RowDescription::MSGTYPE => {
                let len = body.take_u16().map_err(|v| v.of(RowDescription::NAME))? as usize;
                let slots = self.fields.claim(len);
                RowDescription::decode_slots(&mut body, slots).map_err(|v| v.of(RowDescription::NAME))?;
                Ok(BackendMessage::RowDescription(RowDescription { fields: Cow::Borrowed(slots) }))
            },
            _ => match BackendMessage::decode(msgtype, body) {
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
            },
        }
    }
}

impl<C, W: Write> Frontend<C, W> {
    /// Write message to the underlying io.
    ///
    /// Each message is written with a single `write_all`.
    pub fn send<F: FrontendProtocol>(&mut self, message: F) -> Result<()> {
        self.write_buf.clear();
        message.encode(&mut self.write_buf);
        self.write.write_all(&self.write_buf)?;
        Ok(())
    }

    /// Write [`Startup`] message to the underlying io.
    ///
    /// For historical reasons, the very first message sent by the client (the startup message)
    /// has no initial message-type byte.
    ///
    /// Thus, [`Startup`] does not implement [`FrontendProtocol`].
    pub fn send_startup(&mut self, startup: &Startup) -> Result<()> {
        self.write_buf.clear();
        startup.write(&mut self.write_buf);
        self.write.write_all(&self.write_buf)?;
        Ok(())
    }

    /// Flush the underlying io.
    pub fn flush(&mut self) -> Result<()> {
        self.write.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use bytes::BufMut;
    use std::io;

    use super::*;
    use crate::{
        error::ErrorKind,
        message::{Origin, backend::*, frontend::*},
    };

    fn stream(messages: &[&dyn Encode]) -> Bytes {
        let mut buf = BytesMut::new();
        for message in messages {
            message.encode(&mut buf);
        }
        buf.freeze()
    }

    fn field(name: &'static str) -> FieldDescription {
        FieldDescription { name: name.into(), type_oid: 25, type_size: -1, type_modifier: -1, ..Default::default() }
    }

    fn text(s: &'static str) -> Option<Bytes> {
        Some(Bytes::from_static(s.as_bytes()))
    }

    #[test]
    fn receive_query_response() {
        let bytes = stream(&[
            &RowDescription::new(vec![field("id"), field("name")]),
            &DataRow::new(vec![text("1"), text("deadpool")]),
            &DataRow::new(vec![text("2"), None]),
            &CommandComplete { tag: "SELECT 2".into() },
            &ReadyForQuery { status: TransactionStatus::Idle },
        ]);
        let mut frontend = Frontend::new(bytes, io::sink());

        let BackendMessage::RowDescription(desc) = frontend.receive().unwrap() else { panic!() };
        assert!(desc.is_borrowed());
        assert_eq!(desc.fields[1].name, "name");

        let BackendMessage::DataRow(row) = frontend.receive().unwrap() else { panic!() };
        assert!(row.is_borrowed());
        let first = row.into_owned();

        let BackendMessage::DataRow(row) = frontend.receive().unwrap() else { panic!() };
        assert_eq!(row.get(0), Some(&b"2"[..]));
        assert_eq!(row.get(1), None);
        assert_eq!(first.get(1), Some(&b"deadpool"[..]));

        let BackendMessage::CommandComplete(cmd) = frontend.receive().unwrap() else { panic!() };
        assert_eq!(cmd.rows_affected(), Some(2));

        let message = frontend.receive().unwrap();
        assert_eq!(message, BackendMessage::ReadyForQuery(ReadyForQuery { status: TransactionStatus::Idle }));

        assert!(frontend.receive().unwrap_err().is_io());
    }

    /// Fails one read in the middle of the second message.
    struct Flaky {
        bytes: Bytes,
        calls: usize,
        fail_at: usize,
        requests: Vec<usize>,
    }

    impl ChunkReader for Flaky {
        fn next(&mut self, n: usize) -> io::Result<Bytes> {
            self.calls += 1;
            self.requests.push(n);
            if self.calls == self.fail_at {
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.bytes.next(n)
        }
    }

    #[test]
    fn resume_partial_body() {
        let bytes = stream(&[
            &ParseComplete,
            &DataRow::new(vec![text("420"), None]),
            &BindComplete,
        ]);
        // header, body, header, [body fails]
        let flaky = Flaky { bytes, calls: 0, fail_at: 4, requests: vec![] };
        let mut frontend = Frontend::new(flaky, io::sink());

        assert_eq!(frontend.receive().unwrap(), BackendMessage::ParseComplete(ParseComplete));
        let err = frontend.receive().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(e) if e.kind() == io::ErrorKind::Interrupted));

        let BackendMessage::DataRow(row) = frontend.receive().unwrap() else { panic!() };
        assert_eq!(row.get(0), Some(&b"420"[..]));
        assert_eq!(frontend.receive().unwrap(), BackendMessage::BindComplete(BindComplete));

        // DataRow body is 2 + 4 + 3 + 4
        assert_eq!(frontend.get_reader().requests, [5, 0, 5, 13, 13, 5, 0]);
    }

    #[test]
    fn slab_allocation_bound() {
        const ROWS: usize = 1000;
        const BATCH: usize = 64;

        let mut buf = BytesMut::new();
        for i in 0..ROWS {
            let width = i % 5 + 1;
            DataRow::new(vec![text("v"); width]).encode(&mut buf);
        }
        let config = Config::new().value_batch(BATCH);
        let mut frontend = Frontend::with_config(buf.freeze(), io::sink(), config);

        for i in 0..ROWS {
            let BackendMessage::DataRow(row) = frontend.receive().unwrap() else { panic!() };
            assert_eq!(row.len(), i % 5 + 1);
        }
        assert!(frontend.value_allocations() >= 1);
        assert!(frontend.value_allocations() <= ROWS.div_ceil(BATCH));
    }

    #[test]
    fn wide_row() {
        let bytes = stream(&[
            &DataRow::new(vec![None; 10]),
            &DataRow::new(vec![None; 3]),
        ]);
        let config = Config::new().value_batch(4);
        let mut frontend = Frontend::with_config(bytes, io::sink(), config);
        assert_eq!(frontend.receive().unwrap(), BackendMessage::DataRow(DataRow::new(vec![None; 10])));
        assert_eq!(frontend.receive().unwrap(), BackendMessage::DataRow(DataRow::new(vec![None; 3])));
        assert_eq!(frontend.value_allocations(), 1);
    }

    #[test]
    fn fatal_errors() {
        let mut buf = BytesMut::new();
        buf.put_u8(b'!');
        buf.put_i32(4);
        let mut frontend = Frontend::new(buf.freeze(), io::sink());
        let err = frontend.receive().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Protocol(ProtocolError::UnknownTag { tag: b'!', origin: Origin::Backend })
        ));

        // declares 2 values, supplies 1
        let mut buf = BytesMut::new();
        buf.put_u8(b'D');
        buf.put_i32(4 + 2 + 4);
        buf.put_u16(2);
        buf.put_i32(-1);
        let mut frontend = Frontend::new(buf.freeze(), io::sink());
        let ErrorKind::Protocol(err) = frontend.receive().unwrap_err().into_kind() else { panic!() };
        assert!(err.is_malformed());

        let mut buf = BytesMut::new();
        buf.put_u8(b'Z');
        buf.put_i32(1 << 20);
        let config = Config::new().max_message_len(1024);
        let mut frontend = Frontend::with_config(buf.freeze(), io::sink(), config);
        let err = frontend.receive().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::InvalidLength { .. })));
    }

    /// Records every `write` call.
    #[derive(Default)]
    struct Recorder(Vec<Vec<u8>>);

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn send_one_write_per_message() {
        let mut frontend = Frontend::new(Bytes::new(), Recorder::default());
        frontend.send_startup(&Startup::new("postgres")).unwrap();
        frontend.send(Parse { name: "".into(), query: "SELECT $1".into(), param_types: vec![23] }).unwrap();
        frontend.send(Sync).unwrap();
        frontend.flush().unwrap();

        let writes = &frontend.get_writer().0;
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0][4..8], [0, 3, 0, 0]);
        assert_eq!(writes[1][0], b'P');
        assert_eq!(writes[2], b"S\0\0\0\x04");
    }
}
