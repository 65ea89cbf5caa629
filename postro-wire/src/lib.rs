//! Postgres Frontend and Backend Wire Protocol
//!
//! Decode and encode postgres protocol messages, and split a byte stream into
//! messages.
//!
//! # Examples
//!
//! Reading a query response:
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use postro_wire::{
//!     Frontend,
//!     message::{BackendMessage, DataRow, Encode, backend::*},
//! };
//!
//! let mut buf = BytesMut::new();
//! DataRow::new(vec![Some(Bytes::from_static(b"420")), None]).encode(&mut buf);
//! CommandComplete { tag: "SELECT 1".into() }.encode(&mut buf);
//! ReadyForQuery { status: TransactionStatus::Idle }.encode(&mut buf);
//!
//! let mut frontend = Frontend::new(buf.freeze(), std::io::sink());
//!
//! loop {
//!     match frontend.receive()? {
//!         BackendMessage::DataRow(row) => assert_eq!(row.get(0), Some(&b"420"[..])),
//!         BackendMessage::CommandComplete(cmd) => assert_eq!(cmd.rows_affected(), Some(1)),
//!         BackendMessage::ReadyForQuery(_) => break,
//!         _ => unreachable!(),
//!     }
//! }
//! # Ok::<_, postro_wire::Error>(())
//! ```
//!
//! Sending messages:
//!
//! ```
//! use postro_wire::{Frontend, message::frontend::{Query, Startup}};
//!
//! let mut frontend = Frontend::new(bytes::Bytes::new(), Vec::<u8>::new());
//! frontend.send_startup(&Startup::new("postgres").param("database", "post"))?;
//! frontend.send(Query { sql: "SELECT 1".into() })?;
//! frontend.flush()?;
//! # Ok::<_, postro_wire::Error>(())
//! ```

pub mod common;
mod ext;

// Protocol
pub mod message;

// Stream
pub mod io;
pub mod framing;

// Engine
mod config;
mod frontend;
mod backend;

mod error;

pub use config::Config;
pub use frontend::Frontend;
pub use backend::Backend;
pub use io::{ChunkReader, BufferedReader};
pub use error::{Error, ErrorKind, Result};
