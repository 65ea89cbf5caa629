use std::io::{self, Write};

use postro_wire::{BufferedReader, Frontend, Result, message::BackendMessage};

/// Decode messages sent by a postgres server.
pub fn main() -> Result<()> {
    let mut frontend = Frontend::new(BufferedReader::new(io::stdin().lock()), io::sink());
    let mut stdout = io::stdout().lock();
    let mut rows = 0usize;

    loop {
        match frontend.receive() {
            Ok(message) => {
                if let BackendMessage::DataRow(_) = message {
                    rows += 1;
                }
                serde_json::to_writer(&mut stdout, &message).map_err(io::Error::from)?;
                writeln!(stdout)?;
            },
            Err(err) => {
                if super::is_eof(&err, frontend.is_partial()) {
                    break;
                }
                return Err(err);
            },
        }
    }

    tracing::info!(rows, allocations = frontend.value_allocations(), "done");

    Ok(())
}
