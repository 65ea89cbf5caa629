use std::io::{self, Write};

use postro_wire::{Backend, BufferedReader, Result};

/// Decode messages sent by a postgres client, starting with the startup message.
pub fn main() -> Result<()> {
    let mut backend = Backend::new(BufferedReader::new(io::stdin().lock()), io::sink());
    let mut stdout = io::stdout().lock();

    let startup = backend.receive_startup()?;
    tracing::info!(user = ?startup.get("user"), database = ?startup.get("database"), "startup");

    serde_json::to_writer(&mut stdout, &startup).map_err(io::Error::from)?;
    writeln!(stdout)?;

    loop {
        let message = match backend.receive() {
            Ok(ok) => ok,
            Err(err) => {
                if super::is_eof(&err, backend.is_partial()) {
                    break;
                }
                return Err(err);
            },
        };

        serde_json::to_writer(&mut stdout, &message).map_err(io::Error::from)?;
        writeln!(stdout)?;
    }

    Ok(())
}
