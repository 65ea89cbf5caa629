//! Print captured postgres traffic as JSON lines.
//!
//! ```text
//! cargo run -p example -- backend < server.bin
//! cargo run -p example -- frontend < client.bin
//! ```
use tracing::trace_span;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use postro_wire::Result;

mod backend;
mod frontend;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let side = std::env::args().nth(1);

    match side.as_deref() {
        Some("frontend") => trace_span!("frontend").in_scope(frontend::main),
        Some("backend") | None => trace_span!("backend").in_scope(backend::main),
        Some(other) => {
            tracing::error!("unknown stream side `{other}`, expected `backend` or `frontend`");
            std::process::exit(2);
        },
    }
}

/// Returns `true` if the stream ends cleanly at a message boundary.
fn is_eof(err: &postro_wire::Error, partial: bool) -> bool {
    let postro_wire::ErrorKind::Io(io) = err.kind() else {
        return false;
    };
    if io.kind() != std::io::ErrorKind::UnexpectedEof {
        return false;
    }
    if partial {
        tracing::warn!("stream ends in the middle of a message");
    }
    true
}
