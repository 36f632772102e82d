//! Receives operating-mode changes from an external controller
//!
//! The protocol is line based: every line carries one integer mode code. Lines that do not
//! parse, or carry a code outside 0-9, are dropped and the registry stays unchanged.

use std::sync::Arc;

use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::domain::ModeChange;
use crate::domain::ModeRegistry;
use crate::error::Result;

/// Where mode changes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeSource {
    /// Connect to a line-oriented TCP server, `host:port`
    Tcp(String),
    /// Keep the initial mode for the whole run
    Disabled,
}

pub struct ModeListener {
    source: ModeSource,
    registry: Arc<ModeRegistry>,
}

impl ModeListener {
    pub fn new(source: ModeSource, registry: Arc<ModeRegistry>) -> Self {
        Self { source, registry }
    }

    /// Applies mode changes until the source is exhausted or shutdown is requested.
    ///
    /// An unreachable server is not an error: the run continues with the current mode.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        let addr = match &self.source {
            ModeSource::Disabled => {
                tracing::info!("no mode source configured");
                return;
            }
            ModeSource::Tcp(addr) => addr,
        };

        let stream = tokio::select! {
            _ = cancellation_token.cancelled() => return,
            stream = TcpStream::connect(addr.as_str()) => stream,
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(
                    "could not connect to mode server {}: {}; running without mode changes",
                    addr,
                    e
                );
                return;
            }
        };
        tracing::info!("connected to mode server {}", addr);

        match apply_mode_lines(BufReader::new(stream), &self.registry, cancellation_token).await {
            Ok(applied) => tracing::info!(applied, "mode server stream ended"),
            Err(e) => tracing::warn!("mode server connection failed: {}", e),
        }
    }
}

/// Reads mode codes line by line and applies each valid one to `registry`.
///
/// Returns the number of accepted messages, reserved codes included.
pub async fn apply_mode_lines<R>(
    mut reader: R,
    registry: &ModeRegistry,
    cancellation_token: CancellationToken,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut applied = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            read = reader.read_until(b'\n', &mut buf) => read?,
        };
        if read == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        match line.parse::<ModeChange>() {
            Ok(change) => {
                registry.apply(change);
                applied += 1;
            }
            Err(e) => tracing::debug!("ignoring mode message: {}", e),
        }
    }
    Ok(applied)
}
