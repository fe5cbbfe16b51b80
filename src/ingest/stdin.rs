//! Line-oriented local stream reader

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{info, warn};

use super::LineProcessor;
use crate::modem::protocol::Source;
use crate::shutdown::Shutdown;

/// Feed every line of `reader` to `processor` until end-of-stream
///
/// Returns the number of recognized lines. A read error ends the source the
/// same way end-of-stream does; the rest of the process keeps running.
pub async fn run_line_reader<R>(reader: R, processor: &LineProcessor, mut shutdown: Shutdown) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    let mut recognized = 0;

    info!("Reading modem output from stdin");

    loop {
        line.clear();
        tokio::select! {
            read = reader.read_line(&mut line) => match read {
                Ok(0) => {
                    info!("Stdin closed, local monitoring stopped");
                    break;
                }
                Ok(_) => {
                    if processor.process_line(&line, Source::Stdin) {
                        recognized += 1;
                    }
                }
                Err(e) => {
                    warn!("Stdin read error: {}", e);
                    break;
                }
            },
            _ = shutdown.wait() => {
                info!("Stdin reader stopped by shutdown");
                break;
            }
        }
    }

    recognized
}
