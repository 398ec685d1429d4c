// Newline-delimited JSON driver: one request per input line, one response
// per output line, in order.

use crate::core::blocklist::BlocklistStore;
use crate::core::delegation::DelegationStore;
use crate::core::errors::ModerationError;
use crate::core::muted_words::MutedWordStore;
use crate::rpc::protocol::{Request, Response};
use crate::rpc::Router;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Serve until the reader is exhausted. Returns the number of requests handled.
pub async fn serve<D, B, M, R, W>(
    router: &Router<D, B, M>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<u64>
where
    D: DelegationStore,
    B: BlocklistStore,
    M: MutedWordStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => router.handle(request).await,
            Err(e) => {
                tracing::warn!("Malformed request line: {}", e);
                Response::err(
                    Value::Null,
                    &ModerationError::Validation(format!("malformed request: {}", e)),
                )
            }
        };

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        handled += 1;
    }

    Ok(handled)
}
