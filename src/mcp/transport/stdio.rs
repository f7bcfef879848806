//! Line-delimited JSON-RPC over stdin/stdout, for MCP clients that launch
//! the server as a subprocess. A streaming `tools/call` interleaves
//! `tools/call/progress` notification lines ahead of the final response
//! line, each written as it is produced (§4.9 "info" channel).

use crate::mcp::{InfoSink, JsonRpcRequest, JsonRpcResponse, McpAdapter};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

pub async fn serve(adapter: Arc<McpAdapter>) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let stdout = Arc::new(Mutex::new(io::stdout()));
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => {
                let sink = notification_sink(stdout.clone());
                adapter.dispatch_with_sink(request, Some(sink)).await
            }
            Err(e) => {
                warn!("mcp stdio: failed to parse request: {e}");
                JsonRpcResponse::parse_error()
            }
        };
        write_line(&stdout, &response).await?;
    }
    Ok(())
}

/// A chunk arrives synchronously from the tool's `stream_callback`, so it is
/// forwarded to the writer task via a spawned write rather than an `.await`
/// inside the callback itself.
fn notification_sink(stdout: Arc<Mutex<Stdout>>) -> InfoSink {
    Arc::new(move |notification: Value| {
        let stdout = stdout.clone();
        tokio::spawn(async move {
            let _ = write_line(&stdout, &notification).await;
        });
    })
}

async fn write_line(stdout: &Arc<Mutex<Stdout>>, value: &impl serde::Serialize) -> anyhow::Result<()> {
    let encoded = serde_json::to_string(value)?;
    let mut out = stdout.lock().await;
    out.write_all(encoded.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
