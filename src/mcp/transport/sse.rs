//! Server-sent-events transport: a POST endpoint that streams `tools/call`
//! progress notifications as `message` events while the call is in flight,
//! followed by one final event carrying the `JsonRpcResponse` (§4.9 "info"
//! channel). Plain `http::router`'s single-shot POST has no way to surface
//! a call's intermediate chunks; this is the transport that does.

use crate::mcp::{InfoSink, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::McpAdapter;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct McpSseState {
    adapter: Arc<McpAdapter>,
}

pub fn router(adapter: Arc<McpAdapter>) -> Router {
    Router::new()
        .route("/mcp/sse", post(sse_handler))
        .with_state(McpSseState { adapter })
}

async fn sse_handler(
    State(state): State<McpSseState>,
    Json(request): Json<JsonRpcRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Value>(32);

    let notify_tx = tx.clone();
    let sink: InfoSink = Arc::new(move |notification: Value| {
        let notify_tx = notify_tx.clone();
        tokio::spawn(async move {
            let _ = notify_tx.send(notification).await;
        });
    });

    tokio::spawn(async move {
        let response: JsonRpcResponse = state.adapter.dispatch_with_sink(request, Some(sink)).await;
        let encoded = serde_json::to_value(&response).unwrap_or(Value::Null);
        let _ = tx.send(encoded).await;
        // `tx` drops here; once every notification task's clone has also
        // dropped, the channel closes and the stream below ends.
    });

    Sse::new(event_stream(rx)).keep_alive(KeepAlive::default())
}

fn event_stream(rx: mpsc::Receiver<Value>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let value = rx.recv().await?;
        let event = Event::default()
            .json_data(value)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Some((Ok(event), rx))
    })
}
