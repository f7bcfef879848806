//! Exposes the engine's tool catalog over MCP-shaped JSON-RPC 2.0 (§4.9).
//!
//! Standard methods (`tools/list`, `tools/call`) and the custom search
//! methods (`tools/find`, `tools/search`) are handled by one dispatcher so
//! both share the same transport and envelope — there is no separate
//! middleware seam grafted onto a third-party server loop.

mod adapter;
mod catalog;
mod finder;
mod jsonrpc;
mod schema;
pub mod transport;

pub use adapter::{InfoSink, McpAdapter};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
