/// Transport kernel for the session layer.
///
/// Everything in here is transport only: how to reach the REST API, how
/// to hold a WebSocket open, how to turn raw messages into typed frames.
/// None of it knows about sessions, refreshes, or trade locks - those
/// semantics live above, behind the `HttpClient` and `SocketFactory`
/// seams, which is also what makes the upper layers testable without a
/// network.
///
/// - `HttpClient` / `ReqwestHttp`: HTTP requests with bearer attachment
///   and status-to-taxonomy mapping
/// - `PushSocket` / `TungsteniteWs`: an established push connection
/// - `SocketFactory` / `TungsteniteFactory`: authenticated (re)connects
/// - `WsCodec`: raw message to typed frame decoding
pub mod codec;
pub mod rest;
pub mod ws;

pub use codec::WsCodec;
pub use rest::{HttpClient, HttpConfig, ReqwestHttp};
pub use ws::{PushSocket, SocketFactory, TungsteniteFactory, TungsteniteWs, WsConfig};
