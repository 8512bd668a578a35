use crate::core::errors::ClientError;
use crate::core::kernel::codec::WsCodec;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{instrument, warn};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// An established push connection, pure transport.
///
/// `next_frame` yields decoded frames until the peer closes or the
/// transport fails; `None` means the connection is gone and the caller
/// decides whether to reconnect.
#[async_trait]
pub trait PushSocket: Send {
    type Frame: Send;

    /// Receive the next decoded frame.
    async fn next_frame(&mut self) -> Option<Result<Self::Frame, ClientError>>;

    /// Close the connection. Best effort; safe to call more than once.
    async fn close(&mut self);
}

/// Factory seam for establishing authenticated push connections.
///
/// The connection manager re-invokes this on every (re)connect with the
/// access token current at that moment, so reconnects always carry fresh
/// credentials. Tests inject scripted factories instead of dialing out.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    type Frame: Send;

    async fn connect(
        &self,
        access_token: &str,
    ) -> Result<Box<dyn PushSocket<Frame = Self::Frame>>, ClientError>;
}

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;
type WsStream =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Tungstenite-based push socket, decoding frames through a codec.
pub struct TungsteniteWs<C: WsCodec> {
    write: WsSink,
    read: WsStream,
    codec: C,
}

#[async_trait]
impl<C: WsCodec> PushSocket for TungsteniteWs<C> {
    type Frame = C::Frame;

    async fn next_frame(&mut self) -> Option<Result<Self::Frame, ClientError>> {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Ping(data))) => {
                    // Answer pings at the transport level.
                    if let Err(e) = self.write.send(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => return None,
                Some(Ok(message)) => match self.codec.decode_message(message) {
                    Ok(Some(frame)) => return Some(Ok(frame)),
                    Ok(None) => {} // Codec chose to ignore this message
                    Err(e) => return Some(Err(e)),
                },
                Some(Err(e)) => {
                    return Some(Err(ClientError::NetworkUnavailable(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.write.send(Message::Close(None)).await;
    }
}

/// Factory that dials the push endpoint with tungstenite, authenticating
/// via a bearer header on the upgrade request.
pub struct TungsteniteFactory<C> {
    url: String,
    config: WsConfig,
    codec: C,
}

impl<C> TungsteniteFactory<C> {
    pub fn new(url: String, codec: C) -> Self {
        Self {
            url,
            config: WsConfig::default(),
            codec,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl<C: WsCodec + Clone> SocketFactory for TungsteniteFactory<C> {
    type Frame = C::Frame;

    #[instrument(skip(self, access_token), fields(url = %self.url))]
    async fn connect(
        &self,
        access_token: &str,
    ) -> Result<Box<dyn PushSocket<Frame = Self::Frame>>, ClientError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| ClientError::Other(format!("Invalid push URL: {}", e)))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|e| ClientError::Other(format!("Invalid bearer header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let (stream, _) = tokio::time::timeout(connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                ClientError::ConnectionTimeout("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| {
                ClientError::NetworkUnavailable(format!("WebSocket connection failed: {}", e))
            })?;

        let (write, read) = stream.split();
        Ok(Box::new(TungsteniteWs {
            write,
            read,
            codec: self.codec.clone(),
        }))
    }
}
