use crate::core::errors::ClientError;
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for decoding raw WebSocket messages into typed frames.
///
/// Control messages (ping, pong, close) are handled at the transport
/// level and never reach the codec.
pub trait WsCodec: Send + Sync + 'static {
    /// The typed frame this codec produces.
    type Frame: Send;

    /// Decode a raw data message.
    ///
    /// # Returns
    /// - `Ok(Some(frame))` - successfully decoded frame
    /// - `Ok(None)` - message was ignored/filtered by the codec
    /// - `Err(error)` - failed to decode
    fn decode_message(&self, message: Message) -> Result<Option<Self::Frame>, ClientError>;
}
