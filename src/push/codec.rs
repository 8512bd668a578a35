use crate::core::errors::ClientError;
use crate::core::kernel::WsCodec;
use crate::push::protocol::WireFrame;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// Decodes storefront push frames: JSON objects carrying a `Type`
/// discriminator. Frames with an unknown discriminator are ignored so a
/// server rollout of new frame types never breaks existing clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorefrontCodec;

impl WsCodec for StorefrontCodec {
    type Frame = WireFrame;

    fn decode_message(&self, message: Message) -> Result<Option<Self::Frame>, ClientError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                ClientError::Deserialization(format!("Invalid UTF-8 in binary message: {}", e))
            })?,
            _ => return Ok(None), // Ignore other message types
        };

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::Deserialization(format!("Failed to parse JSON: {}", e)))?;

        let Some(frame_type) = value
            .get("Type")
            .and_then(Value::as_str)
            .map(String::from)
        else {
            return Ok(None);
        };

        let decode = |label: &str, e: serde_json::Error| {
            ClientError::Deserialization(format!("Failed to parse {} frame: {}", label, e))
        };

        let frame = match frame_type.as_str() {
            "ReceiveNotification" => WireFrame::Notification(
                serde_json::from_value(value).map_err(|e| decode("notification", e))?,
            ),
            "ReceiveTextMessage" => WireFrame::TextMessage(
                serde_json::from_value(value).map_err(|e| decode("text message", e))?,
            ),
            "ReceiveMediaMessage" => WireFrame::MediaMessage(
                serde_json::from_value(value).map_err(|e| decode("media message", e))?,
            ),
            "ReceiveItemMessage" => WireFrame::ItemMessage(
                serde_json::from_value(value).map_err(|e| decode("item message", e))?,
            ),
            "ReceiveUnboxResult" => WireFrame::UnboxResult(
                serde_json::from_value(value).map_err(|e| decode("unbox result", e))?,
            ),
            "TradeLockUpdated" => WireFrame::TradeLockUpdated(
                serde_json::from_value(value).map_err(|e| decode("trade lock", e))?,
            ),
            _ => return Ok(None),
        };

        Ok(Some(frame))
    }
}
