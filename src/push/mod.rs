pub mod codec;
pub mod manager;
pub mod protocol;

pub use codec::StorefrontCodec;
pub use manager::{PushConfig, PushConnectionManager};
pub use protocol::WireFrame;
