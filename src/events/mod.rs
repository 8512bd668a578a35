pub mod dispatcher;
pub mod journal;
pub mod normalizer;

pub use dispatcher::{BusEvent, EventBus, SubscriptionHandle, Topic};
pub use journal::EventJournal;
pub use normalizer::EventNormalizer;
