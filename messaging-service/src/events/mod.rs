pub mod publisher;

pub use publisher::{user_channel, EventPublisher, GLOBAL_CHANNEL};
