pub mod broadcast_hub;
pub mod types;

pub use broadcast_hub::BroadcastHub;
pub use types::PushEvent;
