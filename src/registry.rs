pub mod peer_registry;
pub mod types;

pub use peer_registry::PeerRegistry;
pub use types::{PeerAnnouncement, PeerRecord};
