pub mod attack_store;
pub mod classifier;
pub mod tap;
pub mod types;

pub use attack_store::AttackStore;
pub use classifier::classify;
pub use tap::{run_tap_pump, TapChunk};
pub use types::{AttackRecord, Severity};
