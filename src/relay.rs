pub mod relay_server;
pub mod session;

pub use relay_server::RelayServer;
pub use session::RelaySession;
