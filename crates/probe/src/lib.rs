pub mod classify;
pub mod identity;
pub mod retry;
pub mod runner;
pub mod transport;

pub use classify::{classify, EXISTS_MARKER, THROTTLE_MARKER};
pub use identity::{IdentitySource, RandomIdentity};
pub use retry::resolve;
pub use transport::HttpProber;
