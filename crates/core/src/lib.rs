pub mod config;
pub mod error;
pub mod types;

pub use config::{RetryPolicy, RunConfig, TorConfig};
pub use error::ProbeError;
pub use types::*;
