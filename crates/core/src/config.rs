use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Built once from the invocation arguments and shared read-only by every
/// flow. Never mutated after startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: String,
    /// `<base_url>/common/GetCredentialType`, precomputed.
    pub credential_type_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub maxconn: usize,
    /// Pacing delay between flow starts (zero = no pacing).
    pub sleep: Duration,
    /// Headers merged into every probe request.
    pub headers: HashMap<String, String>,
    pub tor: TorConfig,
    pub output: Option<PathBuf>,
    pub output_fail: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retry budget after the initial attempt. 0 = never retry.
    pub max_attempts: u32,
    /// Request a fresh anonymizing circuit before each re-attempt.
    pub use_fresh_circuit: bool,
}

#[derive(Debug, Clone)]
pub struct TorConfig {
    pub enabled: bool,
    pub socks_port: u16,
    /// Number of stream-isolated circuits to keep in the pool.
    pub pool_size: usize,
}

impl RunConfig {
    /// URL for the managed-domain informational check.
    pub fn realm_url(&self) -> String {
        format!("{}/getuserrealm.srf", self.base_url)
    }
}
