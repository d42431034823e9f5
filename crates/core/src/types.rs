use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
    /// Only while the outcome is throttled or errored.
    Unknown,
}

/// Classified result of a single probe attempt.
///
/// Invariant: a known validity implies neither throttled nor errored. An
/// outcome is terminal for its flow iff it is neither throttled nor errored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub validity: Validity,
    pub throttled: bool,
    /// Transport failure detail; present iff the attempt errored.
    pub cause: Option<String>,
}

impl ProbeOutcome {
    pub fn valid() -> Self {
        Self { validity: Validity::Valid, throttled: false, cause: None }
    }

    pub fn invalid() -> Self {
        Self { validity: Validity::Invalid, throttled: false, cause: None }
    }

    pub fn throttled() -> Self {
        Self { validity: Validity::Unknown, throttled: true, cause: None }
    }

    pub fn transport_failure(cause: impl Into<String>) -> Self {
        Self { validity: Validity::Unknown, throttled: false, cause: Some(cause.into()) }
    }

    pub fn is_errored(&self) -> bool {
        self.cause.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        !self.throttled && !self.is_errored()
    }
}

/// One probe request, constructed fresh per attempt. The identity string is
/// re-drawn from the identity source on every attempt, retries included.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub address: String,
    pub target_url: String,
    pub headers: HashMap<String, String>,
    pub identity: &'static str,
}

/// Final result for one input address. Flows are independent; results carry
/// no ordering relative to each other.
#[derive(Debug, Clone)]
pub struct FlowResult {
    pub address: String,
    pub outcome: ProbeOutcome,
}

/// Raw result of one transport attempt: the response body, or the tagged
/// transport failure. No retry logic behind this seam.
pub type RawResult = Result<String, ProbeError>;

/// Single-attempt probe transport. Implementations perform exactly one
/// network call per `attempt`; rotation swaps the apparent network origin
/// used by subsequent attempts.
#[async_trait]
pub trait Prober: Send + Sync + 'static {
    async fn attempt(&self, address: &str) -> RawResult;

    fn rotate_circuit(&self);
}

/// Consumes terminal flow results as they become available.
#[async_trait]
pub trait ReportSink: Send + Sync + 'static {
    async fn report(&self, result: &FlowResult);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_outcomes() {
        assert!(ProbeOutcome::valid().is_terminal());
        assert!(ProbeOutcome::invalid().is_terminal());
        assert!(!ProbeOutcome::throttled().is_terminal());
        assert!(!ProbeOutcome::transport_failure("connect error").is_terminal());
    }

    #[test]
    fn errored_iff_cause_present() {
        assert!(ProbeOutcome::transport_failure("timeout after 30s").is_errored());
        assert!(!ProbeOutcome::throttled().is_errored());
        assert!(!ProbeOutcome::valid().is_errored());
    }

    #[test]
    fn known_validity_implies_no_retry_signal() {
        for outcome in [ProbeOutcome::valid(), ProbeOutcome::invalid()] {
            assert!(!outcome.throttled);
            assert!(!outcome.is_errored());
        }
    }
}
