use tracing::debug;

use tenantprobe_core::{ProbeOutcome, Prober, RetryPolicy};

use crate::classify::classify;

/// Drives bounded re-attempts for one address until the outcome is terminal
/// or the retry budget runs out. Always returns without touching any sink;
/// reporting is the caller's concern.
///
/// The initial outcome comes from the caller's first probe, so the total
/// probe count for an address never exceeds `1 + policy.max_attempts`.
pub async fn resolve(
    address: &str,
    initial: ProbeOutcome,
    policy: RetryPolicy,
    prober: &dyn Prober,
) -> ProbeOutcome {
    if initial.is_terminal() {
        return initial;
    }

    let mut last = initial;
    let mut remaining = policy.max_attempts;
    while remaining > 0 {
        if policy.use_fresh_circuit {
            debug!(address, "rotating to a fresh circuit before re-attempt");
            prober.rotate_circuit();
        }

        debug!(address, remaining, "re-attempting probe");
        let outcome = classify(prober.attempt(address).await);
        if outcome.is_terminal() {
            return outcome;
        }
        last = outcome;
        remaining -= 1;
    }

    // Budget exhausted: the last non-terminal outcome stands. Throttled and
    // errored exhaustion are distinguished downstream by the sink.
    last
}
