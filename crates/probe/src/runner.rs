use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

use tenantprobe_core::{FlowResult, Prober, ReportSink, RunConfig};

use crate::classify::classify;
use crate::retry;

/// Runs one probe-and-retry flow per input address, at most `maxconn` of them
/// holding a network slot at once. Results stream to the sink as each flow
/// finishes; nothing is batched and no ordering is imposed across addresses.
///
/// Ctrl-C closes the admission gate: flows still waiting for a slot return
/// without probing, in-flight flows finish their current resolve and report.
/// Returns the number of results reported.
pub async fn run(
    addresses: Vec<String>,
    config: Arc<RunConfig>,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn ReportSink>,
    gate: Arc<Semaphore>,
) -> usize {
    let total = addresses.len();
    let (result_tx, mut result_rx) = mpsc::channel::<FlowResult>(config.maxconn.max(1) * 2);

    for (uid, address) in addresses.into_iter().enumerate() {
        let config = Arc::clone(&config);
        let prober = Arc::clone(&prober);
        let gate = Arc::clone(&gate);
        let result_tx = result_tx.clone();

        tokio::spawn(async move {
            // A closed gate means shutdown: drop the flow without probing.
            let Ok(_permit) = gate.acquire().await else {
                debug!(address = %address, "gate closed, flow abandoned");
                return;
            };

            // Pace flow starts; the first flow goes immediately.
            if uid > 0 && !config.sleep.is_zero() {
                tokio::time::sleep(config.sleep).await;
            }

            let initial = classify(prober.attempt(&address).await);
            let outcome =
                retry::resolve(&address, initial, config.retry, prober.as_ref()).await;

            // Receiver gone means the run is tearing down; nothing to report to.
            let _ = result_tx.send(FlowResult { address, outcome }).await;
        });
    }
    drop(result_tx);

    let mut reported = 0usize;
    let mut closing = false;
    loop {
        tokio::select! {
            maybe = result_rx.recv() => match maybe {
                Some(result) => {
                    sink.report(&result).await;
                    reported += 1;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !closing => {
                info!("shutdown signal received, abandoning queued flows");
                gate.close();
                closing = true;
            }
        }
    }

    info!(reported, total, "enumeration finished");
    reported
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tenantprobe_core::{ProbeOutcome, RawResult, RetryPolicy, TorConfig, Validity};

    /// Tracks the high-water mark of concurrently in-flight probes.
    struct GaugeProber {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        body: &'static str,
    }

    impl GaugeProber {
        fn new(body: &'static str) -> Self {
            Self { in_flight: AtomicUsize::new(0), peak: AtomicUsize::new(0), body }
        }
    }

    #[async_trait]
    impl Prober for GaugeProber {
        async fn attempt(&self, _address: &str) -> RawResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.body.to_string())
        }

        fn rotate_circuit(&self) {}
    }

    #[derive(Default)]
    struct CollectSink {
        results: Mutex<Vec<FlowResult>>,
    }

    #[async_trait]
    impl ReportSink for CollectSink {
        async fn report(&self, result: &FlowResult) {
            self.results.lock().unwrap().push(result.clone());
        }
    }

    fn config(maxconn: usize) -> Arc<RunConfig> {
        Arc::new(RunConfig {
            base_url: "https://login.microsoftonline.com".to_string(),
            credential_type_url: "https://login.microsoftonline.com/common/GetCredentialType"
                .to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy { max_attempts: 0, use_fresh_circuit: false },
            maxconn,
            sleep: Duration::ZERO,
            headers: HashMap::new(),
            tor: TorConfig { enabled: false, socks_port: 9050, pool_size: 1 },
            output: None,
            output_fail: None,
        })
    }

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{i}@example.com")).collect()
    }

    #[tokio::test]
    async fn every_address_yields_exactly_one_result() {
        let prober = Arc::new(GaugeProber::new(r#"{"IfExistsResult":1,"ThrottleStatus":0,"#));
        let sink = Arc::new(CollectSink::default());
        let gate = Arc::new(Semaphore::new(4));

        let reported =
            run(addresses(25), config(4), prober, sink.clone(), gate).await;

        assert_eq!(reported, 25);
        let mut seen: Vec<String> = sink
            .results
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.address.clone())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn in_flight_probes_never_exceed_ceiling() {
        let prober = Arc::new(GaugeProber::new(r#"{"IfExistsResult":0,"ThrottleStatus":0,"#));
        let sink = Arc::new(CollectSink::default());
        let maxconn = 3;
        let gate = Arc::new(Semaphore::new(maxconn));

        run(addresses(30), config(maxconn), prober.clone(), sink, gate).await;

        assert!(prober.peak.load(Ordering::SeqCst) <= maxconn);
        assert!(prober.peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn valid_bodies_surface_as_valid_results() {
        let prober = Arc::new(GaugeProber::new(r#"{"IfExistsResult":0,"ThrottleStatus":0,"#));
        let sink = Arc::new(CollectSink::default());
        let gate = Arc::new(Semaphore::new(2));

        run(addresses(3), config(2), prober, sink.clone(), gate).await;

        for result in sink.results.lock().unwrap().iter() {
            assert_eq!(result.outcome.validity, Validity::Valid);
            assert!(result.outcome.is_terminal());
        }
    }

    #[tokio::test]
    async fn fail_file_addresses_reproduce_non_terminal_outcomes() {
        use tenantprobe_sink::FileSink;

        let fail = std::env::temp_dir()
            .join(format!("tenantprobe-{}-roundtrip-fail.txt", std::process::id()));
        let _ = std::fs::remove_file(&fail);

        let prober = Arc::new(GaugeProber::new(r#"{"IfExistsResult":0,"ThrottleStatus":1,"#));
        let sink = Arc::new(FileSink::new(None, Some(fail.clone())));
        let gate = Arc::new(Semaphore::new(2));

        run(addresses(3), config(2), prober.clone(), sink, gate).await;

        let recorded = tokio::fs::read_to_string(&fail).await.unwrap();
        let recorded: Vec<&str> = recorded.lines().collect();
        assert_eq!(recorded.len(), 3);

        // Re-running each recorded address against the same responses must
        // stay non-terminal through the whole retry budget.
        let policy = RetryPolicy { max_attempts: 2, use_fresh_circuit: false };
        for address in recorded {
            let initial = classify(prober.attempt(address).await);
            assert!(!initial.is_terminal());
            let replayed = retry::resolve(address, initial, policy, prober.as_ref()).await;
            assert!(!replayed.is_terminal());
            assert!(replayed.throttled);
        }

        let _ = tokio::fs::remove_file(&fail).await;
    }

    #[tokio::test]
    async fn throttled_run_reports_non_terminal_outcomes() {
        let prober = Arc::new(GaugeProber::new(r#"{"IfExistsResult":0,"ThrottleStatus":1,"#));
        let sink = Arc::new(CollectSink::default());
        let gate = Arc::new(Semaphore::new(2));

        run(addresses(2), config(2), prober, sink.clone(), gate).await;

        for result in sink.results.lock().unwrap().iter() {
            assert!(result.outcome.throttled);
            assert_eq!(result.outcome, ProbeOutcome::throttled());
        }
    }
}
