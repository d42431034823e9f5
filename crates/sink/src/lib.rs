use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use tenantprobe_core::{FlowResult, ReportSink, Validity};

/// Logs every terminal result and appends addresses to the configured output
/// files: valid addresses to one, throttled/errored addresses to the other.
///
/// Files are created on first write. Each record is one line written with a
/// single append, so concurrent flows never interleave partial lines. A
/// failed append is logged and dropped; it never aborts the run.
pub struct FileSink {
    valid_path: Option<PathBuf>,
    fail_path: Option<PathBuf>,
}

impl FileSink {
    pub fn new(valid_path: Option<PathBuf>, fail_path: Option<PathBuf>) -> Self {
        Self { valid_path, fail_path }
    }

    async fn append(path: &Path, address: &str) {
        let line = format!("{address}\n");
        let file = OpenOptions::new().create(true).append(true).open(path).await;
        match file {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    error!(path = %path.display(), address, "append failed: {e}");
                }
            }
            Err(e) => error!(path = %path.display(), address, "open failed: {e}"),
        }
    }
}

#[async_trait]
impl ReportSink for FileSink {
    async fn report(&self, result: &FlowResult) {
        let outcome = &result.outcome;
        if outcome.is_terminal() {
            if outcome.validity == Validity::Valid {
                info!(address = %result.address, "VALID");
                if let Some(path) = &self.valid_path {
                    Self::append(path, &result.address).await;
                }
            } else {
                info!(address = %result.address, "INVALID");
            }
        } else if outcome.throttled {
            warn!(address = %result.address, "THROTTLED");
            if let Some(path) = &self.fail_path {
                Self::append(path, &result.address).await;
            }
        } else {
            let cause = outcome.cause.as_deref().unwrap_or("unknown failure");
            error!(address = %result.address, cause, "probe failed");
            if let Some(path) = &self.fail_path {
                Self::append(path, &result.address).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantprobe_core::ProbeOutcome;

    fn scratch(name: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("tenantprobe-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        path
    }

    fn result(address: &str, outcome: ProbeOutcome) -> FlowResult {
        FlowResult { address: address.to_string(), outcome }
    }

    #[tokio::test]
    async fn valid_addresses_land_in_valid_file_only() {
        let valid = scratch("valid.txt");
        let fail = scratch("valid-fail.txt");
        let sink = FileSink::new(Some(valid.clone()), Some(fail.clone()));

        sink.report(&result("a@b.com", ProbeOutcome::valid())).await;
        sink.report(&result("c@b.com", ProbeOutcome::invalid())).await;

        let contents = tokio::fs::read_to_string(&valid).await.unwrap();
        assert_eq!(contents, "a@b.com\n");
        assert!(tokio::fs::metadata(&fail).await.is_err());

        let _ = tokio::fs::remove_file(&valid).await;
    }

    #[tokio::test]
    async fn throttled_and_errored_addresses_land_in_fail_file() {
        let fail = scratch("fail.txt");
        let sink = FileSink::new(None, Some(fail.clone()));

        sink.report(&result("t@b.com", ProbeOutcome::throttled())).await;
        sink.report(&result("e@b.com", ProbeOutcome::transport_failure("timeout after 30s")))
            .await;

        let contents = tokio::fs::read_to_string(&fail).await.unwrap();
        assert_eq!(contents, "t@b.com\ne@b.com\n");

        let _ = tokio::fs::remove_file(&fail).await;
    }

    #[tokio::test]
    async fn unconfigured_paths_write_nothing() {
        let sink = FileSink::new(None, None);
        sink.report(&result("a@b.com", ProbeOutcome::valid())).await;
        sink.report(&result("t@b.com", ProbeOutcome::throttled())).await;
    }

    #[tokio::test]
    async fn appends_accumulate_across_reports() {
        let valid = scratch("accumulate.txt");
        let sink = FileSink::new(Some(valid.clone()), None);

        for address in ["one@b.com", "two@b.com", "three@b.com"] {
            sink.report(&result(address, ProbeOutcome::valid())).await;
        }

        let contents = tokio::fs::read_to_string(&valid).await.unwrap();
        assert_eq!(contents.lines().count(), 3);

        let _ = tokio::fs::remove_file(&valid).await;
    }
}
