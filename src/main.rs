mod cli;
mod commands;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use tenantprobe_core::{RetryPolicy, RunConfig, TorConfig};
use tenantprobe_probe::{runner, HttpProber, IdentitySource, RandomIdentity};
use tenantprobe_sink::FileSink;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(build_config(&cli)?);

    if cli.tor_test {
        return commands::run_tor_test(&config).await;
    }

    if let Some(domain) = &cli.domain {
        return commands::run_domain_check(&config, domain).await;
    }

    let addresses = load_addresses(&cli)?;
    if addresses.is_empty() {
        bail!("no addresses to validate");
    }

    if config.tor.enabled {
        commands::test_tor_connectivity(&config)
            .await
            .context("tor requested but not usable at startup")?;
    }

    // Informational pre-check on the first address's domain; a network error
    // here is not fatal, enumeration can still proceed.
    if let Some(domain) = addresses[0].split('@').nth(1) {
        match commands::verify_domain(&config, domain).await {
            Ok(true) => info!(domain, "domain is managed"),
            Ok(false) => {
                if !commands::confirm_unmanaged(domain)? {
                    return Ok(());
                }
            }
            Err(e) => warn!(domain, "domain pre-check failed, continuing: {e}"),
        }
    }

    let identities: Arc<dyn IdentitySource> = Arc::new(RandomIdentity);
    let prober = Arc::new(
        HttpProber::new(Arc::clone(&config), identities)
            .context("failed to build probe transport")?,
    );
    let sink = Arc::new(FileSink::new(config.output.clone(), config.output_fail.clone()));
    let gate = Arc::new(Semaphore::new(config.maxconn));

    info!(
        addresses = addresses.len(),
        maxconn = config.maxconn,
        tor = config.tor.enabled,
        "starting enumeration"
    );
    runner::run(addresses, config, prober, sink, gate).await;

    Ok(())
}

fn build_config(cli: &Cli) -> Result<RunConfig> {
    let base_url = cli::normalize_base_url(&cli.baseurl)?;
    let credential_type_url = format!("{base_url}/common/GetCredentialType");
    let headers: HashMap<String, String> = cli::merge_headers(&cli.headers)?;

    Ok(RunConfig {
        base_url,
        credential_type_url,
        timeout: Duration::from_secs(cli.timeout.max(1)),
        retry: RetryPolicy { max_attempts: cli.retry, use_fresh_circuit: cli.tor },
        maxconn: cli.maxconn.max(1),
        sleep: Duration::from_secs(cli.sleep),
        headers,
        tor: TorConfig {
            enabled: cli.tor,
            socks_port: cli.tor_port,
            pool_size: cli.tor_pool.max(1),
        },
        output: cli.output.clone(),
        output_fail: cli.output_fail.clone(),
    })
}

fn load_addresses(cli: &Cli) -> Result<Vec<String>> {
    if let Some(email) = &cli.email {
        return Ok(vec![email.clone()]);
    }
    let Some(path) = &cli.file else {
        bail!("either --email or --file is required");
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read address list {}", path.display()))?;
    Ok(content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tenantprobe").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn config_derives_credential_type_url() {
        let config = build_config(&cli(&["-e", "a@b.com", "-u", "https://example.com/"])).unwrap();
        assert_eq!(config.credential_type_url, "https://example.com/common/GetCredentialType");
        assert_eq!(config.realm_url(), "https://example.com/getuserrealm.srf");
    }

    #[test]
    fn tor_flag_enables_circuit_rotation() {
        let config = build_config(&cli(&["-e", "a@b.com", "--tor"])).unwrap();
        assert!(config.retry.use_fresh_circuit);
        assert!(config.tor.enabled);

        let config = build_config(&cli(&["-e", "a@b.com"])).unwrap();
        assert!(!config.retry.use_fresh_circuit);
    }

    #[test]
    fn ceilings_are_clamped_to_at_least_one() {
        let config =
            build_config(&cli(&["-e", "a@b.com", "-t", "0", "--tor-pool", "0"])).unwrap();
        assert_eq!(config.maxconn, 1);
        assert_eq!(config.tor.pool_size, 1);
    }

    #[test]
    fn single_email_becomes_one_address() {
        let addresses = load_addresses(&cli(&["-e", "a@b.com"])).unwrap();
        assert_eq!(addresses, vec!["a@b.com".to_string()]);
    }

    #[test]
    fn missing_input_file_is_a_startup_error() {
        let err = load_addresses(&cli(&["-f", "/nonexistent/list.txt"])).unwrap_err();
        assert!(err.to_string().contains("failed to read address list"));
    }
}
