use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use tenantprobe_core::RunConfig;
use tenantprobe_probe::transport::circuit_proxy_url;

const MANAGED_MARKER: &str = "<NameSpaceType>Managed</NameSpaceType>";
const TOR_OK_MARKER: &str = "Congratulations. This browser is configured to use Tor.";
const TOR_FAIL_MARKER: &str = "Sorry. You are not using Tor.";

const TOR_CHECK_URL: &str = "http://check.torproject.org";
const EXIT_IP_URL: &str = "https://api.ipify.org";

fn client(timeout: Duration, proxy_url: Option<String>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(timeout).connect_timeout(timeout);
    if let Some(proxy_url) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url).context("invalid proxy URL")?);
    }
    builder.build().context("failed to build HTTP client")
}

fn run_proxy(config: &RunConfig) -> Option<String> {
    config
        .tor
        .enabled
        .then(|| format!("socks5h://127.0.0.1:{}", config.tor.socks_port))
}

/// One informational GET against the realm endpoint: is this domain managed
/// by the identity service?
pub async fn verify_domain(config: &RunConfig, domain: &str) -> Result<bool> {
    let client = client(config.timeout, run_proxy(config))?;
    let body = client
        .get(config.realm_url())
        .query(&[("login", format!("user@{domain}").as_str()), ("xml", "1")])
        .send()
        .await
        .with_context(|| format!("realm lookup for {domain} failed"))?
        .text()
        .await
        .context("realm lookup returned an unreadable body")?;
    Ok(body.contains(MANAGED_MARKER))
}

/// `--domain` mode: report managed/unmanaged and exit.
pub async fn run_domain_check(config: &RunConfig, domain: &str) -> Result<()> {
    if verify_domain(config, domain).await? {
        info!(domain, "domain is MANAGED; enumeration against it should be reliable");
    } else {
        warn!(domain, "domain is NOT MANAGED; enumeration may give unreliable results");
    }
    Ok(())
}

/// Base Tor connectivity check through the SOCKS endpoint. Fatal when Tor is
/// required for a run but unreachable.
pub async fn test_tor_connectivity(config: &RunConfig) -> Result<()> {
    let proxy = format!("socks5h://127.0.0.1:{}", config.tor.socks_port);
    let client = client(config.timeout, Some(proxy))?;
    let body = client
        .get(TOR_CHECK_URL)
        .send()
        .await
        .context("tor check request failed")?
        .text()
        .await
        .context("tor check returned an unreadable body")?;

    if body.contains(TOR_OK_MARKER) {
        info!("tor is working correctly");
        Ok(())
    } else if body.contains(TOR_FAIL_MARKER) {
        bail!("traffic is not leaving through tor");
    } else {
        bail!("unexpected response from tor check page");
    }
}

/// `--tor-test` mode: verify base connectivity, then exercise every circuit
/// in the pool and log its exit IP.
pub async fn run_tor_test(config: &RunConfig) -> Result<()> {
    info!("testing tor connectivity...");
    test_tor_connectivity(config).await?;

    info!(pool_size = config.tor.pool_size, "testing tor circuits...");
    let mut failures = 0usize;
    for circuit in 0..config.tor.pool_size {
        let proxy = circuit_proxy_url(config.tor.socks_port, circuit);
        let exit_ip = async {
            client(config.timeout, Some(proxy))?
                .get(EXIT_IP_URL)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await
                .map_err(anyhow::Error::from)
        }
        .await;

        match exit_ip {
            Ok(ip) => info!(circuit, exit_ip = %ip.trim(), "circuit ok"),
            Err(e) => {
                error!(circuit, "circuit failed: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} circuits failed", config.tor.pool_size);
    }
    info!("tor configuration test completed");
    Ok(())
}

/// y/N prompt before enumerating against an unmanaged domain.
pub fn confirm_unmanaged(domain: &str) -> Result<bool> {
    loop {
        print!(
            "Domain {domain} is NOT MANAGED by the identity service; results may be \
             unreliable. Continue? [y/N] "
        );
        std::io::stdout().flush()?;

        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        match answer.trim().to_ascii_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" | "" => return Ok(false),
            _ => continue,
        }
    }
}
