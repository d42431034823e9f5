use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "tenantprobe",
    about = "Enumerates provisioned accounts from a multi-tenant identity \
             service without submitting login attempts"
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["email", "file", "domain", "tor_test"])
))]
pub struct Cli {
    /// Single email address to validate
    #[arg(short, long)]
    pub email: Option<String>,

    /// File of email addresses to validate, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Check whether DOMAIN is managed by the identity service, then exit
    #[arg(short, long, value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Test Tor connectivity and the circuit pool, then exit
    #[arg(long)]
    pub tor_test: bool,

    /// Base URL of the identity service
    #[arg(short = 'u', long, default_value = "https://login.microsoftonline.com")]
    pub baseurl: String,

    /// Append valid addresses to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Append failed (throttled/errored) addresses to this file
    #[arg(long)]
    pub output_fail: Option<PathBuf>,

    /// Route requests through Tor
    #[arg(long)]
    pub tor: bool,

    /// Local Tor SOCKS port
    #[arg(short = 'p', long, default_value_t = 9050)]
    pub tor_port: u16,

    /// Number of stream-isolated Tor circuits to pool
    #[arg(long, default_value_t = 10)]
    pub tor_pool: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30, value_name = "SECS")]
    pub timeout: u64,

    /// Retry budget per address on throttle or transport error
    #[arg(long, default_value_t = 3, value_name = "N")]
    pub retry: u32,

    /// Maximum number of simultaneous connections
    #[arg(short = 't', long = "max-connections", default_value_t = 20)]
    pub maxconn: usize,

    /// Sleep this many seconds between flow starts
    #[arg(short, long, default_value_t = 0, value_name = "SECS")]
    pub sleep: u64,

    /// Extra header as "Name: Value", repeatable; overrides defaults
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,
}

/// Parses repeatable `-H "Name: Value"` flags on top of the default header
/// set. A flag without a colon is a configuration error.
pub fn merge_headers(extra: &[String]) -> Result<HashMap<String, String>> {
    let mut headers = HashMap::from([("Connection".to_string(), "close".to_string())]);
    for raw in extra {
        let Some((name, value)) = raw.split_once(':') else {
            bail!("malformed header {raw:?}, expected \"Name: Value\"");
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("malformed header {raw:?}, empty name");
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

/// Validates the base URL and strips any trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim_end_matches('/');
    url::Url::parse(trimmed).with_context(|| format!("invalid base URL {raw:?}"))?;
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn input_modes_are_mutually_exclusive() {
        let err = Cli::try_parse_from(["tenantprobe", "-e", "a@b.com", "-f", "list.txt"]);
        assert!(err.is_err());
        let err = Cli::try_parse_from(["tenantprobe"]);
        assert!(err.is_err());
    }

    #[test]
    fn headers_merge_over_defaults() {
        let headers = merge_headers(&[
            "X-Forwarded-For: 10.0.0.1".to_string(),
            "Connection: keep-alive".to_string(),
        ])
        .unwrap();
        assert_eq!(headers.get("X-Forwarded-For").map(String::as_str), Some("10.0.0.1"));
        assert_eq!(headers.get("Connection").map(String::as_str), Some("keep-alive"));
    }

    #[test]
    fn default_headers_close_connections() {
        let headers = merge_headers(&[]).unwrap();
        assert_eq!(headers.get("Connection").map(String::as_str), Some("close"));
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(merge_headers(&["NotAHeader".to_string()]).is_err());
        assert!(merge_headers(&[": value-only".to_string()]).is_err());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let url = normalize_base_url("https://login.microsoftonline.com/").unwrap();
        assert_eq!(url, "https://login.microsoftonline.com");
        assert!(normalize_base_url("not a url").is_err());
    }
}
