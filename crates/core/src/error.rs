use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connect error: {0}")]
    Connect(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("proxy error: {0}")]
    Proxy(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
