use ai::SessionConfig;
use anyhow::Context;
use std::{net::SocketAddr, path::PathBuf};

/// 200 MiB, the usual limit of browser upload widgets.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub max_upload_bytes: usize,
    /// Log to `<dir>/app.log` instead of stdout.
    pub log_dir: Option<PathBuf>,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = match lookup("CAPTION_SERVER_ADDR") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid CAPTION_SERVER_ADDR '{}'", v))?,
            // listens on IPv6 and IPv4
            None => SocketAddr::from(([0u16; 8], 3001)),
        };

        let max_upload_bytes = match lookup("CAPTION_MAX_UPLOAD_BYTES") {
            Some(v) => v
                .parse()
                .with_context(|| format!("invalid CAPTION_MAX_UPLOAD_BYTES '{}'", v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let log_dir = lookup("CAPTION_LOG_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            addr,
            max_upload_bytes,
            log_dir,
            session: SessionConfig::from_lookup(lookup)?,
        })
    }
}
