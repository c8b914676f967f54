use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    /// Quiet period before an open board's canvas is saved.
    pub autosave_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path = var("EXCALIBOARD_DB_PATH").unwrap_or_else(|| "excaliboard.db".into());
        let host = var("EXCALIBOARD_HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port: u16 = var("EXCALIBOARD_PORT")
            .unwrap_or_else(|| "3210".into())
            .parse()
            .context("EXCALIBOARD_PORT must be a port number")?;
        let autosave_ms: u64 = var("EXCALIBOARD_AUTOSAVE_MS")
            .unwrap_or_else(|| "1000".into())
            .parse()
            .context("EXCALIBOARD_AUTOSAVE_MS must be a number of milliseconds")?;

        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            db_path: db_path.into(),
            addr,
            autosave_interval: Duration::from_millis(autosave_ms),
        })
    }
}
