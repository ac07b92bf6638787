use std::path::PathBuf;

use clap::Parser;

/// ocrstream: a distributed OCR streaming service.
#[derive(Parser, Debug)]
#[command(name = "ocrstream-server", version, about)]
pub struct Cli {
    /// Bind address. Overrides `[server].address` from the config file.
    #[arg(long)]
    pub address: Option<String>,

    /// Bind port. Overrides `[server].port`.
    #[arg(long)]
    pub port: Option<u16>,

    /// Worker thread count. Overrides `[server].threads`.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Seconds to wait for in-flight sessions to drain during shutdown.
    #[arg(long)]
    pub shutdown_deadline_secs: Option<u64>,

    /// Path to the TOML config file. Missing file falls back to defaults.
    #[arg(long, default_value = "ocrstream.toml")]
    pub config: PathBuf,
}

impl Cli {
    /// Applies any CLI overrides on top of a loaded [`crate::config::AppConfig`].
    pub fn apply_overrides(&self, mut config: crate::config::AppConfig) -> crate::config::AppConfig {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(threads) = self.threads {
            config.server.threads = threads.max(1);
        }
        if let Some(deadline) = self.shutdown_deadline_secs {
            config.server.shutdown_deadline_secs = deadline;
        }
        config
    }
}
