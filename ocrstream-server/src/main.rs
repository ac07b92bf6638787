use clap::Parser;
use ocrstream_server::cli::Cli;
use ocrstream_server::config::AppConfig;
use ocrstream_server::server::ServerHost;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    let config = cli.apply_overrides(config);

    init_tracing(&config);

    ServerHost::new(config).run().await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());

    if config.logging.log_to_file {
        let file_appender = tracing_appender::rolling::never(".", &config.logging.log_file);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leaking the guard keeps the background writer thread alive for
        // the process lifetime; the process only ever exits once, at the
        // very end of `main`.
        Box::leak(Box::new(guard));
        registry.with(tracing_subscriber::fmt::layer().with_writer(non_blocking)).init();
    } else {
        registry.init();
    }
}
