use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use hashserve::{
    cli::Cli,
    config::Settings,
    http::{shutdown_servers, start_servers},
    utils::initialize_logger,
};

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = Settings::new(&args.config).with_context(|| "init config failed")?;
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }

    let _guard = initialize_logger(&settings).with_context(|| "init logger failed")?;

    let mut handles = start_servers(settings.host).await;
    if handles.is_empty() {
        anyhow::bail!("no server instance could be started");
    }
    info!("Server started");

    // 保持主线程运行，直到收到 Ctrl+C
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down");

    shutdown_servers(&mut handles);
    Ok(())
}
