use clap::Parser;
use color_eyre::eyre;
use std::{io, path::PathBuf};
use tokio_util::sync::CancellationToken;
use webhook_receiver::config::Configuration;

/// Receive webhooks signed with a shared key
#[derive(Parser)]
#[command(about, author, version)]
struct Args {
    /// Path to the configuration file
    #[clap(long, short)]
    config: PathBuf,
}

#[cfg(target_family = "unix")]
async fn termination_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(target_family = "unix"))]
async fn termination_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

async fn boot() -> eyre::Result<()> {
    let args = Args::parse();
    let config = Configuration::load(args.config).await?;
    webhook_receiver::observability::initialise()?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(error) = termination_signal().await {
                tracing::error!(%error, "failed to listen for termination signals");
            }

            shutdown.cancel();
        }
    });

    webhook_receiver::http::run(config, shutdown).await
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(boot())
}
