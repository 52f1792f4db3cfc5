mod cli;

use clap::Parser;
use relayex_relayer::start_message_relayer;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let options = cli::Options::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (stop_sender, stop_receiver) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing the current tick");
            let _ = stop_sender.send(true);
        }
    });

    if let Err(err) = start_message_relayer(options.into_config(), stop_receiver).await {
        error!("Message relayer exited with an error: {err}");
        std::process::exit(1);
    }
}
