use anyhow::Result;
use tokio::signal;

use gsi_bridge::config;
use gsi_bridge::logger;
use gsi_bridge::GsiConnector;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;

    let connector = GsiConnector::new(&config);
    let port = connector.start().await?;
    log::info!(
        "GSI bridge ready; point the game's gamestate integration config at http://localhost:{}/",
        port
    );

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    connector.stop().await;
    log::info!("Shutdown complete.");
    Ok(())
}
