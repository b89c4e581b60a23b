pub mod crc;
pub mod crypto;
pub mod devices;
pub mod error;
pub mod metrics;
pub mod options;
pub mod prelude;
pub mod sems;
pub mod server;
pub mod timestamp;

use tokio_util::sync::CancellationToken;

use crate::prelude::*;
use crate::sems::batsignal;

const CARGO_PKG_NAME: &str = env!("CARGO_PKG_NAME");
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs the MITM server and the metrics scrape endpoint until SIGINT or
/// SIGTERM.
pub async fn serve(batsignal_mode: bool, sems_passthrough: bool) -> Result<()> {
    if !sems_passthrough {
        bail!("SEMS emulator not yet implemented");
    }
    let shutdown = CancellationToken::new();

    // handle signals
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!("couldn't listen for SIGTERM: {err}");
                return;
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    error!("couldn't listen for SIGINT: {err}");
                }
            }
            _ = sigterm.recv() => {}
        }
        info!("signal received, initiating shutdown");
        signal_shutdown.cancel();
    });

    if batsignal_mode {
        tokio::spawn(batsignal::run_curve_sampler(shutdown.child_token()));
    }

    info!("starting metrics server on port {}", metrics::METRICS_PORT);
    let metrics_task = tokio::spawn(metrics::serve_scrape_endpoint(shutdown.clone()));

    let result = Server::new(batsignal_mode).serve(shutdown.clone()).await;

    // stop the scrape endpoint along with the accept loop
    shutdown.cancel();
    metrics_task.await??;
    info!("shutdown complete");
    result
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct VersionInfo {
    project_name: &'static str,
    version: &'static str,
}

/// Prints version information as JSON.
pub fn print_version() -> Result<()> {
    let version = serde_json::to_string(&VersionInfo {
        project_name: CARGO_PKG_NAME,
        version: CARGO_PKG_VERSION,
    })?;
    println!("{version}");
    Ok(())
}
