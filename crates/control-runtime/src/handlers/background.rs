//! Periodic control-plane tasks.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::container::ControlPlane;

/// Run `supervise()` every `every` until shutdown.
pub fn spawn_supervisor(
    plane: Arc<ControlPlane>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = every.as_millis() as u64, "Consumer supervisor started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    let report = plane.supervise();
                    if report.is_quiet() {
                        continue;
                    }
                    warn!(
                        status_changes = report.status_changes.len(),
                        redelivered = report.redelivered.len(),
                        dead_lettered = report.dead_lettered.len(),
                        timed_out = report.timed_out.len(),
                        dead_letter_count = report.dead_letter_count,
                        "Supervision sweep acted"
                    );
                }
            }
        }
        info!("Consumer supervisor stopped");
    })
}

/// Write the Prometheus text exposition to `path`.
///
/// Written to a sibling temp file then renamed, so a scraper reading `path`
/// never sees a partial file.
pub async fn export_metrics(path: &Path) -> io::Result<()> {
    let text = control_telemetry::gather_metrics().map_err(io::Error::other)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Log a JSON [`MetricsSnapshot`](crate::snapshot::MetricsSnapshot) every
/// `every` until shutdown, exporting Prometheus metrics to `metrics_file`
/// on the same tick when set.
pub fn spawn_snapshot_logger(
    plane: Arc<ControlPlane>,
    every: Duration,
    metrics_file: Option<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; skip the empty startup snapshot.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    match plane.metrics_snapshot().to_json() {
                        Ok(json) => info!(snapshot = %json, "Metrics snapshot"),
                        Err(e) => warn!(error = %e, "Snapshot serialization failed"),
                    }
                    if let Some(path) = &metrics_file {
                        if let Err(e) = export_metrics(path).await {
                            warn!(path = %path.display(), error = %e, "Metrics export failed");
                        }
                    }
                }
            }
        }
        debug!("Snapshot logger stopped");
    })
}
