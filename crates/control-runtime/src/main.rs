//! # Sentinel Control Runtime
//!
//! Entry point for the security and traffic control plane.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics registry)
//! 2. Load configuration (defaults → TOML file → `CP_*` environment)
//! 3. Build the control plane (validates every section)
//! 4. Spawn the supervision sweep and the snapshot logger
//! 5. In `--demo` mode, spawn consumer workers and the traffic loop
//! 6. Wait for Ctrl+C, then drain workers, write the final metrics and exit
//!
//! ## Demo Flow
//!
//! ```text
//! RandomTrafficGenerator ──→ simulate_flow ──→ transaction.* event
//!          │                                         │
//!          └──→ call_service (breaker)               ↓
//!                                          audit-sink / settlement workers
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use control_runtime::container::{ControlPlane, ControlPlaneConfig, EVENT_TRANSACTION_AUTHORIZED};
use control_runtime::handlers::{
    export_metrics, spawn_snapshot_logger, spawn_supervisor, ConsumerWorker, LoggingHandler,
    WorkerReport,
};
use control_runtime::traffic::{RandomTrafficGenerator, TrafficGenerator};
use control_telemetry::TelemetryConfig;
use cp_05_event_streaming::ANY_EVENT_TYPE;

/// Sentinel security and traffic control plane
#[derive(Debug, Parser)]
#[command(name = "control-runtime", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Generate synthetic traffic and run demo consumers
    #[arg(long)]
    demo: bool,

    /// Seed for the demo traffic generator
    #[arg(long, default_value_t = 7)]
    demo_seed: u64,

    /// Override the metrics snapshot interval
    #[arg(long, value_name = "SECS")]
    snapshot_interval_secs: Option<u64>,

    /// Write Prometheus metrics to this file on every snapshot tick
    #[arg(long, value_name = "PATH")]
    metrics_file: Option<PathBuf>,
}

/// The runtime orchestrating the control plane's background tasks.
struct ControlRuntime {
    plane: Arc<ControlPlane>,
    tasks: Vec<JoinHandle<()>>,
    workers: Vec<JoinHandle<WorkerReport>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ControlRuntime {
    fn new(config: ControlPlaneConfig) -> Result<Self> {
        let plane = ControlPlane::with_system_clock(config).context("Failed to build control plane")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            plane: Arc::new(plane),
            tasks: Vec::new(),
            workers: Vec::new(),
            shutdown_tx,
            shutdown_rx,
        })
    }

    fn start(&mut self) {
        let runtime = &self.plane.config().runtime;
        info!("===========================================");
        info!("  Sentinel Control Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.tasks.push(spawn_supervisor(
            Arc::clone(&self.plane),
            Duration::from_millis(runtime.supervise_interval_ms),
            self.shutdown_rx.clone(),
        ));
        self.tasks.push(spawn_snapshot_logger(
            Arc::clone(&self.plane),
            Duration::from_secs(runtime.snapshot_interval_secs),
            runtime.metrics_file.clone(),
            self.shutdown_rx.clone(),
        ));
    }

    fn start_demo(&mut self, seed: u64) {
        for (id, event_type) in [
            ("audit-sink", ANY_EVENT_TYPE),
            ("settlement", EVENT_TRANSACTION_AUTHORIZED),
        ] {
            let worker = ConsumerWorker::new(
                id,
                vec![event_type.to_string()],
                Arc::clone(&self.plane),
                LoggingHandler,
            );
            self.workers.push(tokio::spawn(worker.run(self.shutdown_rx.clone())));
        }

        let plane = Arc::clone(&self.plane);
        let regions = plane.config().streaming.regions.clone();
        let mut shutdown = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut generator = RandomTrafficGenerator::new(seed, regions, 64);
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            info!(seed, "Demo traffic started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => run_demo_request(&plane, generator.next_request()).await,
                }
            }
        }));
    }

    /// Signal every task, then wait for workers to drain and deregister.
    async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        for worker in self.workers {
            match worker.await {
                Ok(report) => info!(
                    consumer = %report.consumer,
                    processed = report.processed,
                    failed = report.failed,
                    "Worker drained"
                ),
                Err(e) => warn!(error = %e, "Worker task failed"),
            }
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task failed");
            }
        }

        match self.plane.metrics_snapshot().to_json_pretty() {
            Ok(json) => info!("Final snapshot:\n{}", json),
            Err(e) => warn!(error = %e, "Snapshot serialization failed"),
        }
        if let Some(path) = &self.plane.config().runtime.metrics_file {
            match export_metrics(path).await {
                Ok(()) => info!(path = %path.display(), "Final metrics written"),
                Err(e) => warn!(path = %path.display(), error = %e, "Metrics export failed"),
            }
        }
        info!("Shutdown complete");
    }
}

async fn run_demo_request(plane: &ControlPlane, request: control_runtime::TrafficRequest) {
    match plane.simulate_flow(&request.credential, &request.region, request.amount) {
        Ok(trace) => debug!(
            identity_id = %trace.identity.id,
            outcome = %trace.assessment.decision.outcome,
            score = trace.assessment.score.value,
            rejected = trace.rejection.is_some(),
            "Demo flow"
        ),
        Err(e) if e.is_backpressure() => debug!(error = %e, "Demo flow pushed back"),
        Err(e) => warn!(error = %e, "Demo flow failed"),
    }

    let healthy = request.service_healthy;
    let result = plane
        .call_service(&request.service_id, || async move {
            if healthy {
                Ok(())
            } else {
                Err("downstream unavailable")
            }
        })
        .await;
    if let Err(e) = result {
        debug!(service = %request.service_id, error = %e, "Demo service call failed");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    control_telemetry::init_telemetry(TelemetryConfig::from_env())
        .context("Failed to initialize telemetry")?;

    let mut config = ControlPlaneConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(secs) = cli.snapshot_interval_secs {
        config.runtime.snapshot_interval_secs = secs.max(1);
    }
    if cli.metrics_file.is_some() {
        config.runtime.metrics_file = cli.metrics_file;
    }

    let mut runtime = ControlRuntime::new(config)?;
    runtime.start();
    if cli.demo {
        runtime.start_demo(cli.demo_seed);
    }

    info!("Control plane is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
