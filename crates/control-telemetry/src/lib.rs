//! # Control Telemetry
//!
//! Observability for the Sentinel control plane.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, JSON lines in
//!   containers and a human format in development
//! - **Metrics**: Prometheus counters, gauges and histograms in a global
//!   registry, rendered on demand by [`gather_metrics`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use control_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(TelemetryConfig::from_env())?;
//!     // Logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CP_SERVICE_NAME` | `sentinel-control-plane` | Service name in logs |
//! | `CP_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CP_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `CP_JSON_LOGS` | `true` in containers | JSON log lines |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, ALERTS_RAISED, CIRCUITS_OPEN,
    CIRCUIT_TRANSITIONS, DEAD_LETTERS, DEAD_LETTERS_PENDING, EVENTS_PUBLISHED, FRAUD_CRITICAL,
    IDENTITIES_ISSUED, PARTITION_REJECTIONS, POLICY_DECISIONS, POLICY_EVALUATION_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Register metrics, then install the global log subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(&config)
}
