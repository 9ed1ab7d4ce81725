//! Relay binary for the Turret rig.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `TURRET_CONFIG` or `turret-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build shared relay state
//! 4. Spawn the HTTP server, control forwarder, and mission clock
//! 5. Run until `Ctrl-C`

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use turret_core::config::{LogFormat, LoggingConfig};
use turret_core::{MonotonicClock, TurretConfig};
use turret_relay::AppState;

use crate::error::AppError;

/// Default configuration path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "turret-config.yaml";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration. Logging is not up yet; the result is
    //    reported once it is.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        source = %source,
        host = config.server.host,
        port = config.server.port,
        rig_policy = ?config.relay.rig_policy,
        video_header = ?config.relay.video_header,
        control_rate_hz = config.relay.control_rate_hz,
        "Configuration loaded"
    );

    // 3. Build shared state.
    let state = Arc::new(AppState::new(config, Arc::new(MonotonicClock)));

    // 4. Spawn the relay.
    let handles = turret_relay::spawn_relay(state)?;

    // 5. Run until the server stops on Ctrl-C.
    handles.join().await;
    info!("turret-server shutdown complete");
    Ok(())
}

/// Load configuration from `TURRET_CONFIG`, else `turret-config.yaml`.
///
/// A missing file at the default path means defaults. A missing file at
/// an explicit `TURRET_CONFIG` path is an error.
fn load_config() -> Result<(TurretConfig, String), AppError> {
    let explicit = std::env::var_os("TURRET_CONFIG").map(PathBuf::from);
    let path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let (config, source) = if explicit.is_some() || path.exists() {
        (TurretConfig::from_file(&path)?, path.display().to_string())
    } else {
        (TurretConfig::parse("")?, String::from("defaults"))
    };
    config.validate()?;
    Ok((config, source))
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| AppError::Logging {
        message: e.to_string(),
    })
}
