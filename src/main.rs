use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tuda::api::governance_routes;
use tuda::app::build_state;
use tuda::config::{GovernanceConfig, TelemetryBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GovernanceConfig::from_env().context("Failed to load configuration")?;

    // Console logging always; a daily rolling file when TUDA_LOG_DIR is set.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tuda.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🛡  TUDA governance core v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Context: {}", config.context_id);
    eprintln!("   Database: {}", config.db_path);

    match &config.telemetry {
        TelemetryBackend::Sysfs { root } => eprintln!("   Telemetry: sysfs ({})", root.display()),
        TelemetryBackend::None => eprintln!("   Telemetry: disabled"),
    }

    let state = build_state(&config)
        .await
        .context("Failed to assemble governance service")?;

    // ── HTTP ──────────────────────────────────────────────────────────────
    let app = governance_routes(state.orchestrator, state.dispatcher);
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    tracing::info!(addr = %config.bind_addr(), "Governance API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
