//! TodoLists Server binary.
//!
//! Serves the to-do list web app on `0.0.0.0:$PORT`, logging JSON to stdout
//! and sweeping idle sessions in the background. Stops cleanly on SIGINT or
//! SIGTERM.
//!
//! See [`todolists_server::config`] for the environment variables read at
//! startup.
//!
//! ```bash
//! # Local development, random cookie secret
//! cargo run --bin todolists-server
//!
//! # Behind HTTPS with a stable secret
//! TODOLISTS_SESSION_SECRET="$(openssl rand -base64 32)" \
//! TODOLISTS_SECURE_COOKIE=true \
//! cargo run --release --bin todolists-server
//! ```

use std::process::ExitCode;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use todolists_server::config::Config;
use todolists_server::error::{Result, ServerError};
use todolists_server::routes::{create_router, AppState};

/// How often idle sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug,axum::rejection=trace";

const ENV_HELP: &str = "\
Optional environment variables:
  PORT                        - HTTP server port (default: 8080)
  RUST_LOG                    - Log level filter (default: info)
  TODOLISTS_SESSION_SECRET    - Base64 32-byte cookie secret (default: random)
  TODOLISTS_SESSION_TTL_SECS  - Session idle timeout (default: 86400)
  TODOLISTS_MAX_SESSIONS      - Session capacity (default: 10000)
  TODOLISTS_SECURE_COOKIE     - Set 'true' when served over HTTPS";

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            eprintln!("Error: {err}\n\n{ENV_HELP}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Server stopped with an error");
            ExitCode::FAILURE
        }
    }
}

/// Serves requests until a shutdown signal arrives.
async fn run(config: Config) -> Result<()> {
    info!(
        port = config.port,
        session_ttl_secs = config.session_ttl.as_secs(),
        max_sessions = config.max_sessions,
        secure_cookie = config.secure_cookie,
        "TodoLists server starting"
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| ServerError::internal(format!("failed to bind {addr}: {err}")))?;
    info!(address = %addr, "Listening");

    let state = AppState::new(config);
    let sweeper = state.sessions.spawn_cleanup_task(SESSION_SWEEP_INTERVAL);

    let served = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    served.map_err(|err| ServerError::internal(format!("server error: {err}")))?;

    info!("Shutdown complete");
    Ok(())
}

/// Installs the JSON subscriber, filtered by `RUST_LOG`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_target(true).with_file(false))
        .init();
}

/// Resolves on the first SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Could not listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    info!(signal = received, "Shutting down");
}
