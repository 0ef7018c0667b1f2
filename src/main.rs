// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use tokio::net::TcpListener;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use user_service::{
    api::router,
    config::{
        self, LogFormat, ServerConfig, DEFAULT_LOG_FILTER, ENCRYPTION_KEY_ENV,
        ENCRYPTION_NONCE_ENV, JWT_REFRESH_SECRET_ENV, JWT_SECRET_ENV,
    },
    rate_limit::RateLimiter,
    state::AppState,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!(signal = "SIGINT", "Start shutdown"),
        _ = terminate => tracing::info!(signal = "SIGTERM", "Start shutdown"),
    }
}

#[tokio::main]
async fn main() {
    // Missing .env is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    let server = ServerConfig::from_env().expect("Invalid server configuration");
    init_tracing(server.log_format);

    let secrets = config::secret_material().expect("Invalid secret configuration");
    for var in [
        JWT_SECRET_ENV,
        JWT_REFRESH_SECRET_ENV,
        ENCRYPTION_KEY_ENV,
        ENCRYPTION_NONCE_ENV,
    ] {
        if std::env::var_os(var).is_none() {
            tracing::warn!(var, "Not set, using a random value for this process");
        }
    }

    let limiter = RateLimiter::new(server.rate_limit_capacity, server.rate_limit_refill_per_sec)
        .expect("Invalid rate limit configuration");
    let state = AppState::in_memory(&secrets, limiter);
    let app = router(state);

    let listener = TcpListener::bind(server.bind_address())
        .await
        .expect("Failed to bind server address");
    let addr = listener
        .local_addr()
        .expect("Failed to read bound address");
    tracing::info!(%addr, "User service listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");

    tracing::info!("Server stopped gracefully");
}
