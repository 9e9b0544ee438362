//! Trusted Registries Policy Host
//!
//! Serves admission decisions from the trusted registries WebAssembly policy.

use policy_host::config::HostConfig;
use policy_host::{build_router, load_policy, make_policy_version, watcher, AppState};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,policy=debug".into()),
        )
        .init();

    let config = HostConfig::from_env()?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting trusted registries policy host");

    // Ensure policies directory exists
    if !config.policies_dir.exists() {
        std::fs::create_dir_all(&config.policies_dir)?;
        tracing::info!(dir = %config.policies_dir.display(), "created policies directory");
    }

    let settings = config.load_settings()?;

    let policy_path = config.policy_path();
    let wasm_bytes = match std::fs::read(&policy_path) {
        Ok(bytes) => {
            tracing::info!(path = %policy_path.display(), size_bytes = bytes.len(), "loaded policy");
            bytes
        }
        Err(e) => {
            tracing::error!(
                path = %policy_path.display(),
                error = %e,
                "failed to load policy; build it with `cargo build -p trusted-registries --target wasm32-unknown-unknown --release`"
            );
            return Err(e.into());
        }
    };

    let runtime = load_policy(&wasm_bytes, config.fuel_limit, &settings)?;
    tracing::info!("policy runtime initialized and settings accepted");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(
        runtime,
        make_policy_version(wasm_bytes.len()),
        settings,
        config,
    ));

    // Setup hot-reload watcher
    tokio::spawn(watcher::watch_policies(state.clone()));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGINT/SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
