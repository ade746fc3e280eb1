//! Sales Gateway - HTTP API with token authentication
//!
//! This is the main entry point for the gateway service.
//!
//! # Dev Mode
//!
//! Build with `--features dev-mode` and set `DEV_MODE=true` to use a mock
//! token validator that needs no key files.
//! Use tokens in format: `test-token:<subject>:<ROLE,ROLE>`
//!
//! # Keys
//!
//! Set `SALES_AUTH_KEYS_DIR` to a directory of `<kid>.pub.pem` files, with
//! `<kid>.pem` next to them for keys this process may sign with.

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "dev-mode")]
use sales_auth::MockTokenValidator;
use sales_auth::{Authenticator, FsKeyStore, KeyLookup};
use sales_gateway::{create_router, GatewayConfig, GatewayState, ShutdownSignal};

const DEFAULT_KEYS_DIR: &str = "zarf/keys";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sales=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sales Gateway");

    // Load configuration from environment
    let config = GatewayConfig::default().with_env(|key| std::env::var(key).ok());
    let keys_dir = config
        .auth
        .keys_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_KEYS_DIR));

    tracing::info!(
        listen_addr = %config.listen_addr,
        debug_prefix = %config.debug_prefix,
        keys_dir = %keys_dir.display(),
        algorithm = %config.auth.algorithm,
        issuer = %config.auth.issuer,
        audience = %config.auth.audience,
        active_kid = %config.auth.active_kid,
        "Gateway configuration loaded"
    );

    let shutdown = ShutdownSignal::new();

    #[cfg(feature = "dev-mode")]
    let dev_mode = std::env::var("DEV_MODE").is_ok_and(|v| v == "true");
    #[cfg(not(feature = "dev-mode"))]
    let dev_mode = false;

    let app = if dev_mode {
        dev_router(config.clone(), shutdown.clone())?
    } else {
        // Initialize the authenticator from the key directory
        tracing::info!(path = %keys_dir.display(), "Loading keys");
        let keys = FsKeyStore::open(&keys_dir, config.auth.algorithm()?)?;
        tracing::info!(count = keys.len(), kids = ?keys.key_ids(), "Keys loaded");

        let authenticator = Authenticator::new(&config.auth, Arc::new(keys))?;
        if let Err(err) = authenticator.set_active_kid(&config.auth.active_kid) {
            tracing::warn!(error = %err, "No signing key; validating only");
        }
        tracing::info!("Token validator initialized");

        let state = GatewayState::new(Arc::new(authenticator), config.clone())
            .with_shutdown(shutdown.clone());
        create_router(state)
    };
    tracing::info!("Router configured with all API endpoints");

    // Stop on ctrl-c as well as on a pipeline-raised signal
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown.signal("received interrupt");
            }
        }
    });

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.wait().await }
        })
        .into_future();

    let grace = config.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        () = async {
            shutdown.wait().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(timeout = ?grace, "Graceful shutdown timed out");
        }
    }

    tracing::info!(reason = ?shutdown.reason(), "Gateway stopped");
    Ok(())
}

#[cfg(feature = "dev-mode")]
fn dev_router(
    config: GatewayConfig,
    shutdown: ShutdownSignal,
) -> Result<axum::Router, Box<dyn std::error::Error>> {
    tracing::warn!("DEV MODE ENABLED - using mock token validator");
    tracing::warn!("Use tokens in format: test-token:<subject>:<ROLE,ROLE>");
    let validator = Arc::new(MockTokenValidator {
        config: config.auth.clone(),
    });
    let state = GatewayState::new(validator, config).with_shutdown(shutdown);
    Ok(create_router(state))
}

#[cfg(not(feature = "dev-mode"))]
fn dev_router(
    _config: GatewayConfig,
    _shutdown: ShutdownSignal,
) -> Result<axum::Router, Box<dyn std::error::Error>> {
    Err("dev mode requires the dev-mode feature".into())
}
