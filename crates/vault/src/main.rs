//! `crm-vault` — field encryption service entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs + optional OTLP export).
//! 3. Parse the encryption key once and build the [`FieldEncryptor`].
//! 4. Build the Axum router.
//! 5. Serve HTTPS (when certificates are configured) or plain HTTP until a
//!    shutdown signal arrives.

mod config;
mod crypto;
mod record;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use tracing::{info, warn};

use config::Config;
use crypto::FieldEncryptor;
use server::{middleware::Limits, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otlp_endpoint(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        tls = cfg.tls_paths().is_some(),
        "crm-vault starting"
    );

    // -----------------------------------------------------------------------
    // 3. Encryption key
    // -----------------------------------------------------------------------
    let key = cfg
        .encryption_key()
        .context("ENCRYPTION_KEY is invalid")?;
    let encryptor = FieldEncryptor::new(key);
    info!(key_fingerprint = %encryptor.fingerprint(), "encryption key loaded");

    // -----------------------------------------------------------------------
    // 4. Router
    // -----------------------------------------------------------------------
    let state = AppState::new(encryptor, cfg.iv_field_suffix.clone());
    let router = server::router::build(state, Limits::from_config(&cfg));

    // -----------------------------------------------------------------------
    // 5. HTTP(S) server
    // -----------------------------------------------------------------------
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    match cfg.tls_paths() {
        Some(paths) => {
            let tls_config = server::tls::load_server_config(&paths)?;
            info!(addr = %addr, "listening (https)");
            server::tls::serve(
                listener,
                router,
                tls_config,
                cfg.request_timeout(),
                server::shutdown_signal(),
            )
            .await?;
        }
        None => {
            warn!(addr = %addr, "TLS not configured; listening on plain HTTP");
            axum::serve(listener, router)
                .with_graceful_shutdown(server::shutdown_signal())
                .await?;
        }
    }

    info!("crm-vault stopped");
    telemetry::shutdown_telemetry();
    Ok(())
}
