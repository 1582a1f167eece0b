//! Structured logging and optional OpenTelemetry span export.
//!
//! Logs are JSON lines on stdout. When an OTLP endpoint is configured, spans
//! are also exported via OTLP/gRPC to a collector.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, ciphertext, or key material** may appear in any span
//!   attribute or log field. The key fingerprint is the only key-derived value
//!   that is ever logged.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), overridden
//!   by `RUST_LOG` when set.

pub mod init;

pub use init::{init_telemetry, shutdown_telemetry};
