//! # Structured Logging Module
//!
//! Environment-aware structured logging for the ingestion worker. Output goes to
//! the console, human-readable by default or as JSON lines for log shipping.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::loader::detect_environment;
use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize tracing with environment-specific configuration.
///
/// The filter is, in order of precedence: `RUST_LOG`, `logging.level`, then the
/// level derived from the environment. Calling this more than once is harmless.
pub fn init_tracing(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let directive = config
            .level
            .clone()
            .unwrap_or_else(|| get_log_level(&environment));
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

        let layer = if config.json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            json = config.json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
pub fn get_environment() -> String {
    detect_environment()
}

/// Get log level based on environment
pub fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for partition operations
pub fn log_partition_operation(
    operation: &str,
    partition_id: &str,
    sequence_marker: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        partition_id = %partition_id,
        sequence_marker = sequence_marker,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📥 PARTITION_OPERATION"
    );
}

/// Log structured data for dataset writes
pub fn log_dataset_operation(
    operation: &str,
    dataset: &str,
    row_count: usize,
    location: Option<&str>,
    status: &str,
) {
    tracing::info!(
        operation = %operation,
        dataset = %dataset,
        row_count = row_count,
        location = location,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 DATASET_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
