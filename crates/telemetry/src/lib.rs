//! Logging bootstrap for the probe binaries.
//!
//! Logs always go to stderr so that stdout carries nothing but the probe's
//! outcome line.

use anyhow::Context;
use probe_kernel::{LogFormat, TelemetrySettings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resolve the filter directive with priority: explicit override, then
/// `RUST_LOG`, then the configured filter.
pub fn filter_directive(settings: &TelemetrySettings, override_filter: Option<&str>) -> String {
    override_filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| settings.filter.clone())
}

/// Initialize the tracing pipeline with the configured format and filter.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    init_with_filter(settings, None)
}

/// Like [`init`], with a filter that takes precedence over `RUST_LOG`.
pub fn init_with_filter(
    settings: &TelemetrySettings,
    override_filter: Option<&str>,
) -> anyhow::Result<()> {
    let directive = filter_directive(settings, override_filter);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;

    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .with_context(|| "failed to install tracing subscriber")?;

    tracing::debug!(
        target: "probe-telemetry",
        filter = %directive,
        format = ?settings.log_format,
        "telemetry initialized"
    );

    Ok(())
}
