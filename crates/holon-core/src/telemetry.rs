//! Tracing bootstrap
//!
//! TigerStyle: One subscriber per process, installed explicitly, repeat calls tolerated.
//!
//! Scheduling passes, member faults and mailbox deliveries are reported
//! through `tracing`. [`init_telemetry`] installs the subscriber that renders
//! them: an `EnvFilter` plus a fmt layer. With the `otel` feature the same
//! subscriber also ships spans over OTLP, and the pass and mailbox instruments
//! of [`crate::metrics`] are backed by a Prometheus registry.

use crate::error::{Error, Result};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, TestWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Service name reported with spans and metrics
pub const TELEMETRY_SERVICE_NAME_DEFAULT: &str = "holon";

/// Filter used when `RUST_LOG` is unset
pub const TELEMETRY_LOG_FILTER_DEFAULT: &str = "info";

/// Where formatted events go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    /// Captured by the test harness
    Test,
    Off,
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set
    pub log_filter: String,
    pub output: LogOutput,
    /// OTLP collector (`otel` feature only)
    pub otlp_endpoint: Option<String>,
    /// Back the metric instruments with Prometheus (`otel` feature only)
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: TELEMETRY_SERVICE_NAME_DEFAULT.to_string(),
            log_filter: TELEMETRY_LOG_FILTER_DEFAULT.to_string(),
            output: LogOutput::Stdout,
            otlp_endpoint: None,
            metrics_enabled: false,
        }
    }
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Events captured per test
    pub fn for_simulation() -> Self {
        Self {
            service_name: format!("{}-dst", TELEMETRY_SERVICE_NAME_DEFAULT),
            output: LogOutput::Test,
            ..Default::default()
        }
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_metrics(mut self) -> Self {
        self.metrics_enabled = true;
        self
    }

    /// Read `OTEL_SERVICE_NAME`, `OTEL_EXPORTER_OTLP_ENDPOINT` and `METRICS_ENABLED`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service_name: std::env::var("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(false),
            ..defaults
        }
    }

    /// `RUST_LOG` if set and valid, the configured directives otherwise
    pub fn env_filter(&self) -> Result<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.log_filter).map_err(|e| Error::InvalidConfiguration {
            field: "log_filter".into(),
            reason: e.to_string(),
        })
    }

    fn writer(&self) -> Option<BoxMakeWriter> {
        match self.output {
            LogOutput::Stdout => Some(BoxMakeWriter::new(std::io::stdout)),
            LogOutput::Test => Some(BoxMakeWriter::new(TestWriter::new())),
            LogOutput::Off => None,
        }
    }
}

/// Keeps exporters alive; flushes spans when dropped
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
    #[cfg(feature = "otel")]
    otlp_installed: bool,
    #[cfg(feature = "otel")]
    metrics_registry: Option<prometheus::Registry>,
}

impl TelemetryGuard {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Registry to expose on a scrape endpoint
    #[cfg(feature = "otel")]
    pub fn metrics_registry(&self) -> Option<&prometheus::Registry> {
        self.metrics_registry.as_ref()
    }
}

#[cfg(feature = "otel")]
impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.otlp_installed {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

/// Install the global subscriber
///
/// # Errors
/// `InvalidConfiguration` for bad filter directives, `Internal` when a
/// subscriber is already installed or an exporter cannot start.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard> {
    let fmt_layer = config.writer().map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(writer)
    });
    let registry = tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(fmt_layer);

    #[cfg(feature = "otel")]
    let (registry, otlp_installed) = {
        let otlp_layer = otel::otlp_layer(config)?;
        let installed = otlp_layer.is_some();
        (registry.with(otlp_layer), installed)
    };

    registry
        .try_init()
        .map_err(|e| Error::internal(format!("tracing subscriber not installed: {}", e)))?;

    #[cfg(feature = "otel")]
    let metrics_registry = otel::prometheus_registry(config)?;

    tracing::info!(service = %config.service_name, output = ?config.output, "Telemetry initialized");

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
        #[cfg(feature = "otel")]
        otlp_installed,
        #[cfg(feature = "otel")]
        metrics_registry,
    })
}

/// Install the global subscriber unless one is already there
///
/// Returns `None` when another call (or another library) got there first.
pub fn try_init_telemetry(config: &TelemetryConfig) -> Option<TelemetryGuard> {
    match init_telemetry(config) {
        Ok(guard) => Some(guard),
        Err(error) => {
            tracing::debug!(error = %error, "Keeping the installed subscriber");
            None
        }
    }
}

#[cfg(feature = "otel")]
mod otel {
    use super::TelemetryConfig;
    use crate::error::{Error, Result};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::Resource;
    use tracing::Subscriber;
    use tracing_opentelemetry::OpenTelemetryLayer;
    use tracing_subscriber::registry::LookupSpan;

    fn resource(config: &TelemetryConfig) -> Resource {
        Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )])
    }

    /// Span exporter layer, when an endpoint is configured
    pub(super) fn otlp_layer<S>(
        config: &TelemetryConfig,
    ) -> Result<Option<OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        use opentelemetry_otlp::WithExportConfig;

        let Some(endpoint) = config.otlp_endpoint.as_deref() else {
            return Ok(None);
        };

        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(resource(config)))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .map_err(|e| Error::internal(format!("OTLP exporter not started: {}", e)))?;

        Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
    }

    /// Global meter provider reading into a Prometheus registry
    pub(super) fn prometheus_registry(
        config: &TelemetryConfig,
    ) -> Result<Option<prometheus::Registry>> {
        if !config.metrics_enabled {
            return Ok(None);
        }

        let registry = prometheus::Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| Error::internal(format!("Prometheus exporter not built: {}", e)))?;

        let provider = opentelemetry_sdk::metrics::MeterProviderBuilder::default()
            .with_resource(resource(config))
            .with_reader(exporter)
            .build();
        opentelemetry::global::set_meter_provider(provider);

        Ok(Some(registry))
    }
}
