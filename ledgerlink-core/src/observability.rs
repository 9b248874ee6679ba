//! Logging, tracing and metrics initialisation
//!
//! The client crates only ever emit through `tracing` macros and global
//! OpenTelemetry meters. Nothing is exported until an application installs
//! a pipeline, which is what [`init_observability`] does:
//!
//! - a `tracing-subscriber` registry with an [`EnvFilter`] (`RUST_LOG`, or
//!   the configured level) and a fmt layer, JSON by default
//! - optionally an OTLP span exporter bridged through `tracing-opentelemetry`
//! - optionally an OTLP meter provider, so `ClientMetrics` instruments
//!   are exported every 30 seconds
//!
//! ```rust,no_run
//! use ledgerlink_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("ledger-watcher")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("ledgerlink_client=debug,info");
//!
//!     ledgerlink_core::init_observability(config).expect("observability");
//!     // ... run the client ...
//!     ledgerlink_core::shutdown_observability();
//! }
//! ```
//!
//! `OTEL_EXPORTER_OTLP_ENDPOINT` and `RUST_LOG` are honoured when set.

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::Resource;
use serde::Deserialize;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How often the meter provider pushes aggregated metrics
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Observability pipeline settings
///
/// Deserialisable with camelCase keys so it can sit next to the client
/// options in an application's config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// `service.name` resource attribute
    pub service_name: String,
    /// `service.version` resource attribute
    pub service_version: String,
    /// OTLP gRPC collector address
    pub otlp_endpoint: String,
    /// Export spans over OTLP
    pub enable_traces: bool,
    /// Export metrics over OTLP
    pub enable_metrics: bool,
    /// Write structured logs to stdout
    pub enable_logs: bool,
    /// JSON log lines instead of the human readable format
    pub json_logs: bool,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "ledgerlink".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            json_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Local logging only: no OTLP exporters
    pub fn logs_only(service_name: impl Into<String>) -> Self {
        Self::new(service_name).with_traces(false).with_metrics(false)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global subscriber and, if enabled, the OTLP providers
///
/// Must be called once, from inside a tokio runtime when traces or metrics
/// are enabled (the batch exporters run on it).
///
/// # Errors
///
/// Fails if an exporter cannot be built, the filter directive is invalid,
/// or a global subscriber is already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let tracer = if config.enable_traces {
        Some(init_tracer(&config)?)
    } else {
        None
    };

    if config.enable_metrics {
        init_metrics(&config)?;
    }

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let fmt_layer = config.enable_logs.then(|| {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);
        if config.json_logs {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "observability initialized"
    );

    Ok(())
}

fn init_tracer(config: &ObservabilityConfig) -> Result<opentelemetry_sdk::trace::Tracer, BoxError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider);
    Ok(tracer)
}

fn init_metrics(config: &ObservabilityConfig) -> Result<(), BoxError> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider);
    Ok(())
}

/// Flush and stop exporting
///
/// Providers flush when dropped; this marks the point in the logs.
pub fn shutdown_observability() {
    tracing::info!("observability shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "ledgerlink");
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(config.json_logs);
    }

    #[test]
    fn test_builder_chaining() {
        let config = ObservabilityConfig::new("watcher")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("1.2.3")
            .with_json_logs(false)
            .with_metrics(false);

        assert_eq!(config.service_name, "watcher");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "1.2.3");
        assert!(!config.json_logs);
        assert!(!config.enable_metrics);
        assert!(config.enable_traces);
    }

    #[test]
    fn test_logs_only() {
        let config = ObservabilityConfig::logs_only("watcher");
        assert!(!config.enable_traces);
        assert!(!config.enable_metrics);
        assert!(config.enable_logs);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ObservabilityConfig =
            serde_json::from_str(r#"{"serviceName":"svc","enableTraces":false,"logLevel":"warn"}"#)
                .unwrap();
        assert_eq!(config.service_name, "svc");
        assert!(!config.enable_traces);
        assert_eq!(config.log_level, "warn");
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_init_without_exporters() {
        let config = ObservabilityConfig::logs_only("test").with_logs(false);
        assert!(init_observability(config).is_ok());
        shutdown_observability();
    }
}
