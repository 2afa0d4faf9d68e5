//! OpenTelemetry export over OTLP/gRPC.
//!
//! Providers are owned by [`Telemetry`] instead of being registered globally.
//! Spans and log events reach the exporters through the bridge layers handed
//! to the logger.

use anyhow::{anyhow, Context, Result};
use opentelemetry::{
    metrics::{Meter, MeterProvider as _},
    trace::TracerProvider as _,
    KeyValue,
};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    logs::SdkLoggerProvider,
    metrics::{PeriodicReader, SdkMeterProvider},
    trace::SdkTracerProvider,
    Resource,
};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, Layer};

use crate::logging::BoxedLayer;

/// Interval between metric exports
pub const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(3);

/// Exporter internals log through `tracing` too; exporting those would feed back
/// into the exporter
const LOG_EXPORT_FILTER: &str = "trace,opentelemetry=off,tonic=off,h2=off,hyper=off,tower=off";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub version: String,
    pub grpc_host: String,
    pub grpc_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "service-kit".to_string(),
            version: "1.0.0".to_string(),
            grpc_host: "localhost".to_string(),
            grpc_port: 4317,
        }
    }
}

impl TelemetryConfig {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.grpc_host, self.grpc_port)
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.service_name.clone())
            .with_attribute(KeyValue::new("service.version", self.version.clone()))
            .build()
    }
}

pub struct Telemetry {
    service_name: String,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    logger_provider: SdkLoggerProvider,
}

impl Telemetry {
    /// Build the trace and metric pipelines. Must run inside a Tokio runtime.
    pub fn init(config: &TelemetryConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let resource = config.resource();

        let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .build()
            .inspect_err(|e| error!(error = %e, "Failed to create metric exporter"))
            .context("Failed to create metric exporter")?;

        let reader = PeriodicReader::builder(metric_exporter)
            .with_interval(METRIC_EXPORT_INTERVAL)
            .build();

        let meter_provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource.clone())
            .build();

        let span_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .build()
            .inspect_err(|e| error!(error = %e, "Failed to create trace exporter"))
            .context("Failed to create trace exporter")?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build();

        let log_exporter = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint.clone())
            .build()
            .inspect_err(|e| error!(error = %e, "Failed to create log exporter"))
            .context("Failed to create log exporter")?;

        let logger_provider = SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build();

        info!(
            endpoint = %endpoint,
            service = %config.service_name,
            version = %config.version,
            "OpenTelemetry exporters initialized"
        );

        Ok(Self {
            service_name: config.service_name.clone(),
            tracer_provider,
            meter_provider,
            logger_provider,
        })
    }

    /// Layer bridging `tracing` spans into the OTLP trace pipeline
    pub fn tracing_layer(&self) -> BoxedLayer {
        let tracer = self.tracer_provider.tracer(self.service_name.clone());
        tracing_opentelemetry::layer().with_tracer(tracer).boxed()
    }

    /// Layer exporting log events as OTLP log records
    pub fn log_layer(&self) -> BoxedLayer {
        OpenTelemetryTracingBridge::new(&self.logger_provider)
            .with_filter(EnvFilter::new(LOG_EXPORT_FILTER))
            .boxed()
    }

    pub fn meter(&self, name: &'static str) -> Meter {
        self.meter_provider.meter(name)
    }

    /// Flush and stop both providers, reporting every failure
    pub fn shutdown(self) -> Result<()> {
        let failures: Vec<String> = [
            ("meter provider", self.meter_provider.shutdown()),
            ("tracer provider", self.tracer_provider.shutdown()),
            ("logger provider", self.logger_provider.shutdown()),
        ]
        .into_iter()
        .filter_map(|(what, result)| result.err().map(|e| format!("{}: {}", what, e)))
        .collect();

        if failures.is_empty() {
            info!("OpenTelemetry providers shut down");
            Ok(())
        } else {
            Err(anyhow!(
                "Telemetry shutdown failed: {}",
                failures.join("; ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "service-kit");
        assert_eq!(config.version, "1.0.0");
        assert_eq!(config.endpoint(), "http://localhost:4317");
    }

    #[test]
    fn test_log_export_filter_drops_exporter_internals() {
        let filter = EnvFilter::new(LOG_EXPORT_FILTER).to_string();
        for target in ["opentelemetry=off", "tonic=off", "h2=off", "hyper=off"] {
            assert!(filter.contains(target), "{filter}");
        }
    }

    #[test]
    fn test_endpoint_uses_host_and_port() {
        let config = TelemetryConfig {
            grpc_host: "otel-collector".to_string(),
            grpc_port: 14317,
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://otel-collector:14317");
    }
}
