//! Logging and OpenTelemetry setup
//!
//! Without telemetry the plain `common::logging` subscriber is installed.
//! With telemetry enabled an OTLP exporter is added as a `tracing` layer so
//! every span also reaches the collector.

use crate::config::Config;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// OpenTelemetry tracer guard
///
/// When dropped, flushes all pending spans and shuts down the tracer
pub struct TelemetryGuard;

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

/// Build a tracer provider exporting to `otlp_endpoint` over gRPC
pub fn init_tracer_provider(
    service_name: &str,
    otlp_endpoint: &str,
) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ]);

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build())
}

/// Install the global tracing subscriber according to `config`.
///
/// Must be called from within a tokio runtime when telemetry is enabled.
pub fn setup_tracing(config: &Config) -> anyhow::Result<Option<TelemetryGuard>> {
    let level = config.log_level();
    let json = config.json_logs();

    if !config.telemetry.enabled {
        if json {
            common::logging::init_json(level);
        } else {
            common::logging::init(level);
        }
        tracing::info!("OpenTelemetry tracing disabled");
        return Ok(None);
    }

    let provider = init_tracer_provider(
        &config.telemetry.service_name,
        &config.telemetry.otlp_endpoint,
    )?;
    let tracer = provider.tracer("poller-server");
    opentelemetry::global::set_tracer_provider(provider);

    tracing_subscriber::registry()
        .with(common::logging::env_filter(level))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()?;

    tracing::info!(
        service_name = %config.telemetry.service_name,
        otlp_endpoint = %config.telemetry.otlp_endpoint,
        "Tracing initialized with OpenTelemetry integration"
    );

    Ok(Some(TelemetryGuard))
}
