//! OpenTelemetry integration for auth-gateway
//!
//! Tracing and metrics providers with optional OTLP export, the gateway's
//! metric instruments, and the `tracing` subscriber setup.

use crate::config::{LoggingConfig, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Trace and metric providers for the gateway
///
/// With `otel.enabled` both signals are exported over OTLP/gRPC to
/// `otel.endpoint`. Otherwise no tracer exists and the meter provider has no
/// reader, so instruments record into nothing.
pub struct OtelProvider {
    tracing: Option<TracerProvider>,
    metrics: SdkMeterProvider,
    service_name: String,
}

impl OtelProvider {
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let (tracing, metrics) = match (config.enabled, config.endpoint.as_deref()) {
            (false, _) => (
                None,
                SdkMeterProvider::builder().with_resource(resource).build(),
            ),
            (true, None) => {
                return Err(OtelError::Config(
                    "OTLP endpoint is required when enabled".into(),
                ))
            }
            (true, Some(endpoint)) => {
                let tracing = otlp_tracer_provider(endpoint, &resource)?;
                global::set_tracer_provider(tracing.clone());
                (Some(tracing), otlp_meter_provider(endpoint, &resource)?)
            }
        };

        Ok(Self {
            tracing,
            metrics,
            service_name: config.service_name.clone(),
        })
    }

    /// Tracer for the `tracing` bridge, `None` when export is disabled
    pub fn tracer(&self) -> Option<opentelemetry_sdk::trace::Tracer> {
        self.tracing
            .as_ref()
            .map(|provider| provider.tracer(self.service_name.clone()))
    }

    /// Meter named after the service
    pub fn meter(&self) -> Meter {
        self.metrics.meter(self.service_name.clone())
    }

    /// Flush pending spans, then stop the meter provider
    pub fn shutdown(&self) -> Result<(), OtelError> {
        if let Some(provider) = &self.tracing {
            if let Some(Err(e)) = provider.force_flush().into_iter().find(Result::is_err) {
                return Err(OtelError::Shutdown(format!("span flush failed: {:?}", e)));
            }
        }

        self.metrics
            .shutdown()
            .map_err(|e| OtelError::Shutdown(format!("meter shutdown failed: {:?}", e)))
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn otlp_tracer_provider(endpoint: &str, resource: &Resource) -> Result<TracerProvider, OtelError> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace};

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| OtelError::TracerInit(e.to_string()))?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            trace::Config::default()
                .with_sampler(trace::Sampler::AlwaysOn)
                .with_resource(resource.clone()),
        )
        .build())
}

fn otlp_meter_provider(endpoint: &str, resource: &Resource) -> Result<SdkMeterProvider, OtelError> {
    use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
    use opentelemetry_sdk::metrics::{
        reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
        PeriodicReader,
    };
    use opentelemetry_sdk::runtime;

    let exporter = MetricsExporterBuilder::from(
        opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint),
    )
    .build_metrics_exporter(
        Box::new(DefaultTemporalitySelector::new()),
        Box::new(DefaultAggregationSelector::new()),
    )
    .map_err(|e| OtelError::MeterInit(e.to_string()))?;

    Ok(SdkMeterProvider::builder()
        .with_resource(resource.clone())
        .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
        .build())
}

/// Login endpoint label values
pub const ENDPOINT_LOGIN: &str = "login";
pub const ENDPOINT_AUTH_SECRET: &str = "auth_secret";

/// Outcome of a login attempt, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    Failure,
    LockedOut,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Failure => "failure",
            LoginOutcome::LockedOut => "locked_out",
        }
    }
}

/// Application metrics for auth-gateway
pub struct GatewayMetrics {
    /// Login attempts by endpoint and outcome
    pub login_attempts_total: Counter<u64>,

    /// Number of times the lockout engaged
    pub lockouts_total: Counter<u64>,

    /// Bearer tokens issued
    pub tokens_issued_total: Counter<u64>,

    /// Audit records that could not be written
    pub audit_write_failures_total: Counter<u64>,

    /// Login handling duration in seconds
    pub login_duration: Histogram<f64>,
}

impl GatewayMetrics {
    /// Create new metrics with the given meter
    pub fn new(meter: &Meter) -> Self {
        let login_attempts_total = meter
            .u64_counter("auth_gateway_login_attempts_total")
            .with_description("Total number of login attempts")
            .init();

        let lockouts_total = meter
            .u64_counter("auth_gateway_lockouts_total")
            .with_description("Total number of times the failure lockout engaged")
            .init();

        let tokens_issued_total = meter
            .u64_counter("auth_gateway_tokens_issued_total")
            .with_description("Total number of bearer tokens issued")
            .init();

        let audit_write_failures_total = meter
            .u64_counter("auth_gateway_audit_write_failures_total")
            .with_description("Total number of audit records that could not be written")
            .init();

        let login_duration = meter
            .f64_histogram("auth_gateway_login_duration_seconds")
            .with_description("Login handling duration in seconds")
            .init();

        Self {
            login_attempts_total,
            lockouts_total,
            tokens_issued_total,
            audit_write_failures_total,
            login_duration,
        }
    }

    /// Metrics backed by the global meter provider (no-op unless one is installed)
    pub fn global() -> Self {
        Self::new(&global::meter("auth-gateway"))
    }

    /// Record one login attempt
    pub fn record_login(&self, endpoint: &'static str, outcome: LoginOutcome, duration_secs: f64) {
        let attributes = [
            KeyValue::new("endpoint", endpoint),
            KeyValue::new("outcome", outcome.as_str()),
        ];
        self.login_attempts_total.add(1, &attributes);
        self.login_duration
            .record(duration_secs, &[KeyValue::new("endpoint", endpoint)]);

        if outcome == LoginOutcome::Success {
            self.tokens_issued_total
                .add(1, &[KeyValue::new("endpoint", endpoint)]);
        }
    }

    /// Record the lockout engaging
    pub fn record_lockout(&self) {
        self.lockouts_total.add(1, &[]);
    }

    /// Record a failed audit write
    pub fn record_audit_failure(&self) {
        self.audit_write_failures_total.add(1, &[]);
    }
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}

fn parse_level(log_level: &str) -> Level {
    match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG`-style directives win; the configured level applies otherwise
fn build_filter(level: &str, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(parse_level(level)).into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Initialize tracing subscriber with OpenTelemetry integration
///
/// `logging.format` selects JSON (default) or human-readable output.
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&logging.level, directives.as_deref());

    let otel_layer = otel
        .tracer()
        .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let pretty = logging.format.eq_ignore_ascii_case("pretty");
    let json_layer = (!pretty).then(|| tracing_subscriber::fmt::layer().json());
    let pretty_layer = pretty.then(|| tracing_subscriber::fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}
