//! # Payments Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Connect the repositories and run migrations
//! - Populate the provider and repository registries
//! - Create the payment service
//! - Start the HTTP server

mod config;

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payments_hex::{
    PaymentService, ProviderRegistry, RepositoryRegistry,
    inbound::{HttpServer, RateLimiterState},
};
use payments_repo::build_repositories;
use payments_stripe::{StripeConfig, StripeProcessor};

use crate::config::{Config, redact_url};

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("payments-service"), provider))
}

fn build_providers(config: &Config) -> anyhow::Result<ProviderRegistry> {
    let mut providers = ProviderRegistry::new();

    match &config.stripe {
        Some(stripe) => {
            let mut stripe_config =
                StripeConfig::new(stripe.secret_key.clone(), stripe.webhook_secret.clone())
                    .with_api_base(stripe.api_base.clone());
            stripe_config.webhook_tolerance_secs = stripe.webhook_tolerance_secs;

            if stripe.webhook_secret.is_empty() {
                tracing::warn!("STRIPE_WEBHOOK_SECRET is not set; stripe webhooks will be rejected");
            }
            providers.register(Arc::new(StripeProcessor::new(stripe_config)?));
        }
        None => tracing::warn!("STRIPE_SECRET_KEY is not set; the stripe provider is disabled"),
    }

    Ok(providers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // OpenTelemetry only when a collector is configured
    let otel = match std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Some(_) => Some(init_tracer()?),
        None => None,
    };
    let telemetry = otel
        .as_ref()
        .map(|(tracer, _)| tracing_opentelemetry::layer().with_tracer(tracer.clone()));

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,payments_app=debug,payments_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting payments server on port {}", config.port);
    tracing::info!("Using database: {}", redact_url(&config.database_url));

    // Build repositories (handles connection and migration)
    let repos = build_repositories(&config.database_url, &config.pool).await?;
    let mut repositories = RepositoryRegistry::new();
    repositories
        .register(repos.transactions)
        .register(repos.payment_methods);

    let providers = build_providers(&config)?;

    // Create the payment service; the registries are fixed from here on
    let service = PaymentService::new(providers, repositories)
        .with_timeouts(config.timeouts)
        .with_orphan_policy(config.orphan_policy);

    // Create and run the HTTP server
    let limiter = RateLimiterState::new(config.rate_limit_per_minute, Duration::from_secs(60))
        .trust_forwarded_for(config.trust_forwarded_for);
    let server = HttpServer::with_rate_limiter(service, limiter);
    let addr = format!("0.0.0.0:{}", config.port);

    server.run(&addr).await?;

    // Ensure traces are flushed before exit
    if let Some((_, provider)) = otel {
        let _ = provider.shutdown();
    }
    Ok(())
}
