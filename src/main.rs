use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use promogate::approvals::ApprovalManager;
use promogate::bot::commands::{self, Command};
use promogate::bot::transport::SlackTransport;
use promogate::bot::Dispatcher;
use promogate::codec::JsonCodec;
use promogate::metrics::Metrics;
use promogate::notification::webhook::{WebhookNotifier, WebhookRelay};
use promogate::providers::{ProviderRelay, Providers};
use promogate::store::{ApprovalStore, MemoryStore, RedisStore};
use promogate::{api, cli, config, jobs, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OpenTelemetry (OTLP) export is enabled only when an endpoint is configured
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "promogate"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "promogate=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Parse { text }) => {
            print_parsed(&text);
            Ok(())
        }
        Some(cli::Commands::Serve { port }) => {
            let cfg = config::load()?;
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        None => {
            let cfg = config::load()?;
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn print_parsed(text: &str) {
    match commands::parse(text) {
        Some(Command::Vote {
            decision,
            identifier,
        }) => println!("vote:\n  Decision:   {}\n  Identifier: {}", decision, identifier),
        Some(Command::Help) => println!("help"),
        None => println!("not a command"),
    }
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut sweeper = None;

    let store: Arc<dyn ApprovalStore> = match cfg.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to Redis...");
            Arc::new(RedisStore::connect(url).await?)
        }
        None => {
            tracing::info!("No Redis configured, using in-process approval store");
            let memory = MemoryStore::new();
            sweeper = Some(jobs::sweep::spawn(
                memory.clone(),
                cfg.sweep_interval(),
                cancel.clone(),
            ));
            Arc::new(memory)
        }
    };

    let manager = Arc::new(
        ApprovalManager::new(store, Arc::new(JsonCodec)).with_ttl(cfg.approval_ttl()),
    );

    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    manager.subscribe(metrics.clone()).await;

    if !cfg.webhook_urls.is_empty() {
        tracing::info!(count = cfg.webhook_urls.len(), "Webhook notifications enabled");
        manager
            .subscribe(Arc::new(WebhookRelay::new(
                WebhookNotifier::new()?,
                cfg.webhook_urls.clone(),
                cfg.webhook_secret.clone(),
            )))
            .await;
    }

    // No providers are registered in standalone mode, so the relay is inert.
    manager
        .subscribe(Arc::new(ProviderRelay::new(Providers::default())))
        .await;

    let transport = Arc::new(
        SlackTransport::new(cfg.slack_token.clone(), cfg.post_timeout())
            .context("failed to build Slack client")?,
    );
    let (dispatcher, tasks) = Dispatcher::spawn(
        manager.clone(),
        transport,
        cfg.dispatcher(),
        cancel.clone(),
    )
    .await;

    let state = Arc::new(AppState {
        manager,
        dispatcher,
        metrics,
        admin_key: cfg.admin_key.clone(),
    });
    let app = api::app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("promogate listening on {}", addr);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                }
                _ = shutdown.cancelled() => {}
            }
        })
        .await?;

    cancel.cancel();
    tasks.join().await;
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "sweep task failed");
        }
    }
    tracing::info!("promogate stopped");

    Ok(())
}
