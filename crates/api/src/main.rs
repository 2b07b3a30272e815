//! Process entry point: order and payment services in one binary.

use api::config::{Config, LogFormat};
use api::{AppState, runtime};
use domain::{OrderService, OrderStore, PaymentService, PaymentStore};
use messaging::InMemoryBroker;
use metrics_exporter_prometheus::PrometheusHandle;
use outbox::{InMemoryStore, OutboxStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Starts the background workers, serves HTTP until a shutdown signal, then
/// stops the workers and waits for them.
async fn serve<O, P>(config: Config, state: AppState<O, P>, metrics_handle: PrometheusHandle)
where
    O: OrderStore + OutboxStore,
    P: PaymentStore + OutboxStore,
{
    let broker = InMemoryBroker::new();
    let workers = runtime::start(&state, &broker, &config).await;

    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    workers.shutdown();
    workers.join().await;
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick the stores and run
    match config.database_url.clone() {
        Some(url) => {
            let (orders, payments) = runtime::connect_postgres(&url)
                .await
                .expect("failed to prepare database");
            tracing::info!("using PostgreSQL stores");
            let state = AppState::new(OrderService::new(orders), PaymentService::new(payments));
            serve(config, state, metrics_handle).await;
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory stores");
            let state = AppState::new(
                OrderService::new(InMemoryStore::new()),
                PaymentService::new(InMemoryStore::new()),
            );
            serve(config, state, metrics_handle).await;
        }
    }
}
