//! HTTP surface and process wiring for the order and payment services.
//!
//! Provides REST endpoints for placing orders and reading orders and
//! payments, with structured logging (tracing) and Prometheus metrics.
//! The [`runtime`] module spawns the outbox relays and event listeners
//! that move events between the two services.

pub mod config;
pub mod error;
pub mod routes;
pub mod runtime;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{OrderService, OrderStore, PaymentService, PaymentStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<O, P> {
    pub orders: Arc<OrderService<O>>,
    pub payments: Arc<PaymentService<P>>,
}

impl<O, P> AppState<O, P> {
    pub fn new(orders: OrderService<O>, payments: PaymentService<P>) -> Self {
        Self {
            orders: Arc::new(orders),
            payments: Arc::new(payments),
        }
    }
}

impl<O, P> Clone for AppState<O, P> {
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            payments: self.payments.clone(),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<O: OrderStore, P: PaymentStore>(
    state: AppState<O, P>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<O, P>))
        .route("/orders/{id}", get(routes::orders::get::<O, P>))
        .route("/payments/{order_id}", get(routes::payments::get::<O, P>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
