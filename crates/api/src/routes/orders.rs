//! Order endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use domain::{Order, OrderCreate, OrderStore, PaymentStore};
use serde::Deserialize;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub product: String,
    pub amount: f64,
}

/// POST /orders: place an order and stage its `OrderCreated` event.
#[tracing::instrument(skip(state, req))]
pub async fn create<O: OrderStore, P: PaymentStore>(
    State(state): State<AppState<O, P>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .orders
        .create(OrderCreate::new(req.product, req.amount))
        .await?;

    let location = format!("/orders/{}", order.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(order),
    )
        .into_response())
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<O: OrderStore, P: PaymentStore>(
    State(state): State<AppState<O, P>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.find_by_id(parse_id(&id)?).await?;
    Ok(Json(order))
}
