//! Payment lookup endpoint.

use axum::Json;
use axum::extract::{Path, State};
use domain::{OrderStore, Payment, PaymentStore};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

/// GET /payments/{order_id}: the payment recorded for an order.
#[tracing::instrument(skip(state))]
pub async fn get<O: OrderStore, P: PaymentStore>(
    State(state): State<AppState<O, P>>,
    Path(order_id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state.payments.find_by_order_id(parse_id(&order_id)?).await?;
    Ok(Json(payment))
}
