use super::common::{parse_json, require, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::inventory::{AdjustStockCommand, SetStockCommand, StockChange},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    #[serde(alias = "stock")]
    pub new_stock: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: Option<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockLevel {
    pub variant_id: Uuid,
    pub stock: i32,
}

#[derive(Debug, Serialize)]
pub struct StockChangeResponse {
    pub success: bool,
    #[serde(flatten)]
    pub change: StockChange,
}

impl From<StockChange> for StockChangeResponse {
    fn from(change: StockChange) -> Self {
        Self {
            success: true,
            change,
        }
    }
}

/// GET /inventory/variants/:id/stock
pub async fn get_stock(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let stock = state.services.inventory.get_stock(variant_id).await?;
    Ok(success_response(StockLevel { variant_id, stock }))
}

/// PUT /inventory/variants/:id/stock
pub async fn set_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(variant_id): Path<Uuid>,
    payload: Result<Json<SetStockRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_json(payload)?;
    let command = SetStockCommand {
        variant_id,
        new_stock: require(body.new_stock, "new_stock")?,
        reason: body.reason,
        actor_name: user.actor_name().to_string(),
    };

    let change = state.services.inventory.set_stock(command).await?;
    Ok(success_response(StockChangeResponse::from(change)))
}

/// POST /inventory/variants/:id/adjust
pub async fn adjust_stock(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(variant_id): Path<Uuid>,
    payload: Result<Json<AdjustStockRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_json(payload)?;
    let command = AdjustStockCommand {
        variant_id,
        delta: require(body.delta, "delta")?,
        reason: body.reason,
        actor_name: user.actor_name().to_string(),
    };

    let change = state.services.inventory.adjust_stock(command).await?;
    Ok(success_response(StockChangeResponse::from(change)))
}

/// GET /inventory/history
pub async fn list_history(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let entries = state.services.stock_history.list_all().await?;
    Ok(success_response(entries))
}

/// GET /inventory/variants/:id/history
pub async fn list_variant_history(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let entries = state
        .services
        .stock_history
        .list_for_variant(variant_id)
        .await?;
    Ok(success_response(entries))
}
