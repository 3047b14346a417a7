use super::common::{created_response, parse_json, require, success_response};
use crate::{
    auth::AuthUser,
    entities::sale::PaymentMethod,
    errors::ServiceError,
    services::sales::RecordSaleCommand,
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

/// Point-of-sale request body. The seller is always the authenticated caller.
#[derive(Debug, Deserialize)]
pub struct RecordSaleRequest {
    pub variant_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
    pub payment_method: Option<String>,
    /// Client-computed total, checked against the server's
    #[serde(alias = "total_amount")]
    pub total: Option<Decimal>,
}

impl RecordSaleRequest {
    fn into_command(self, seller_id: String) -> Result<RecordSaleCommand, ServiceError> {
        let method = require(self.payment_method, "payment_method")?;
        let payment_method = PaymentMethod::from_str(method.trim()).map_err(|_| {
            ServiceError::ValidationError(format!("unknown payment method '{}'", method))
        })?;

        Ok(RecordSaleCommand {
            variant_id: require(self.variant_id, "variant_id")?,
            quantity: require(self.quantity, "quantity")?,
            unit_price: require(self.unit_price, "unit_price")?,
            payment_method,
            seller_id,
            client_total: self.total,
        })
    }
}

/// POST /sales
pub async fn record_sale(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<RecordSaleRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let command = parse_json(payload)?.into_command(user.user_id.clone())?;
    let sale = state.services.sales.record_sale(command).await?;
    Ok(created_response(sale))
}

/// GET /sales
pub async fn list_sales(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let sales = state.services.sales.list_sales().await?;
    Ok(success_response(sales))
}
