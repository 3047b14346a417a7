use super::common::{created_response, no_content_response, parse_json, require, success_response};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::catalog::{CreateProductInput, CreateVariantInput},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Response,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(alias = "image")]
    pub media_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateVariantRequest {
    pub color: Option<String>,
    pub size: Option<i32>,
    pub stock: Option<i32>,
    pub media_url: Option<String>,
}

/// GET /products
pub async fn list_products(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let products = state.services.catalog.list_products().await?;
    Ok(success_response(products))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.get_product_with_variants(id).await?;
    Ok(success_response(product))
}

/// POST /products
pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_json(payload)?;
    let input = CreateProductInput {
        name: require(body.name, "name")?,
        price: require(body.price, "price")?,
        description: body.description,
        category: body.category,
        media_url: body.media_url,
    };

    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(product))
}

/// DELETE /products/:id
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_product(id).await?;
    Ok(no_content_response())
}

/// POST /products/:id/variants
pub async fn create_variant(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(product_id): Path<Uuid>,
    payload: Result<Json<CreateVariantRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let body = parse_json(payload)?;
    let input = CreateVariantInput {
        product_id,
        color: require(body.color, "color")?,
        size: require(body.size, "size")?,
        stock: body.stock.unwrap_or(0),
        media_url: body.media_url,
        actor_name: user.actor_name().to_string(),
    };

    let variant = state.services.catalog.create_variant(input).await?;
    Ok(created_response(variant))
}

/// DELETE /variants/:id
pub async fn delete_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    state.services.catalog.delete_variant(id).await?;
    Ok(no_content_response())
}
