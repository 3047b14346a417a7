//! Storefront API Library
//!
//! Catalog, point-of-sale and stock ledger for a small storefront, served over axum
//! with a sea-orm backed persistence layer.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{AuthRouterExt, AuthService, Role};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn auth_service(&self) -> Arc<AuthService> {
        self.services.auth.clone()
    }
}

// Common response wrappers
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Versioned API routes, gated per role
pub fn api_v1_routes() -> Router<AppState> {
    // Public catalog
    let catalog_read = Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/:id", get(handlers::products::get_product));

    let catalog_admin = Router::new()
        .route("/products", post(handlers::products::create_product))
        .route("/products/:id", delete(handlers::products::delete_product))
        .route(
            "/products/:id/variants",
            post(handlers::products::create_variant),
        )
        .route("/variants/:id", delete(handlers::products::delete_variant))
        .with_roles(&[Role::Admin]);

    // Point of sale
    let sales_record = Router::new()
        .route("/sales", post(handlers::sales::record_sale))
        .with_roles(&[Role::Vendedor, Role::Admin]);

    let sales_review = Router::new()
        .route("/sales", get(handlers::sales::list_sales))
        .with_roles(&[Role::Admin]);

    // Inventory ledger
    let stock_read = Router::new()
        .route(
            "/inventory/variants/:id/stock",
            get(handlers::inventory::get_stock),
        )
        .with_roles(&[Role::Vendedor, Role::Admin]);

    let stock_admin = Router::new()
        .route(
            "/inventory/variants/:id/stock",
            axum::routing::put(handlers::inventory::set_stock),
        )
        .route(
            "/inventory/variants/:id/adjust",
            post(handlers::inventory::adjust_stock),
        )
        .route("/inventory/history", get(handlers::inventory::list_history))
        .route(
            "/inventory/variants/:id/history",
            get(handlers::inventory::list_variant_history),
        )
        .with_roles(&[Role::Admin]);

    Router::new()
        .merge(catalog_read)
        .merge(catalog_admin)
        .merge(sales_record)
        .merge(sales_review)
        .merge(stock_read)
        .merge(stock_admin)
}

/// Full application router: health, the v1 API and the shared middleware stack.
///
/// CORS and request timeouts are deployment concerns and are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    let auth_service = state.auth_service();
    let body_limit = state.config.max_body_size;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(DefaultBodyLimit::max(body_limit))
        // Inject AuthService into request extensions for auth middleware
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            |State(auth): State<Arc<AuthService>>,
             mut req: axum::extract::Request,
             next: axum::middleware::Next| async move {
                req.extensions_mut().insert(auth);
                next.run(req).await
            },
        ))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Response {
    let (status, db_status) = match db::check_connection(&state.db).await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    let health_data = json!({
        "status": db_status,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "checks": {
            "database": db_status,
        },
    });

    (status, Json(ApiResponse::success(health_data))).into_response()
}
