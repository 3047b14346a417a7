#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait};
use serde_json::Value;
use storefront_api::{
    auth::{AuthConfig, AuthService, Role},
    config::AppConfig,
    db,
    entities::{product, product_variant, sale, stock_history},
    events::{self, EventSender},
    handlers::AppServices,
    services::catalog::{CreateProductInput, CreateVariantInput},
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str =
    "integration-test-signing-key-7c1e9a3f5b2d8e4a6c0f1b3d5e7a9c2e4f6a8b0d1c3e5f7a";

pub const ADMIN_ID: &str = "admin-1";
pub const SELLER_ID: &str = "seller-1";
pub const CLIENT_ID: &str = "client-1";

/// Helper harness for spinning up an application state backed by a fresh SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin_token: String,
    pub seller_token: String,
    pub client_token: String,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: Option<tempfile::TempDir>,
}

fn test_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut cfg = AppConfig::new(
        database_url,
        TEST_JWT_SECRET.to_string(),
        3600,
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = max_connections;
    cfg.db_min_connections = 1;
    cfg
}

impl TestApp {
    /// Construct a new test application on an in-memory database.
    pub async fn new() -> Self {
        // a single connection keeps every handle on the same in-memory database
        Self::build(test_config("sqlite::memory:".to_string(), 1), None).await
    }

    /// Construct a test application on a SQLite file with a pool of `max_connections`,
    /// so concurrent units of work really run on separate connections.
    pub async fn file_backed(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("temp dir for sqlite file");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("storefront-test.db").display()
        );
        Self::build(test_config(url, max_connections), Some(dir)).await
    }

    async fn build(cfg: AppConfig, db_dir: Option<tempfile::TempDir>) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), auth_service.clone());

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let admin_token = auth_service
            .issue_token(ADMIN_ID, "Admin One", Role::Admin)
            .expect("admin token");
        let seller_token = auth_service
            .issue_token(SELLER_ID, "Seller One", Role::Vendedor)
            .expect("seller token");
        let client_token = auth_service
            .issue_token(CLIENT_ID, "Client One", Role::Cliente)
            .expect("client token");

        Self {
            router: storefront_api::build_router(state.clone()),
            state,
            admin_token,
            seller_token,
            client_token,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.admin_token)).await
    }

    pub async fn as_seller(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.seller_token)).await
    }

    /// Seeds a product with one variant (size 42) holding `stock` units.
    pub async fn seed_variant(&self, stock: i32) -> product_variant::Model {
        let catalog = self.state.services.catalog.clone();
        let product = catalog
            .create_product(CreateProductInput {
                name: "Court Classic".to_string(),
                price: Decimal::new(2000, 2),
                description: Some("Seeded for integration tests".to_string()),
                category: Some("sneakers".to_string()),
                media_url: None,
            })
            .await
            .expect("seed product for tests");

        catalog
            .create_variant(CreateVariantInput {
                product_id: product.id,
                color: "white".to_string(),
                size: 42,
                stock,
                media_url: None,
                actor_name: "Admin One".to_string(),
            })
            .await
            .expect("seed product variant for tests")
    }

    pub async fn stock_of(&self, variant: &product_variant::Model) -> i32 {
        product_variant::Entity::find_by_id(variant.id)
            .one(self.state.db.as_ref())
            .await
            .expect("variant lookup")
            .expect("variant exists")
            .stock
    }

    pub async fn sales(&self) -> Vec<sale::Model> {
        sale::Entity::find()
            .all(self.state.db.as_ref())
            .await
            .expect("sales lookup")
    }

    pub async fn history(&self) -> Vec<stock_history::Model> {
        stock_history::Entity::find()
            .all(self.state.db.as_ref())
            .await
            .expect("history lookup")
    }

    pub async fn products(&self) -> Vec<product::Model> {
        product::Entity::find()
            .all(self.state.db.as_ref())
            .await
            .expect("products lookup")
    }

    /// Runs raw SQL, used to break the schema for fault-injection tests.
    pub async fn execute_sql(&self, sql: &str) {
        self.state
            .db
            .execute_unprepared(sql)
            .await
            .expect("raw sql should run");
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body should be json")
}

/// Decimals travel as JSON strings; compare them by value.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}
