mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;
use storefront_api::{
    errors::ServiceError,
    services::{
        catalog::INITIAL_STOCK_REASON,
        inventory::{AdjustStockCommand, SetStockCommand, DEFAULT_STOCK_REASON},
    },
};
use uuid::Uuid;

fn set_stock(variant_id: Uuid, new_stock: i32, reason: Option<&str>) -> SetStockCommand {
    SetStockCommand {
        variant_id,
        new_stock,
        reason: reason.map(str::to_string),
        actor_name: "admin1".to_string(),
    }
}

#[tokio::test]
async fn restock_records_the_positive_change() {
    let app = TestApp::new().await;
    let variant = app.seed_variant(10).await;

    let change = app
        .state
        .services
        .inventory
        .set_stock(set_stock(variant.id, 50, Some("restock")))
        .await
        .expect("set stock");

    assert_eq!(change.stock_before, 10);
    assert_eq!(change.stock_after, 50);
    assert_eq!(change.change, 40);
    assert_eq!(app.stock_of(&variant).await, 50);

    let entries = app
        .state
        .services
        .stock_history
        .list_for_variant(variant.id)
        .await
        .expect("history");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].reason, "restock");
    assert_eq!(entries[0].actor_name, "admin1");
    assert_eq!(entries[0].change, 40);
    assert_eq!(entries[0].stock_before, 10);
    assert_eq!(entries[0].stock_after, 50);
    assert_eq!(entries[1].reason, INITIAL_STOCK_REASON);
}

#[tokio::test]
async fn negative_stock_is_rejected_without_change() {
    let app = TestApp::new().await;
    let variant = app.seed_variant(10).await;
    let history_before = app.history().await.len();

    let result = app
        .state
        .services
        .inventory
        .set_stock(set_stock(variant.id, -1, Some("oops")))
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert_eq!(app.stock_of(&variant).await, 10);
    assert_eq!(app.history().await.len(), history_before);
}

#[tokio::test]
async fn deleting_a_product_removes_its_variants() {
    let app = TestApp::new().await;
    let variant = app.seed_variant(10).await;
    let sibling = app
        .state
        .services
        .catalog
        .create_variant(storefront_api::services::catalog::CreateVariantInput {
            product_id: variant.product_id,
            color: "black".to_string(),
            size: 40,
            stock: 3,
            media_url: None,
            actor_name: "admin1".to_string(),
        })
        .await
        .expect("second variant");

    let removed = app
        .state
        .services
        .catalog
        .delete_product(variant.product_id)
        .await
        .expect("delete product");
    assert_eq!(removed, 2);

    for id in [variant.id, sibling.id] {
        let result = app.state.services.inventory.get_stock(id).await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }
    assert!(app.products().await.is_empty());
}

#[tokio::test]
async fn adjust_applies_a_signed_delta() {
    let app = TestApp::new().await;
    let variant = app.seed_variant(5).await;
    let inventory = &app.state.services.inventory;

    let change = inventory
        .adjust_stock(AdjustStockCommand {
            variant_id: variant.id,
            delta: -2,
            reason: Some("damaged".into()),
            actor_name: "admin1".into(),
        })
        .await
        .expect("adjust down");
    assert_eq!((change.stock_before, change.stock_after), (5, 3));

    let result = inventory
        .adjust_stock(AdjustStockCommand {
            variant_id: variant.id,
            delta: -4,
            reason: None,
            actor_name: "admin1".into(),
        })
        .await;
    assert_matches!(result, Err(ServiceError::InsufficientStock(_)));
    assert_eq!(app.stock_of(&variant).await, 3);
}

#[tokio::test]
async fn history_is_newest_first_and_arithmetic_holds() {
    let app = TestApp::new().await;
    let variant = app.seed_variant(4).await;

    for (stock, reason) in [(9, Some("delivery")), (1, Some("recount")), (6, None)] {
        app.state
            .services
            .inventory
            .set_stock(set_stock(variant.id, stock, reason))
            .await
            .expect("set stock");
    }

    let entries = app
        .state
        .services
        .stock_history
        .list_all()
        .await
        .expect("history");
    let reasons: Vec<_> = entries.iter().map(|e| e.reason.as_str()).collect();
    assert_eq!(
        reasons,
        vec![DEFAULT_STOCK_REASON, "recount", "delivery", INITIAL_STOCK_REASON]
    );
    for entry in &entries {
        assert_eq!(entry.stock_after, entry.stock_before + entry.change);
        assert!(entry.stock_after >= 0);
    }
}

#[tokio::test]
async fn admin_sets_stock_over_http_with_token_identity() {
    let app = TestApp::new().await;
    let variant = app.seed_variant(10).await;
    let uri = format!("/api/v1/inventory/variants/{}/stock", variant.id);

    let response = app
        .as_admin(
            Method::PUT,
            &uri,
            Some(json!({ "new_stock": 50, "reason": "restock", "actor_name": "mallory" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["variant_id"], variant.id.to_string());
    assert_eq!(body["data"]["stock_before"], 10);
    assert_eq!(body["data"]["stock_after"], 50);

    let response = app.as_seller(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["stock"], 50);

    let history_uri = format!("/api/v1/inventory/variants/{}/history", variant.id);
    let body = response_json(app.as_admin(Method::GET, &history_uri, None).await).await;
    // actor comes from the token's display name, not the request body
    assert_eq!(body["data"][0]["actor_name"], "Admin One");
}

#[tokio::test]
async fn stock_of_unknown_variant_is_not_found_over_http() {
    let app = TestApp::new().await;
    let uri = format!("/api/v1/inventory/variants/{}/stock", Uuid::new_v4());

    let response = app.as_seller(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["code"], "not_found");
}
