use crate::{
    db::run_atomic,
    entities::{
        product::{self, Entity as Product, MAX_PRICE},
        product_variant::{self, Entity as ProductVariant, VARIANT_SIZE_RANGE},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::{compute_stock_change, variant_not_found},
        stock_history::{NewStockHistoryEntry, StockHistoryService},
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Audit reason for the stock a variant is created with
pub const INITIAL_STOCK_REASON: &str = "initial stock";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(custom = "validate_not_blank")]
    pub name: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub description: Option<String>,
    pub category: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVariantInput {
    pub product_id: Uuid,
    #[validate(custom = "validate_not_blank")]
    pub color: String,
    #[validate(custom = "validate_size")]
    pub size: i32,
    #[validate(range(min = 0, message = "initial stock cannot be negative"))]
    pub stock: i32,
    pub media_url: Option<String>,
    /// Recorded as the actor of the initial stock entry
    pub actor_name: String,
}

/// A product together with its variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<product_variant::Model>,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO || price.round_dp(2) != *price {
        let mut err = ValidationError::new("price");
        err.message = Some("price must be positive with at most 2 decimal places".into());
        return Err(err);
    }
    if *price > MAX_PRICE {
        let mut err = ValidationError::new("price");
        err.message = Some(format!("price cannot exceed {}", MAX_PRICE).into());
        return Err(err);
    }
    Ok(())
}

fn validate_size(size: i32) -> Result<(), ValidationError> {
    if !VARIANT_SIZE_RANGE.contains(&size) {
        let mut err = ValidationError::new("size");
        err.message = Some(
            format!(
                "size must be between {} and {}",
                VARIANT_SIZE_RANGE.start(),
                VARIANT_SIZE_RANGE.end()
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

fn product_not_found(product_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Product {} not found", product_id))
}

/// Product catalog service for managing products and variants
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Create a new product
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            price: Set(input.price),
            description: Set(input.description),
            category: Set(input.category),
            media_url: Set(input.media_url),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ProductCreated {
                product_id: product.id,
            })
            .await;

        info!("Created product: {}", product.id);
        Ok(product)
    }

    /// Products, newest first
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(Product::find()
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| product_not_found(product_id))
    }

    #[instrument(skip(self))]
    pub async fn get_product_with_variants(
        &self,
        product_id: Uuid,
    ) -> Result<ProductWithVariants, ServiceError> {
        let product = self.get_product(product_id).await?;
        let variants = product
            .find_related(ProductVariant)
            .order_by_asc(product_variant::Column::Size)
            .order_by_asc(product_variant::Column::Color)
            .all(&*self.db)
            .await?;
        Ok(ProductWithVariants { product, variants })
    }

    /// Deletes a product and all of its variants in one unit of work.
    ///
    /// Sales and stock history of those variants are kept.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<u64, ServiceError> {
        let variants_removed = run_atomic(&self.db, "delete_product", move |txn| {
            Box::pin(async move {
                let product = Product::find_by_id(product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| product_not_found(product_id))?;

                let removed = ProductVariant::delete_many()
                    .filter(product_variant::Column::ProductId.eq(product_id))
                    .exec(txn)
                    .await?
                    .rows_affected;
                product.delete(txn).await?;
                Ok(removed)
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted {
                product_id,
                variants_removed,
            })
            .await;

        info!(%product_id, variants_removed, "Deleted product");
        Ok(variants_removed)
    }

    /// Adds a variant; a positive initial stock is recorded in the stock history
    #[instrument(skip(self))]
    pub async fn create_variant(
        &self,
        input: CreateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        input.validate()?;

        let variant = run_atomic(&self.db, "create_variant", move |txn| {
            Box::pin(async move {
                Product::find_by_id(input.product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| product_not_found(input.product_id))?;

                let now = Utc::now();
                let variant = product_variant::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(input.product_id),
                    color: Set(input.color.trim().to_string()),
                    size: Set(input.size),
                    stock: Set(input.stock),
                    media_url: Set(input.media_url),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await?;

                if variant.stock > 0 {
                    let change = compute_stock_change(variant.id, 0, variant.stock)?;
                    StockHistoryService::append(
                        txn,
                        NewStockHistoryEntry::from_change(
                            &change,
                            INITIAL_STOCK_REASON.to_string(),
                            input.actor_name,
                        ),
                    )
                    .await?;
                }

                Ok(variant)
            })
        })
        .await?;

        self.event_sender
            .send_or_log(Event::VariantCreated {
                variant_id: variant.id,
                product_id: variant.product_id,
                initial_stock: variant.stock,
            })
            .await;

        info!(variant_id = %variant.id, "Created variant");
        Ok(variant)
    }

    /// Removes a variant; its stock history stays
    #[instrument(skip(self))]
    pub async fn delete_variant(&self, variant_id: Uuid) -> Result<(), ServiceError> {
        let result = ProductVariant::delete_by_id(variant_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(variant_not_found(variant_id));
        }

        self.event_sender
            .send_or_log(Event::VariantDeleted { variant_id })
            .await;

        info!(%variant_id, "Deleted variant");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::TestDb;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn product_input(name: &str, price: Decimal) -> CreateProductInput {
        CreateProductInput {
            name: name.into(),
            price,
            description: None,
            category: Some("running".into()),
            media_url: None,
        }
    }

    fn variant_input(product_id: Uuid, size: i32, stock: i32) -> CreateVariantInput {
        CreateVariantInput {
            product_id,
            color: "black".into(),
            size,
            stock,
            media_url: None,
            actor_name: "admin1".into(),
        }
    }

    #[tokio::test]
    async fn product_validation() {
        let t = TestDb::new().await;
        assert_matches!(
            t.catalog().create_product(product_input("  ", dec!(10))).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            t.catalog().create_product(product_input("Runner", dec!(0))).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            t.catalog().create_product(product_input("Runner", dec!(9.999))).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            t.catalog()
                .create_product(product_input("Runner", MAX_PRICE + dec!(0.01)))
                .await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(t.catalog().list_products().await.unwrap().is_empty());

        assert!(t
            .catalog()
            .create_product(product_input("Runner Gold", MAX_PRICE))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn variant_size_must_be_in_range() {
        let t = TestDb::new().await;
        let product = t
            .catalog()
            .create_product(product_input("Runner", dec!(49.90)))
            .await
            .unwrap();

        for size in [19, 51] {
            assert_matches!(
                t.catalog().create_variant(variant_input(product.id, size, 1)).await,
                Err(ServiceError::ValidationError(_))
            );
        }
        for size in [20, 50] {
            t.catalog()
                .create_variant(variant_input(product.id, size, 0))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn initial_stock_is_audited() {
        let t = TestDb::new().await;
        let product = t
            .catalog()
            .create_product(product_input("Runner", dec!(49.90)))
            .await
            .unwrap();

        let stocked = t
            .catalog()
            .create_variant(variant_input(product.id, 42, 6))
            .await
            .unwrap();
        let empty = t
            .catalog()
            .create_variant(variant_input(product.id, 43, 0))
            .await
            .unwrap();

        let history = t.history().list_for_variant(stocked.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, INITIAL_STOCK_REASON);
        assert_eq!((history[0].stock_before, history[0].stock_after), (0, 6));
        assert!(t.history().list_for_variant(empty.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn variant_for_missing_product_is_not_found() {
        let t = TestDb::new().await;
        assert_matches!(
            t.catalog()
                .create_variant(variant_input(Uuid::new_v4(), 40, 3))
                .await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn delete_missing_things_is_not_found() {
        let t = TestDb::new().await;
        assert_matches!(
            t.catalog().delete_product(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            t.catalog().delete_variant(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn product_with_variants_lists_by_size() {
        let t = TestDb::new().await;
        let product = t
            .catalog()
            .create_product(product_input("Runner", dec!(49.90)))
            .await
            .unwrap();
        for size in [44, 38, 41] {
            t.catalog()
                .create_variant(variant_input(product.id, size, 1))
                .await
                .unwrap();
        }

        let full = t.catalog().get_product_with_variants(product.id).await.unwrap();
        assert_eq!(
            full.variants.iter().map(|v| v.size).collect::<Vec<_>>(),
            vec![38, 41, 44]
        );
    }
}
