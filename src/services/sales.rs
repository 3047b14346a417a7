use crate::{
    db::run_atomic,
    entities::{
        product::{Entity as Product, MAX_PRICE},
        sale::{self, Entity as Sale, PaymentMethod, MAX_TOTAL_AMOUNT},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::InventoryService,
        stock_history::{NewStockHistoryEntry, StockHistoryService},
    },
};
use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Audit reason written for stock removed by a sale
pub const SALE_REASON: &str = "sale";

/// A point-of-sale request, already authenticated
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordSaleCommand {
    pub variant_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be a positive integer"))]
    pub quantity: i32,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, message = "seller id is required"))]
    pub seller_id: String,
    /// Total as computed by the client; only checked, never stored
    pub client_total: Option<Decimal>,
}

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() || price.is_zero() {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("unit price must be positive".into());
        return Err(err);
    }
    if price.round_dp(2) != *price {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("unit price allows at most 2 decimal places".into());
        return Err(err);
    }
    if *price > MAX_PRICE {
        let mut err = ValidationError::new("unit_price");
        err.message = Some(format!("unit price cannot exceed {}", MAX_PRICE).into());
        return Err(err);
    }
    Ok(())
}

/// Server-side total of a sale line
///
/// # Errors
/// `ValidationError` when the total does not fit the stored amount column.
pub fn sale_total(quantity: i32, unit_price: Decimal) -> Result<Decimal, ServiceError> {
    Decimal::from(quantity)
        .checked_mul(unit_price)
        .filter(|total| *total <= MAX_TOTAL_AMOUNT)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "total of {} x {} exceeds the maximum sale amount {}",
                quantity, unit_price, MAX_TOTAL_AMOUNT
            ))
        })
}

/// Sale recorder
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl SaleService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a sale: stock check, sale row, stock decrement and audit entry commit together
    /// or not at all.
    ///
    /// Not idempotent: replaying the same command records a second sale.
    #[instrument(skip(self), fields(variant_id = %command.variant_id, quantity = command.quantity))]
    pub async fn record_sale(&self, command: RecordSaleCommand) -> Result<sale::Model, ServiceError> {
        command.validate()?;

        let total = sale_total(command.quantity, command.unit_price)?;
        if let Some(client_total) = command.client_total {
            if client_total != total {
                counter!("storefront_sales.total_mismatch", 1);
                return Err(ServiceError::ValidationError(format!(
                    "total {} does not match quantity x unit price = {}",
                    client_total, total
                )));
            }
        }

        let start = std::time::Instant::now();
        let RecordSaleCommand {
            variant_id,
            quantity,
            unit_price,
            payment_method,
            seller_id,
            ..
        } = command;

        let sale = run_atomic(&self.db, "record_sale", move |txn| {
            Box::pin(async move {
                let variant = InventoryService::lock_variant(txn, variant_id).await?;
                let product = Product::find_by_id(variant.product_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!(
                            "Product {} not found for variant {}",
                            variant.product_id, variant_id
                        ))
                    })?;

                if quantity > variant.stock {
                    return Err(ServiceError::InsufficientStock(format!(
                        "variant {} has {} in stock, {} requested",
                        variant_id, variant.stock, quantity
                    )));
                }

                let sale = sale::ActiveModel {
                    variant_id: Set(variant.id),
                    product_id: Set(product.id),
                    product_name: Set(product.name.clone()),
                    color: Set(variant.color.clone()),
                    size: Set(variant.size),
                    quantity: Set(quantity),
                    unit_price: Set(unit_price),
                    total_amount: Set(total),
                    payment_method: Set(payment_method.to_string()),
                    seller_id: Set(seller_id.clone()),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                let change = InventoryService::apply_delta_to(txn, &variant, -quantity).await?;
                StockHistoryService::append(
                    txn,
                    NewStockHistoryEntry::from_change(&change, SALE_REASON.to_string(), seller_id),
                )
                .await?;

                Ok(sale)
            })
        })
        .await
        .map_err(|e| {
            counter!("storefront_sales.failed", 1, "kind" => e.kind().to_string());
            e
        })?;

        counter!("storefront_sales.recorded", 1);
        histogram!("storefront_sales.record_duration", start.elapsed());
        info!(sale_id = sale.id, total = %sale.total_amount, "Sale recorded");

        self.event_sender
            .send_or_log(Event::SaleRecorded {
                sale_id: sale.id,
                variant_id: sale.variant_id,
                quantity: sale.quantity,
                total_amount: sale.total_amount,
                seller_id: sale.seller_id.clone(),
            })
            .await;

        Ok(sale)
    }

    /// All sales, newest first
    #[instrument(skip(self))]
    pub async fn list_sales(&self) -> Result<Vec<sale::Model>, ServiceError> {
        Ok(Sale::find()
            .order_by_desc(sale::Column::CreatedAt)
            .order_by_desc(sale::Column::Id)
            .all(&*self.db)
            .await?)
    }
}
