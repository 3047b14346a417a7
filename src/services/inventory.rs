use crate::{
    db::run_atomic,
    entities::product_variant::{self, Entity as ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
    services::stock_history::{NewStockHistoryEntry, StockHistoryService},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, QueryFilter, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Reason recorded when an admin correction does not name one
pub const DEFAULT_STOCK_REASON: &str = "manual update";

/// Outcome of one stock mutation; always satisfies `stock_after == stock_before + change`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub variant_id: Uuid,
    pub stock_before: i32,
    pub stock_after: i32,
    pub change: i32,
}

/// Arithmetic of a stock mutation, kept free of I/O.
pub fn compute_stock_change(
    variant_id: Uuid,
    current: i32,
    delta: i32,
) -> Result<StockChange, ServiceError> {
    let stock_after = current.checked_add(delta).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "stock change of {} overflows the stock of variant {}",
            delta, variant_id
        ))
    })?;

    if stock_after < 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "variant {} has {} in stock, cannot remove {}",
            variant_id, current, -delta
        )));
    }

    Ok(StockChange {
        variant_id,
        stock_before: current,
        stock_after,
        change: delta,
    })
}

/// Manual stock correction to an absolute value
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetStockCommand {
    pub variant_id: Uuid,
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub new_stock: i32,
    pub reason: Option<String>,
    #[validate(length(min = 1, message = "actor name is required"))]
    pub actor_name: String,
}

/// Relative stock correction (restock, shrinkage, recount)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustStockCommand {
    pub variant_id: Uuid,
    pub delta: i32,
    pub reason: Option<String>,
    #[validate(length(min = 1, message = "actor name is required"))]
    pub actor_name: String,
}

fn reason_or_default(reason: Option<String>) -> String {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_STOCK_REASON.to_string())
}

/// Inventory ledger: the only writer of `product_variants.stock`
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Current stock of a variant
    #[instrument(skip(self))]
    pub async fn get_stock(&self, variant_id: Uuid) -> Result<i32, ServiceError> {
        let variant = ProductVariant::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| variant_not_found(variant_id))?;
        Ok(variant.stock)
    }

    /// Reads a variant row, locking it for the rest of the enclosing transaction.
    ///
    /// Postgres takes a `FOR UPDATE` row lock. SQLite ignores `FOR UPDATE` and opens
    /// transactions deferred, so there the row is first rewritten to itself: that claims the
    /// database write lock before the read, and competing units wait on the busy timeout
    /// instead of failing when they upgrade from a stale read. Must be the first statement of
    /// the unit on SQLite.
    pub async fn lock_variant<C: ConnectionTrait>(
        conn: &C,
        variant_id: Uuid,
    ) -> Result<product_variant::Model, ServiceError> {
        if conn.get_database_backend() == DatabaseBackend::Sqlite {
            ProductVariant::update_many()
                .col_expr(
                    product_variant::Column::Stock,
                    Expr::col(product_variant::Column::Stock).into(),
                )
                .filter(product_variant::Column::Id.eq(variant_id))
                .exec(conn)
                .await?;
        }

        ProductVariant::find_by_id(variant_id)
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| variant_not_found(variant_id))
    }

    /// Applies `delta` to the variant's stock inside the caller's transaction.
    pub async fn apply_delta<C: ConnectionTrait>(
        conn: &C,
        variant_id: Uuid,
        delta: i32,
    ) -> Result<StockChange, ServiceError> {
        let variant = Self::lock_variant(conn, variant_id).await?;
        Self::apply_delta_to(conn, &variant, delta).await
    }

    /// Same as [`apply_delta`](Self::apply_delta) for a row already read under lock.
    ///
    /// The write is guarded on the stock value that was read; if another writer changed it
    /// in between, nothing is written and the call fails with `ConcurrentModification`.
    pub async fn apply_delta_to<C: ConnectionTrait>(
        conn: &C,
        variant: &product_variant::Model,
        delta: i32,
    ) -> Result<StockChange, ServiceError> {
        let change = compute_stock_change(variant.id, variant.stock, delta)?;

        let result = ProductVariant::update_many()
            .col_expr(product_variant::Column::Stock, Expr::value(change.stock_after))
            .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product_variant::Column::Id.eq(variant.id))
            .filter(product_variant::Column::Stock.eq(change.stock_before))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            counter!("storefront_inventory.concurrent_modification", 1);
            warn!(variant_id = %variant.id, "Stock changed underneath a guarded write");
            return Err(ServiceError::ConcurrentModification(variant.id));
        }

        Ok(change)
    }

    /// Sets a variant's stock to an absolute value and records the correction
    #[instrument(skip(self), fields(variant_id = %command.variant_id))]
    pub async fn set_stock(&self, command: SetStockCommand) -> Result<StockChange, ServiceError> {
        command.validate()?;

        let reason = reason_or_default(command.reason);
        let actor_name = command.actor_name.trim().to_string();
        let variant_id = command.variant_id;
        let new_stock = command.new_stock;
        let audit_reason = reason.clone();
        let audit_actor = actor_name.clone();

        let change = run_atomic(&self.db, "set_stock", move |txn| {
            Box::pin(async move {
                let variant = Self::lock_variant(txn, variant_id).await?;
                let change = Self::apply_delta_to(txn, &variant, new_stock - variant.stock).await?;
                StockHistoryService::append(
                    txn,
                    NewStockHistoryEntry::from_change(&change, audit_reason, audit_actor),
                )
                .await?;
                Ok(change)
            })
        })
        .await?;

        counter!("storefront_inventory.stock_set", 1);
        info!(
            stock_before = change.stock_before,
            stock_after = change.stock_after,
            "Stock set"
        );
        self.publish(&change, reason, actor_name).await;
        Ok(change)
    }

    /// Adds `delta` (either sign) to a variant's stock and records the correction
    #[instrument(skip(self), fields(variant_id = %command.variant_id))]
    pub async fn adjust_stock(
        &self,
        command: AdjustStockCommand,
    ) -> Result<StockChange, ServiceError> {
        command.validate()?;
        if command.delta == 0 {
            return Err(ServiceError::ValidationError(
                "adjustment delta must not be zero".to_string(),
            ));
        }

        let reason = reason_or_default(command.reason);
        let actor_name = command.actor_name.trim().to_string();
        let variant_id = command.variant_id;
        let delta = command.delta;
        let audit_reason = reason.clone();
        let audit_actor = actor_name.clone();

        let change = run_atomic(&self.db, "adjust_stock", move |txn| {
            Box::pin(async move {
                let change = Self::apply_delta(txn, variant_id, delta).await?;
                StockHistoryService::append(
                    txn,
                    NewStockHistoryEntry::from_change(&change, audit_reason, audit_actor),
                )
                .await?;
                Ok(change)
            })
        })
        .await?;

        counter!("storefront_inventory.stock_adjusted", 1);
        info!(
            stock_before = change.stock_before,
            stock_after = change.stock_after,
            "Stock adjusted"
        );
        self.publish(&change, reason, actor_name).await;
        Ok(change)
    }

    async fn publish(&self, change: &StockChange, reason: String, actor_name: String) {
        self.event_sender
            .send_or_log(Event::StockAdjusted {
                variant_id: change.variant_id,
                stock_before: change.stock_before,
                stock_after: change.stock_after,
                reason,
                actor_name,
                at: Utc::now(),
            })
            .await;
    }
}

pub(crate) fn variant_not_found(variant_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Product variant {} not found", variant_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{seed_variant, TestDb};
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn compute_rejects_going_negative() {
        let id = Uuid::new_v4();
        assert_matches!(
            compute_stock_change(id, 2, -5),
            Err(ServiceError::InsufficientStock(_))
        );
        assert_eq!(
            compute_stock_change(id, 2, -2).unwrap(),
            StockChange {
                variant_id: id,
                stock_before: 2,
                stock_after: 0,
                change: -2
            }
        );
    }

    #[test]
    fn compute_rejects_overflow() {
        assert_matches!(
            compute_stock_change(Uuid::nil(), i32::MAX, 1),
            Err(ServiceError::ValidationError(_))
        );
    }

    proptest! {
        #[test]
        fn computed_change_is_consistent_and_never_negative(
            current in 0i32..1_000_000,
            delta in -2_000_000i32..2_000_000,
        ) {
            match compute_stock_change(Uuid::nil(), current, delta) {
                Ok(change) => {
                    prop_assert!(change.stock_after >= 0);
                    prop_assert_eq!(change.stock_after, change.stock_before + change.change);
                    prop_assert_eq!(change.stock_before, current);
                }
                Err(ServiceError::InsufficientStock(_)) => prop_assert!(current + delta < 0),
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn get_stock_reports_missing_variant() {
        let t = TestDb::new().await;
        let err = t.inventory().get_stock(Uuid::new_v4()).await.unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn set_stock_defaults_reason() {
        let t = TestDb::new().await;
        let variant = seed_variant(&t.db, 4).await;

        t.inventory()
            .set_stock(SetStockCommand {
                variant_id: variant.id,
                new_stock: 9,
                reason: Some("   ".into()),
                actor_name: "admin1".into(),
            })
            .await
            .unwrap();

        let history = t.history().list_for_variant(variant.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, DEFAULT_STOCK_REASON);
        assert_eq!(history[0].change, 5);
    }

    #[tokio::test]
    async fn adjust_stock_rejects_zero_delta() {
        let t = TestDb::new().await;
        let variant = seed_variant(&t.db, 4).await;
        let err = t
            .inventory()
            .adjust_stock(AdjustStockCommand {
                variant_id: variant.id,
                delta: 0,
                reason: None,
                actor_name: "admin1".into(),
            })
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn guarded_write_detects_stale_read() {
        let t = TestDb::new().await;
        let variant = seed_variant(&t.db, 5).await;

        // a stale copy of the row, as if read before another writer committed
        let mut stale = variant.clone();
        stale.stock = 3;

        let err = InventoryService::apply_delta_to(&*t.db, &stale, -1)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ConcurrentModification(id) if id == variant.id);
        assert_eq!(t.inventory().get_stock(variant.id).await.unwrap(), 5);
    }
}
