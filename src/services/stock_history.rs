use crate::{
    entities::stock_history::{self, Entity as StockHistory},
    errors::ServiceError,
    services::inventory::StockChange,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Values of a stock history row about to be appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockHistoryEntry {
    pub variant_id: Uuid,
    pub reason: String,
    pub actor_name: String,
    pub change: i32,
    pub stock_before: i32,
    pub stock_after: i32,
}

impl NewStockHistoryEntry {
    pub fn from_change(change: &StockChange, reason: String, actor_name: String) -> Self {
        Self {
            variant_id: change.variant_id,
            reason,
            actor_name,
            change: change.change,
            stock_before: change.stock_before,
            stock_after: change.stock_after,
        }
    }
}

/// Append-only stock audit trail
#[derive(Clone)]
pub struct StockHistoryService {
    db: Arc<DatabaseConnection>,
}

impl StockHistoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Inserts one entry on `conn`, normally the transaction that changed the stock.
    pub async fn append<C: ConnectionTrait>(
        conn: &C,
        entry: NewStockHistoryEntry,
    ) -> Result<stock_history::Model, ServiceError> {
        debug_assert_eq!(
            entry.stock_after,
            entry.stock_before + entry.change,
            "stock history arithmetic"
        );

        let row = stock_history::ActiveModel {
            variant_id: Set(entry.variant_id),
            reason: Set(entry.reason),
            actor_name: Set(entry.actor_name),
            change: Set(entry.change),
            stock_before: Set(entry.stock_before),
            stock_after: Set(entry.stock_after),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        Ok(row.insert(conn).await?)
    }

    /// Every entry, newest first
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<stock_history::Model>, ServiceError> {
        Ok(StockHistory::find()
            .order_by_desc(stock_history::Column::CreatedAt)
            .order_by_desc(stock_history::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Entries of one variant, newest first. Works for deleted variants too.
    #[instrument(skip(self))]
    pub async fn list_for_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<Vec<stock_history::Model>, ServiceError> {
        Ok(StockHistory::find()
            .filter(stock_history::Column::VariantId.eq(variant_id))
            .order_by_desc(stock_history::Column::CreatedAt)
            .order_by_desc(stock_history::Column::Id)
            .all(&*self.db)
            .await?)
    }
}
