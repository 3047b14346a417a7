use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit record of one stock change: `stock_after == stock_before + change`.
///
/// `variant_id` is not a foreign key: history outlives deleted variants.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub variant_id: Uuid,
    pub reason: String,
    pub actor_name: String,
    pub change: i32,
    pub stock_before: i32,
    pub stock_after: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
