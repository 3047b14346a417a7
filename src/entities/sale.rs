use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Largest amount the `decimal(14,2)` total column holds
pub const MAX_TOTAL_AMOUNT: Decimal = dec!(999999999999.99);

/// Immutable point-of-sale record.
///
/// Product name, color and size are copied at sale time so the record stays readable
/// after the catalog changes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub variant_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub color: String,
    pub size: i32,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))")]
    pub total_amount: Decimal,
    pub payment_method: String,
    pub seller_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Accepted payment methods. Spanish names from the point-of-sale screen are aliases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum PaymentMethod {
    #[strum(to_string = "cash", serialize = "efectivo")]
    Cash,
    #[strum(to_string = "card", serialize = "tarjeta")]
    Card,
    #[strum(to_string = "transfer", serialize = "transferencia")]
    Transfer,
}
