// Inventory ledger and its audit trail
pub mod inventory;
pub mod stock_history;

// Point of sale
pub mod sales;

// Products and variants
pub mod catalog;

#[cfg(test)]
pub(crate) mod test_support {
    use super::{
        catalog::CatalogService, inventory::InventoryService, sales::SaleService,
        stock_history::StockHistoryService,
    };
    use crate::{
        db,
        entities::{product, product_variant},
        events::{Event, EventSender},
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    /// Migrated in-memory SQLite database plus an event channel whose receiver is kept
    pub struct TestDb {
        pub db: Arc<DatabaseConnection>,
        pub events: Arc<EventSender>,
        pub event_rx: mpsc::Receiver<Event>,
    }

    impl TestDb {
        pub async fn new() -> Self {
            // one connection: every handle must see the same in-memory database
            let cfg = db::DbConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            };
            let pool = db::establish_connection_with_config(&cfg)
                .await
                .expect("sqlite pool");
            db::run_migrations(&pool).await.expect("migrations");

            let (tx, event_rx) = mpsc::channel(1024);
            Self {
                db: Arc::new(pool),
                events: Arc::new(EventSender::new(tx)),
                event_rx,
            }
        }

        pub fn inventory(&self) -> InventoryService {
            InventoryService::new(self.db.clone(), self.events.clone())
        }

        pub fn sales(&self) -> SaleService {
            SaleService::new(self.db.clone(), self.events.clone())
        }

        pub fn history(&self) -> StockHistoryService {
            StockHistoryService::new(self.db.clone())
        }

        pub fn catalog(&self) -> CatalogService {
            CatalogService::new(self.db.clone(), self.events.clone())
        }
    }

    /// Inserts a product with one variant holding `stock` units, bypassing the ledger
    pub async fn seed_variant(db: &DatabaseConnection, stock: i32) -> product_variant::Model {
        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Trail Runner".into()),
            price: Set(dec!(59.90)),
            description: Set(None),
            category: Set(Some("running".into())),
            media_url: Set(None),
            created_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed product");

        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            color: Set("red".into()),
            size: Set(42),
            stock: Set(stock),
            media_url: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .expect("seed variant")
    }
}
