pub mod common;
pub mod inventory;
pub mod products;
pub mod sales;

use crate::auth::AuthService;
use crate::events::EventSender;
use crate::services::{
    catalog::CatalogService, inventory::InventoryService, sales::SaleService,
    stock_history::StockHistoryService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryService>,
    pub sales: Arc<SaleService>,
    pub stock_history: Arc<StockHistoryService>,
    pub catalog: Arc<CatalogService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    /// Wires every service against the same pool and event channel.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            inventory: Arc::new(InventoryService::new(db.clone(), event_sender.clone())),
            sales: Arc::new(SaleService::new(db.clone(), event_sender.clone())),
            stock_history: Arc::new(StockHistoryService::new(db.clone())),
            catalog: Arc::new(CatalogService::new(db, event_sender)),
            auth,
        }
    }
}
