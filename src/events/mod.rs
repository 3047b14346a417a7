use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events published after a unit of work commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProductCreated {
        product_id: Uuid,
    },
    ProductDeleted {
        product_id: Uuid,
        variants_removed: u64,
    },
    VariantCreated {
        variant_id: Uuid,
        product_id: Uuid,
        initial_stock: i32,
    },
    VariantDeleted {
        variant_id: Uuid,
    },
    SaleRecorded {
        sale_id: i64,
        variant_id: Uuid,
        quantity: i32,
        total_amount: Decimal,
        seller_id: String,
    },
    StockAdjusted {
        variant_id: Uuid,
        stock_before: i32,
        stock_after: i32,
        reason: String,
        actor_name: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ProductCreated { .. } => "product_created",
            Event::ProductDeleted { .. } => "product_deleted",
            Event::VariantCreated { .. } => "variant_created",
            Event::VariantDeleted { .. } => "variant_deleted",
            Event::SaleRecorded { .. } => "sale_recorded",
            Event::StockAdjusted { .. } => "stock_adjusted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event and only logs a failure.
    ///
    /// Used after commit: the stored state is already final, so a closed channel must not
    /// turn a successful operation into an error.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            counter!("storefront_events.dropped", 1);
            warn!(event = name, error = %e, "Dropping domain event");
        }
    }
}

/// Drains the event channel until every sender is gone, logging each event.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("storefront_events.processed", 1, "event" => event.name());
        match &event {
            Event::SaleRecorded {
                sale_id,
                variant_id,
                quantity,
                total_amount,
                seller_id,
            } => info!(
                sale_id,
                %variant_id,
                quantity,
                %total_amount,
                seller_id = %seller_id,
                "Sale recorded"
            ),
            Event::StockAdjusted {
                variant_id,
                stock_before,
                stock_after,
                reason,
                actor_name,
                ..
            } => info!(
                %variant_id,
                stock_before,
                stock_after,
                reason = %reason,
                actor = %actor_name,
                "Stock adjusted"
            ),
            other => info!(event = other.name(), payload = ?other, "Catalog event"),
        }
    }

    info!("Event channel closed, stopping event processing");
}
