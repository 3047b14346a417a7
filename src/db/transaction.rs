/*!
 * Unit of work
 *
 * Every multi-step mutation runs inside a single database transaction that
 * either commits as a whole or is rolled back as a whole.
 */

use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::fmt;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Lifecycle of a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    Idle,
    InProgress,
    Committed,
    RolledBack,
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitOfWorkState::Idle => write!(f, "idle"),
            UnitOfWorkState::InProgress => write!(f, "in_progress"),
            UnitOfWorkState::Committed => write!(f, "committed"),
            UnitOfWorkState::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// A one-shot transactional scope over the connection pool.
///
/// The steps only ever see a `&DatabaseTransaction`; opening another unit needs the pool,
/// so units cannot nest.
///
/// ```rust,ignore
/// let sale = UnitOfWork::new(&db, "record_sale")
///     .execute(|txn| {
///         Box::pin(async move {
///             let change = InventoryService::apply_delta(txn, variant_id, -2).await?;
///             StockHistoryService::append(txn, entry_for(&change)).await?;
///             Ok(change)
///         })
///     })
///     .await?;
/// ```
pub struct UnitOfWork<'db> {
    db: &'db DatabaseConnection,
    label: &'static str,
    id: Uuid,
    state: UnitOfWorkState,
}

impl<'db> UnitOfWork<'db> {
    pub fn new(db: &'db DatabaseConnection, label: &'static str) -> Self {
        Self {
            db,
            label,
            id: Uuid::new_v4(),
            state: UnitOfWorkState::Idle,
        }
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    /// Runs `f` inside a fresh transaction: commit on `Ok`, rollback on `Err`.
    ///
    /// The error produced by `f` is returned unchanged after the rollback. A unit of work
    /// can only execute once.
    pub async fn execute<F, T>(&mut self, f: F) -> Result<T, ServiceError>
    where
        F: for<'t> FnOnce(&'t DatabaseTransaction) -> BoxFuture<'t, Result<T, ServiceError>>
            + Send,
        T: Send,
    {
        if self.state != UnitOfWorkState::Idle {
            return Err(ServiceError::InvalidOperation(format!(
                "unit of work '{}' already {}",
                self.label, self.state
            )));
        }

        let start = std::time::Instant::now();
        let txn = self.db.begin().await.map_err(|e| {
            error!(unit = self.label, error = %e, "Failed to open transaction");
            counter!("storefront_db.transaction.begin_failed", 1);
            ServiceError::db_error(e)
        })?;
        self.state = UnitOfWorkState::InProgress;
        counter!("storefront_db.transaction.started", 1);
        debug!(unit = self.label, transaction_id = %self.id, "Transaction started");

        let outcome = f(&txn).await;

        let result = match outcome {
            Ok(value) => match txn.commit().await {
                Ok(()) => {
                    self.state = UnitOfWorkState::Committed;
                    counter!("storefront_db.transaction.committed", 1);
                    debug!(unit = self.label, transaction_id = %self.id, "Transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    // a failed commit leaves nothing behind on the server side
                    self.state = UnitOfWorkState::RolledBack;
                    counter!("storefront_db.transaction.commit_failed", 1);
                    error!(unit = self.label, transaction_id = %self.id, error = %e, "Commit failed");
                    Err(ServiceError::db_error(e))
                }
            },
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(
                        unit = self.label,
                        transaction_id = %self.id,
                        error = %rollback_err,
                        "Rollback failed"
                    );
                }
                self.state = UnitOfWorkState::RolledBack;
                counter!("storefront_db.transaction.rolled_back", 1);
                warn!(
                    unit = self.label,
                    transaction_id = %self.id,
                    kind = %err.kind(),
                    error = %err,
                    "Transaction rolled back"
                );
                Err(err)
            }
        };

        histogram!("storefront_db.transaction.duration", start.elapsed());
        result
    }
}

/// Opens a unit of work labelled `label`, runs `f` in it and returns its result.
pub async fn run_atomic<F, T>(
    db: &DatabaseConnection,
    label: &'static str,
    f: F,
) -> Result<T, ServiceError>
where
    F: for<'t> FnOnce(&'t DatabaseTransaction) -> BoxFuture<'t, Result<T, ServiceError>> + Send,
    T: Send,
{
    UnitOfWork::new(db, label).execute(f).await
}
