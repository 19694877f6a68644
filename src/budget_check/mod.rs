//! Checks new expenses against the user's budgets in the background.
//!
//! Request handlers push a [BudgetCheck] onto a bounded [BudgetCheckQueue] and
//! respond straight away. A [BudgetCheckWorker] started by the server reads
//! the queue, evaluates each check and sends a push notification when a
//! category goes over its monthly limit. Nothing on this path is reported back
//! to the client, every outcome and error is logged instead.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

use crate::{
    Error, UserID,
    database_id::TransactionId,
    notification::{NotificationDispatcher, PushTransport},
    transaction::{Transaction, TransactionType},
};

mod evaluator;

pub use evaluator::{BudgetCheckOutcome, evaluate_budget, over_budget_payload};

/// How many checks can wait in the queue before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// The details of a stored transaction needed to check it against a budget.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetCheck {
    /// The transaction that triggered the check.
    pub transaction_id: TransactionId,
    /// The owner of the transaction.
    pub user_id: UserID,
    /// Whether the transaction was income or an expense.
    pub kind: TransactionType,
    /// The transaction's category.
    pub category: String,
    /// When the transaction happened.
    pub date: OffsetDateTime,
}

impl From<&Transaction> for BudgetCheck {
    fn from(transaction: &Transaction) -> Self {
        Self {
            transaction_id: transaction.id,
            user_id: transaction.user_id,
            kind: transaction.kind,
            category: transaction.category.clone(),
            date: transaction.date,
        }
    }
}

/// The sending half of the budget check queue.
#[derive(Debug, Clone)]
pub struct BudgetCheckQueue {
    sender: Sender<BudgetCheck>,
}

impl BudgetCheckQueue {
    /// Queue `check` without waiting.
    ///
    /// If the queue is full or the worker has stopped, the check is dropped and logged.
    pub fn enqueue(&self, check: BudgetCheck) {
        match self.sender.try_send(check) {
            Ok(()) => {}
            Err(TrySendError::Full(check)) => {
                tracing::warn!(
                    "Budget check queue is full, dropping check for transaction {}",
                    check.transaction_id
                );
            }
            Err(TrySendError::Closed(check)) => {
                tracing::error!(
                    "Budget check worker has stopped, dropping check for transaction {}",
                    check.transaction_id
                );
            }
        }
    }
}

/// Create a budget check queue that holds up to `capacity` pending checks.
pub fn budget_check_queue(capacity: usize) -> (BudgetCheckQueue, Receiver<BudgetCheck>) {
    let (sender, receiver) = mpsc::channel(capacity);

    (BudgetCheckQueue { sender }, receiver)
}

/// Reads budget checks off the queue and notifies users who go over budget.
pub struct BudgetCheckWorker<T> {
    db_connection: Arc<Mutex<Connection>>,
    dispatcher: NotificationDispatcher<T>,
    local_timezone: String,
}

impl<T> Clone for BudgetCheckWorker<T> {
    fn clone(&self) -> Self {
        Self {
            db_connection: self.db_connection.clone(),
            dispatcher: self.dispatcher.clone(),
            local_timezone: self.local_timezone.clone(),
        }
    }
}

impl<T: PushTransport + 'static> BudgetCheckWorker<T> {
    /// Create a worker.
    ///
    /// `local_timezone` should be a valid, canonical timezone name, e.g.
    /// "Pacific/Auckland". It decides which calendar month a transaction
    /// falls in.
    pub fn new(
        db_connection: Arc<Mutex<Connection>>,
        dispatcher: NotificationDispatcher<T>,
        local_timezone: &str,
    ) -> Self {
        Self {
            db_connection,
            dispatcher,
            local_timezone: local_timezone.to_owned(),
        }
    }

    /// Process checks until every [BudgetCheckQueue] has been dropped.
    ///
    /// Checks are handled one at a time, each in its own task so that a panic
    /// only loses that check.
    pub async fn run(self, mut receiver: Receiver<BudgetCheck>) {
        tracing::info!("Budget check worker started");

        while let Some(check) = receiver.recv().await {
            let transaction_id = check.transaction_id;
            let worker = self.clone();
            let task = tokio::spawn(async move { worker.process(check).await });

            match task.await {
                Ok(Ok(_)) => {}
                Ok(Err(error)) => {
                    tracing::error!("Budget check for transaction {transaction_id} failed: {error}");
                }
                Err(error) => {
                    tracing::error!(
                        "Budget check for transaction {transaction_id} panicked: {error}"
                    );
                }
            }
        }

        tracing::info!("Budget check queue closed, stopping worker");
    }

    /// Evaluate `check` and send an over-budget notification if needed.
    ///
    /// # Errors
    /// Returns an error if the budget could not be evaluated. Notification
    /// failures are logged by the dispatcher and never returned.
    pub async fn process(&self, check: BudgetCheck) -> Result<BudgetCheckOutcome, Error> {
        let outcome = {
            let connection = self
                .db_connection
                .lock()
                .map_err(|_| Error::DatabaseLockError)?;

            evaluate_budget(&check, &self.local_timezone, &connection)?
        };

        match outcome {
            BudgetCheckOutcome::Exceeded { total, limit } => {
                tracing::info!(
                    "User {} is over budget for {}: spent {total} of {limit}",
                    check.user_id,
                    check.category
                );

                let payload = over_budget_payload(&check.category, total, limit);
                let summary = self.dispatcher.send_to_user(check.user_id, &payload).await;

                tracing::info!(
                    "Over budget notification for user {}: {} delivered, {} pruned, {} failed",
                    check.user_id,
                    summary.delivered,
                    summary.pruned,
                    summary.failed
                );
            }
            other => {
                tracing::debug!(
                    "Budget check for transaction {}: {other:?}",
                    check.transaction_id
                );
            }
        }

        Ok(outcome)
    }
}
