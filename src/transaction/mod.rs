//! Transaction management for the expense tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and its database functions
//! - The request bodies for creating and editing transactions
//! - The route handlers for the transaction endpoints

mod core;
mod endpoints;
mod request;

pub use core::{
    NewTransaction, Transaction, TransactionType, count_transactions, create_transaction_table,
    create_transactions, sum_expenses,
};
pub use endpoints::{
    create_transaction_endpoint, delete_all_transactions_endpoint, delete_transaction_endpoint,
    get_transaction_endpoint, list_transactions_endpoint, update_transaction_endpoint,
};

#[cfg(test)]
pub use core::{create_transaction, get_transactions};
