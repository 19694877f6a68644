//! Importing transactions from uploaded CSV files.

mod parse;
mod upload_endpoint;

pub use upload_endpoint::import_transactions_endpoint;
