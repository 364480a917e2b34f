//! Transaction management for the finance tracker.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the input types for creating and editing transactions
//! - Database queries for reading transactions
//! - The ledger functions that change transactions together with their owner's balance
//! - Route handlers for the transaction API

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod ledger;
mod view;

pub use core::{
    NewTransaction, Transaction, TransactionChanges, TransactionType, create_transaction_table,
    get_transaction, get_transactions, get_transactions_by_category,
};
pub use create_endpoint::create_transaction_endpoint;
pub use delete_endpoint::{delete_all_transactions_endpoint, delete_transaction_endpoint};
pub use edit_endpoint::edit_transaction_endpoint;
pub use ledger::{
    create_transaction, delete_all_transactions, delete_transaction, update_transaction,
};
pub use view::{get_transaction_endpoint, get_transactions_endpoint};

pub(crate) use ledger::clear_ledger;
