//! Transactions over the element store.
//!
//! Structural operations (create, erase) performed through a transaction take
//! effect immediately and are only recorded. Subtype, access and content
//! changes are staged in the buffer and written by [`Transaction::commit`]
//! under the monitors of every staged address.

/// Staging lists.
pub mod buffer;
/// Ids, state machine and commit.
pub mod manager;

pub use buffer::{ElementSnapshot, TransactionBuffer};
pub use manager::{Transaction, TransactionManager, TransactionState};
