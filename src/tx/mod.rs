//! Transaction management.
//!
//! Batches of iterations run inside one unit of work against the store;
//! the scheduler commits at batch end and rolls back on error.

use serde::{Deserialize, Serialize};

/// Transaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// Transaction trait that all stores must implement.
pub trait Transaction {
    fn mode(&self) -> TxMode;
    fn id(&self) -> TxId;
}
