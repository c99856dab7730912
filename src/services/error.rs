//! Error taxonomy surfaced by the occupancy operations

use crate::io::ledger_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum OccupancyError {
    /// Ledger unreadable or unwritable. Not retried.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Request rejected before any mutation
    #[error("{0}")]
    Validation(String),
}

impl OccupancyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        OccupancyError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OccupancyError::Validation(_))
    }
}
