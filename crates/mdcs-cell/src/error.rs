//! Error types for the cell layer.

use crate::cell::CellName;
use mdcs_counter::ContextError;
use thiserror::Error;

/// Errors that can occur while reconciling or decoding cells.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Reconcile was asked to merge two different cells.
    #[error("Cannot reconcile cell {left:?} with cell {right:?}")]
    NameMismatch { left: CellName, right: CellName },

    #[error("Malformed cell: {0}")]
    MalformedCell(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, CellError>;
