use thiserror::Error;

use crate::store::StoreError;

/// Typed failures surfaced by the booking and cancellation coordinators.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed coordinates or fields. Rejected before matching, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No vehicle can take the request at all.
    #[error("no vehicle available for this request")]
    NoCapacity,

    /// Optimistic write contention that outlasted the retry budget.
    #[error("lost the write race after {attempts} attempt(s)")]
    Conflict { attempts: u32 },

    /// Referenced trip, request or passenger is absent.
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a caller should react to a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The same request may succeed later.
    TryAgain,
    /// The request itself is wrong; retrying will not help.
    Client,
}

impl DispatchError {
    pub fn class(&self) -> ErrorClass {
        match self {
            DispatchError::NoCapacity
            | DispatchError::Conflict { .. }
            | DispatchError::Store(_) => {
                ErrorClass::TryAgain
            }
            DispatchError::InvalidInput(_) | DispatchError::NotFound(_) => ErrorClass::Client,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::TryAgain
    }
}
