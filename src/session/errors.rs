//! Session errors

use std::fmt;

use thiserror::Error;

use crate::{
    ledger::BatchKey,
    rows::{RowError, RowKey},
    solver::SolveError,
    validation::ValidationError,
};

/// Why a bulk solve found nothing to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    /// Every row's demand is already pinned by a commit.
    AllCommitted,

    /// No row has any demand.
    NoDemand,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PendingReason::AllCommitted => "every item is already committed",
            PendingReason::NoDemand => "no items to pack",
        })
    }
}

/// Errors returned by session operations. None of them change session state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The row has no pending demand.
    #[error("row {0:?} has nothing left to commit")]
    NothingToCommit(RowKey),

    /// The solver placed none of the row's items.
    #[error("no space left in the container for row {0:?}")]
    NoSpaceAvailable(RowKey),

    /// No batch has the given key.
    #[error("batch {0:?} not found")]
    UnknownBatch(BatchKey),

    /// No row has the given key.
    #[error("row {0:?} not found")]
    UnknownRow(RowKey),

    /// The row is locked by a commit.
    #[error("row {0:?} is locked by a commit")]
    RowLocked(RowKey),

    /// There is nothing for a bulk solve to place.
    #[error("{0}")]
    NothingPending(PendingReason),

    /// The container cannot change while batches were computed against it.
    #[error("undo or reset every commit before changing the container")]
    ContainerInUse,

    /// Input problem.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Solver failure.
    #[error(transparent)]
    Solver(#[from] SolveError),
}

impl From<RowError> for SessionError {
    fn from(error: RowError) -> Self {
        match error {
            RowError::UnknownRow(key) => SessionError::UnknownRow(key),
            RowError::RowLocked(key) => SessionError::RowLocked(key),
        }
    }
}

/// Broad error category, used to pick how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Input the user can correct
    Validation,

    /// Transient session message
    Session,

    /// Needs the user to go elsewhere first
    Boundary,

    /// The solver could not answer
    Transport,
}

/// Where a boundary error sends the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    /// Sign-in page
    Login,

    /// Plan upgrade page
    Upgrade,
}

impl SessionError {
    /// Category of the error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::Validation(_) => ErrorClass::Validation,
            SessionError::Solver(SolveError::Unauthenticated | SolveError::QuotaExceeded) => {
                ErrorClass::Boundary
            }
            SessionError::Solver(SolveError::Rejected { .. } | SolveError::Unreachable { .. }) => {
                ErrorClass::Transport
            }
            SessionError::NothingToCommit(_)
            | SessionError::NoSpaceAvailable(_)
            | SessionError::UnknownBatch(_)
            | SessionError::UnknownRow(_)
            | SessionError::RowLocked(_)
            | SessionError::NothingPending(_)
            | SessionError::ContainerInUse => ErrorClass::Session,
        }
    }

    /// Page the user should be sent to, for boundary errors.
    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            SessionError::Solver(SolveError::Unauthenticated) => Some(Redirect::Login),
            SessionError::Solver(SolveError::QuotaExceeded) => Some(Redirect::Upgrade),
            _ => None,
        }
    }
}
