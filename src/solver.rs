//! Solver boundary
//!
//! The packing heuristic runs elsewhere. The session only needs a stateless
//! call that takes a container, a demand list and the boxes already placed,
//! and answers with best-effort placements plus whatever did not fit.

use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    container::ContainerSpec,
    placements::{Origin, PlacedBox, UnfulfilledEntry},
};

pub mod grid;

/// One line of demand sent to the solver, in millimetres.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemandItem {
    /// Item name carrying the row-correlation suffix
    pub name: String,

    /// Width
    pub width: u32,

    /// Height
    pub height: u32,

    /// Depth
    pub depth: u32,

    /// Number of items requested
    pub count: u32,
}

impl DemandItem {
    /// Size as `[width, height, depth]`.
    pub fn dimensions(&self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }
}

/// Placement strategy hint passed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolvePhase {
    /// Commit requests: lay items flat, lowest height first.
    Prefill,

    /// Bulk requests: largest volume first.
    Auto,
}

impl SolvePhase {
    /// Layer tag given to boxes produced in this phase.
    pub fn origin(self) -> Origin {
        match self {
            SolvePhase::Prefill => Origin::Committed,
            SolvePhase::Auto => Origin::Bulk,
        }
    }

    /// Wire name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            SolvePhase::Prefill => "prefill",
            SolvePhase::Auto => "auto",
        }
    }
}

/// A single solver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveRequest {
    /// Container to fill
    pub container: ContainerSpec,

    /// Demand, never empty and every count positive
    pub items: SmallVec<[DemandItem; 4]>,

    /// Boxes already placed, treated as occupied space
    pub obstacles: Vec<PlacedBox>,

    /// Strategy hint
    pub phase: SolvePhase,
}

/// Solver answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementResult {
    /// Boxes placed, in solver order
    pub placements: Vec<PlacedBox>,

    /// Demand left over, one entry per item with a shortfall
    pub unfulfilled: Vec<UnfulfilledEntry>,
}

/// Solver failures. None of them leave partial session state behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SolveError {
    /// The caller is not signed in.
    #[error("not signed in")]
    Unauthenticated,

    /// The caller has run out of solver quota.
    #[error("solver quota exhausted")]
    QuotaExceeded,

    /// The solver refused the request.
    #[error("solver rejected the request: {detail}")]
    Rejected {
        /// Message from the solver
        detail: String,
    },

    /// The solver could not be reached or answered with something unusable.
    #[error("solver unreachable: {detail}")]
    Unreachable {
        /// Transport diagnostic
        detail: String,
    },
}

/// A packing solver.
pub trait PackingSolver {
    /// Place as much of the requested demand as possible around the obstacles.
    ///
    /// # Errors
    ///
    /// Returns a [`SolveError`] if the request could not be answered.
    async fn solve(&self, request: &SolveRequest) -> Result<PlacementResult, SolveError>;
}

impl<S: PackingSolver + ?Sized> PackingSolver for &S {
    async fn solve(&self, request: &SolveRequest) -> Result<PlacementResult, SolveError> {
        (**self).solve(request).await
    }
}
