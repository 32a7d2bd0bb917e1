//! Lading prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    container::ContainerSpec,
    fixtures::{FixtureError, PlanFixture, PlanSession, Step, load_plan},
    ledger::{BatchKey, CommitBatch, Ledger},
    placements::{Origin, PlacedBox, UnfulfilledEntry},
    report::ReportError,
    result::SessionResult,
    rows::{DemandRow, NewRow, RowEdit, RowError, RowKey, RowLock, RowStore},
    session::{
        ErrorClass, NoopObserver, PendingReason, Redirect, Session, SessionError,
        SessionObserver,
    },
    solver::{
        DemandItem, PackingSolver, PlacementResult, SolveError, SolvePhase, SolveRequest,
        grid::GridSolver,
    },
    units::{Unit, UnitError},
    validation::{ValidationError, validate, validate_container},
};
