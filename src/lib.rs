//! Lading
//!
//! Lading is an incremental container packing session. Item rows can be
//! committed one at a time ahead of a final bulk solve, and any commit can be
//! undone without disturbing the others. Packing itself is delegated to an
//! external solver behind the [`solver::PackingSolver`] trait.

pub mod container;
pub mod fixtures;
pub mod ledger;
pub mod placements;
pub mod prelude;
pub mod report;
pub mod result;
pub mod rows;
pub mod session;
pub mod solver;
pub mod units;
pub mod validation;
