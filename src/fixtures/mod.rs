//! Fixtures
//!
//! YAML packing plans: a container, its demand rows and a list of session
//! steps to drive against a solver.

use std::{fs, path::Path};

use thiserror::Error;

use crate::session::SessionError;

pub mod plan;

pub use plan::{ContainerFixture, PlanFixture, PlanSession, RowFixture, Step};

/// Fixture Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Two rows share a name
    #[error("Duplicate row name: {0}")]
    DuplicateRow(String),

    /// A step names a row the plan does not define
    #[error("Row not found: {0}")]
    RowNotFound(String),

    /// An undo step names a row with no commit to undo
    #[error("Row {0} has no commit to undo")]
    NothingToUndo(String),

    /// A step failed inside the session
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Load a plan from a YAML file.
///
/// # Errors
///
/// Returns a [`FixtureError`] if the file cannot be read or parsed.
pub fn load_plan(path: impl AsRef<Path>) -> Result<PlanFixture, FixtureError> {
    let contents = fs::read_to_string(path)?;

    PlanFixture::from_yaml(&contents)
}
