//! Plan fixtures

use std::fmt;

use rust_decimal::Decimal;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use tracing::info;

use crate::{
    container::ContainerSpec,
    fixtures::FixtureError,
    rows::{NewRow, RowKey, RowStore},
    session::Session,
    solver::PackingSolver,
    units::Unit,
    validation::{ValidationError, validate},
};

/// Plan file contents
#[derive(Debug, Clone, Deserialize)]
pub struct PlanFixture {
    /// Container to fill
    pub container: ContainerFixture,

    /// Demand rows, in display order
    pub rows: Vec<RowFixture>,

    /// Steps to run, in order
    #[serde(default, with = "serde_norway::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

/// Container size as entered
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerFixture {
    /// Width
    pub width: Decimal,

    /// Height
    pub height: Decimal,

    /// Depth
    pub depth: Decimal,

    /// Unit, metres when omitted
    #[serde(default)]
    pub unit: Unit,
}

impl From<&ContainerFixture> for ContainerSpec {
    fn from(fixture: &ContainerFixture) -> Self {
        ContainerSpec::from_units(fixture.width, fixture.height, fixture.depth, fixture.unit)
    }
}

/// Demand row as entered
#[derive(Debug, Clone, Deserialize)]
pub struct RowFixture {
    /// Row name, used by steps to refer to the row
    pub name: String,

    /// Width
    pub width: Decimal,

    /// Height
    pub height: Decimal,

    /// Depth
    pub depth: Decimal,

    /// Unit, metres when omitted
    #[serde(default)]
    pub unit: Unit,

    /// Item count
    pub count: u32,

    /// Display color, next palette entry when omitted
    #[serde(default)]
    pub color: Option<String>,
}

impl From<&RowFixture> for NewRow {
    fn from(fixture: &RowFixture) -> Self {
        NewRow {
            name: Some(fixture.name.clone()),
            width: fixture.width,
            height: fixture.height,
            depth: fixture.depth,
            unit: fixture.unit,
            count: fixture.count,
            color: fixture.color.clone(),
        }
    }
}

/// A session operation named in a plan
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Commit the named row
    Commit(String),

    /// Undo the named row's latest commit
    Undo(String),

    /// Remove the named row
    Remove(String),

    /// Run a bulk solve
    Solve,

    /// Drop every commit and the bulk layer
    Reset,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Commit(name) => write!(f, "commit {name}"),
            Step::Undo(name) => write!(f, "undo {name}"),
            Step::Remove(name) => write!(f, "remove {name}"),
            Step::Solve => f.write_str("solve"),
            Step::Reset => f.write_str("reset"),
        }
    }
}

impl PlanFixture {
    /// Parse a plan from YAML.
    ///
    /// # Errors
    ///
    /// Returns a [`FixtureError`] if the YAML is malformed or two rows share a
    /// name.
    pub fn from_yaml(contents: &str) -> Result<Self, FixtureError> {
        let plan: PlanFixture = serde_norway::from_str(contents)?;

        let mut seen = FxHashSet::default();

        for row in &plan.rows {
            if !seen.insert(row.name.as_str()) {
                return Err(FixtureError::DuplicateRow(row.name.clone()));
            }
        }

        Ok(plan)
    }

    /// Container in millimetres
    pub fn container(&self) -> ContainerSpec {
        ContainerSpec::from(&self.container)
    }

    /// Check the plan's container and rows without calling a solver.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut rows = RowStore::new();

        for row in &self.rows {
            rows.add(NewRow::from(row));
        }

        validate(&self.container(), &rows, 0)
    }

    /// Build a session holding the plan's container and rows.
    pub fn session<S: PackingSolver>(&self, solver: S) -> PlanSession<S> {
        let mut session = Session::new(solver, self.container());
        let mut rows = FxHashMap::default();

        for row in &self.rows {
            let key = session.add_row(NewRow::from(row));
            rows.insert(row.name.clone(), key);
        }

        PlanSession { session, rows }
    }
}

/// A session driven by plan steps, resolving rows by name
#[derive(Debug)]
pub struct PlanSession<S> {
    session: Session<S>,
    rows: FxHashMap<String, RowKey>,
}

impl<S: PackingSolver> PlanSession<S> {
    /// Underlying session
    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Key of a named row
    pub fn row(&self, name: &str) -> Option<RowKey> {
        self.rows.get(name).copied()
    }

    /// Apply one step.
    ///
    /// # Errors
    ///
    /// Returns a [`FixtureError`] if the step names an unknown row or the
    /// session refuses it. The session is unchanged on error.
    pub async fn apply(&mut self, step: &Step) -> Result<(), FixtureError> {
        match step {
            Step::Commit(name) => {
                let key = self.resolve(name)?;
                self.session.commit(key).await?;
            }
            Step::Undo(name) => {
                let key = self.resolve(name)?;
                let batch = self
                    .session
                    .ledger()
                    .for_row(key)
                    .last()
                    .map(|batch| batch.key())
                    .ok_or_else(|| FixtureError::NothingToUndo(name.clone()))?;

                self.session.undo(batch).await?;
            }
            Step::Remove(name) => {
                let key = self.resolve(name)?;
                self.session.remove_row(key).await?;
                self.rows.remove(name);
            }
            Step::Solve => {
                self.session.run_bulk_solve().await?;
            }
            Step::Reset => self.session.reset(),
        }

        info!(%step, placed = self.session.placements().len(), "applied step");

        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<RowKey, FixtureError> {
        self.row(name)
            .ok_or_else(|| FixtureError::RowNotFound(name.to_string()))
    }
}
