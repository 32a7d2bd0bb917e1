//! Validation
//!
//! User-correctable input problems caught before any request reaches the
//! solver.

use thiserror::Error;

use crate::{container::ContainerSpec, rows::RowStore};

/// Longest container side the solver accepts, in millimetres.
pub const MAX_CONTAINER_DIMENSION_MM: u32 = 20_000;

/// Largest total item count a session may request.
pub const MAX_TOTAL_DEMAND: u64 = 5_000;

/// Input problems the user can fix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A container side exceeds [`MAX_CONTAINER_DIMENSION_MM`].
    #[error(
        "container side of {dimension_mm}mm exceeds the {limit}mm limit",
        limit = MAX_CONTAINER_DIMENSION_MM
    )]
    ContainerTooLarge {
        /// The offending side length
        dimension_mm: u32,
    },

    /// A container side is zero.
    #[error("container dimensions must all be positive")]
    ContainerEmpty,

    /// The session has no rows.
    #[error("add at least one item row")]
    NoRows,

    /// The rows request more than [`MAX_TOTAL_DEMAND`] items in total.
    #[error("total item count {total} exceeds the limit of {limit}", limit = MAX_TOTAL_DEMAND)]
    DemandTooHigh {
        /// Requested total
        total: u64,
    },

    /// No row with a positive count fits in the container in any orientation.
    #[error("no item fits inside the container")]
    NothingFits,

    /// A specific row cannot fit in the container in any orientation.
    #[error("item {name} does not fit inside the container")]
    RowDoesNotFit {
        /// Display name of the row
        name: String,
    },
}

/// Check the container on its own.
///
/// # Errors
///
/// Returns a [`ValidationError`] when a side is zero or too long.
pub fn validate_container(container: &ContainerSpec) -> Result<(), ValidationError> {
    let longest = container.max_dimension();

    if longest > MAX_CONTAINER_DIMENSION_MM {
        return Err(ValidationError::ContainerTooLarge {
            dimension_mm: longest,
        });
    }

    if container.dimensions().contains(&0) {
        return Err(ValidationError::ContainerEmpty);
    }

    Ok(())
}

/// Check that there is demand at all and that it stays under the cap.
///
/// `reserved` is the quantity held by active commit batches, which no longer
/// shows in any row's count but still counts toward the total.
///
/// # Errors
///
/// Returns [`ValidationError::NoRows`] or [`ValidationError::DemandTooHigh`].
pub fn validate_demand(rows: &RowStore, reserved: u64) -> Result<(), ValidationError> {
    if rows.is_empty() {
        return Err(ValidationError::NoRows);
    }

    let total = rows.total_count().saturating_add(reserved);

    if total > MAX_TOTAL_DEMAND {
        return Err(ValidationError::DemandTooHigh { total });
    }

    Ok(())
}

/// Check that at least one row with a positive count fits the container in
/// some orientation.
///
/// # Errors
///
/// Returns [`ValidationError::NothingFits`] otherwise.
pub fn validate_fit(container: &ContainerSpec, rows: &RowStore) -> Result<(), ValidationError> {
    let any_fits = rows
        .iter()
        .any(|row| row.count() > 0 && container.fits(row.dimensions_mm()));

    if any_fits {
        Ok(())
    } else {
        Err(ValidationError::NothingFits)
    }
}

/// Check a container and its demand rows before a bulk solve.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, checking the container,
/// then the presence of rows, then the total count including `reserved`,
/// then that at least one row with a positive count fits.
pub fn validate(
    container: &ContainerSpec,
    rows: &RowStore,
    reserved: u64,
) -> Result<(), ValidationError> {
    validate_container(container)?;
    validate_demand(rows, reserved)?;
    validate_fit(container, rows)
}
