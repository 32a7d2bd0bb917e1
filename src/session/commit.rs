//! Commit, undo and row removal

use smallvec::smallvec;
use tracing::{debug, instrument, warn};

use crate::{
    container::ContainerSpec,
    ledger::{BatchKey, Ledger},
    placements::PlacedBox,
    rows::{RowKey, RowLock, RowStore},
    solver::{DemandItem, PackingSolver, SolveError, SolvePhase, SolveRequest},
    validation::{ValidationError, validate_container, validate_demand},
};

use super::{Session, SessionError, SessionObserver, pending, replay::replay};

impl<S: PackingSolver, O: SessionObserver> Session<S, O> {
    /// Pin the pending demand of one row ahead of the bulk solve.
    ///
    /// The row's items are placed around every committed box, the row is
    /// locked to the new batch and its count drops by the number placed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NothingToCommit`] when the row has no pending
    /// demand, [`SessionError::NoSpaceAvailable`] when the solver placed
    /// nothing, or the validation or solver error that stopped the commit.
    /// The session is unchanged on error.
    #[instrument(name = "session.commit", skip(self), err)]
    pub async fn commit(&mut self, row: RowKey) -> Result<BatchKey, SessionError> {
        let outcome = self.busy().commit_row(row).await;

        let batch = outcome?;

        self.refresh();

        Ok(batch)
    }

    /// Undo one commit.
    ///
    /// The batch's quantity goes back to its row and the row is unlocked.
    /// Undoing the latest batch needs no solver call; undoing an earlier one
    /// replays every later batch against the freed space.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownBatch`] for a stale key, or the solver
    /// error that stopped the replay. The session is unchanged on error.
    #[instrument(name = "session.undo", skip(self), err)]
    pub async fn undo(&mut self, batch: BatchKey) -> Result<(), SessionError> {
        if self.ledger.position(batch).is_none() {
            return Err(SessionError::UnknownBatch(batch));
        }

        let outcome = self.busy().withdraw(&[batch], None).await;

        outcome?;

        self.refresh();

        Ok(())
    }

    /// Remove a row, undoing every batch it owns first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownRow`] for a stale key, or the solver
    /// error that stopped the replay. The session is unchanged on error.
    #[instrument(name = "session.remove_row", skip(self), err)]
    pub async fn remove_row(&mut self, row: RowKey) -> Result<(), SessionError> {
        if !self.rows.contains(row) {
            return Err(SessionError::UnknownRow(row));
        }

        let batches: Vec<BatchKey> = self.ledger.for_row(row).map(|batch| batch.key()).collect();

        let outcome = self.busy().withdraw(&batches, Some(row)).await;

        outcome?;

        self.refresh();

        Ok(())
    }

    async fn commit_row(&mut self, key: RowKey) -> Result<BatchKey, SessionError> {
        let row = self.rows.get(key).ok_or(SessionError::UnknownRow(key))?;

        let count = pending(row, key, self.ledger.iter());

        if count == 0 {
            return Err(SessionError::NothingToCommit(key));
        }

        validate_container(&self.container)?;
        validate_demand(&self.rows, self.ledger.reserved_count())?;

        if !self.container.fits(row.dimensions_mm()) {
            return Err(ValidationError::RowDoesNotFit {
                name: row.name().to_string(),
            }
            .into());
        }

        let item = row.demand_item(key, count);
        let placements =
            place(&self.solver, self.container, &item, self.ledger.placements()).await?;

        if placements.is_empty() {
            return Err(SessionError::NoSpaceAvailable(key));
        }

        let placed = u32::try_from(placements.len()).unwrap_or(u32::MAX);
        let batch = self.ledger.append(key, item, placements);

        if let Some(row) = self.rows.get_mut(key) {
            row.reserve(placed);
            row.set_lock(RowLock::Locked(batch));
        }

        self.clear_bulk();

        debug!(?batch, requested = count, placed, "committed row");

        Ok(batch)
    }

    /// Take batches out of the ledger, optionally removing a row with them.
    ///
    /// When every batch sits at the tail nothing later depends on them and
    /// they are simply dropped. Otherwise the remaining batches are replayed
    /// on copies of the rows and ledger, which replace the originals only once
    /// every solver call has succeeded. The bulk layer is dropped when a batch
    /// goes or when it holds items of the removed row.
    async fn withdraw(
        &mut self,
        batches: &[BatchKey],
        remove: Option<RowKey>,
    ) -> Result<(), SessionError> {
        let stale_bulk =
            !batches.is_empty() || remove.is_some_and(|row| self.bulk_mentions(row));

        if self.ledger.is_tail(batches) {
            release(&mut self.rows, &mut self.ledger, batches);

            if let Some(row) = remove {
                self.rows.remove(row);
            }
        } else {
            let mut rows = self.rows.clone();
            let mut ledger = self.ledger.clone();

            release(&mut rows, &mut ledger, batches);

            if let Some(row) = remove {
                rows.remove(row);
            }

            replay(&self.solver, self.container, &mut rows, &mut ledger).await?;

            self.rows = rows;
            self.ledger = ledger;
        }

        if stale_bulk {
            self.clear_bulk();
        }

        Ok(())
    }
}

/// Remove batches from the ledger and give their quantity back to their rows.
fn release(rows: &mut RowStore, ledger: &mut Ledger, batches: &[BatchKey]) {
    for &key in batches {
        let Some((_, batch)) = ledger.remove(key) else {
            continue;
        };

        let Some(row) = rows.get_mut(batch.row()) else {
            continue;
        };

        if !batch.is_released() {
            row.restore(batch.placed_count());
        }

        if row.lock().batch() == Some(key) {
            row.set_lock(RowLock::Unlocked);
        }
    }
}

/// Ask the solver to place one row's items around `obstacles`.
///
/// Placements beyond the requested count are dropped.
pub(super) async fn place<S: PackingSolver>(
    solver: &S,
    container: ContainerSpec,
    item: &DemandItem,
    obstacles: Vec<PlacedBox>,
) -> Result<Vec<PlacedBox>, SolveError> {
    let request = SolveRequest {
        container,
        items: smallvec![item.clone()],
        obstacles,
        phase: SolvePhase::Prefill,
    };

    let mut placements = solver.solve(&request).await?.placements;
    let requested = usize::try_from(item.count).unwrap_or(usize::MAX);

    if placements.len() > requested {
        warn!(
            item = %item.name,
            requested,
            returned = placements.len(),
            "solver returned more placements than requested"
        );

        placements.truncate(requested);
    }

    Ok(placements)
}
