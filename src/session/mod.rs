//! Incremental packing session
//!
//! The session coordinates a row store, a commit ledger and a bulk layer over
//! one container. Rows can be committed one at a time, which pins their
//! placements as obstacles for everything that follows; a bulk solve then
//! packs whatever demand is still pending around them. Any commit can be
//! undone; undoing anything but the latest commit replays the rest so the
//! remaining batches see the space it freed.
//!
//! Every operation takes `&mut self`, so only one can be in flight. State is
//! written only once every solver call an operation needs has answered, so a
//! failed or abandoned operation leaves the session as it was.

use std::ops::{Deref, DerefMut};

use rust_decimal::Decimal;
use smallvec::SmallVec;
use tracing::{debug, info, instrument};

use crate::{
    container::ContainerSpec,
    ledger::{CommitBatch, Ledger, pinned_count},
    placements::{PlacedBox, UnfulfilledEntry},
    result::SessionResult,
    rows::{DemandRow, NewRow, RowEdit, RowKey, RowLock, RowStore},
    solver::{DemandItem, PackingSolver, SolvePhase, SolveRequest},
    units::Unit,
    validation::{validate_container, validate_demand, validate_fit},
};

mod commit;
mod errors;
mod observer;
mod replay;

pub use errors::{ErrorClass, PendingReason, Redirect, SessionError};
pub use observer::{NoopObserver, SessionObserver};

/// An incremental packing session over one container.
#[derive(Debug)]
pub struct Session<S, O = NoopObserver> {
    solver: S,
    observer: O,
    container: ContainerSpec,
    rows: RowStore,
    ledger: Ledger,
    bulk: Vec<PlacedBox>,
    unfulfilled: Vec<UnfulfilledEntry>,
    bulk_solved: bool,
    placements: Vec<PlacedBox>,
    result: SessionResult,
}

impl<S: PackingSolver> Session<S> {
    /// Create an empty session.
    pub fn new(solver: S, container: ContainerSpec) -> Self {
        Session::with_observer(solver, container, NoopObserver)
    }
}

impl<S: PackingSolver, O: SessionObserver> Session<S, O> {
    /// Create an empty session that reports to `observer`.
    pub fn with_observer(solver: S, container: ContainerSpec, observer: O) -> Self {
        Self {
            solver,
            observer,
            container,
            rows: RowStore::new(),
            ledger: Ledger::new(),
            bulk: Vec::new(),
            unfulfilled: Vec::new(),
            bulk_solved: false,
            placements: Vec::new(),
            result: SessionResult::default(),
        }
    }

    /// Solver used by the session
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Container being filled
    pub fn container(&self) -> &ContainerSpec {
        &self.container
    }

    /// Demand rows
    pub fn rows(&self) -> &RowStore {
        &self.rows
    }

    /// Commit batches
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Unified placement set: committed layer in ledger order, then the bulk layer
    pub fn placements(&self) -> &[PlacedBox] {
        &self.placements
    }

    /// Latest derived statistics
    pub fn result(&self) -> &SessionResult {
        &self.result
    }

    /// Display color of the row that produced a placed box.
    pub fn row_color(&self, placed: &PlacedBox) -> Option<&str> {
        self.rows
            .resolve(placed.name())
            .and_then(|key| self.rows.get(key))
            .map(DemandRow::color)
    }

    /// Demand a commit or bulk solve would request for a row.
    pub fn pending_count(&self, key: RowKey) -> Option<u32> {
        self.rows
            .get(key)
            .map(|row| pending(row, key, self.ledger.iter()))
    }

    /// Add a demand row.
    #[instrument(name = "session.add_row", skip(self, row))]
    pub fn add_row(&mut self, row: NewRow) -> RowKey {
        let key = self.rows.add(row);

        self.refresh();

        key
    }

    /// Apply a single field edit to a row.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownRow`] for a stale key and
    /// [`SessionError::RowLocked`] when renaming, resizing or changing the
    /// unit of a row locked by a commit.
    #[instrument(name = "session.edit_row", skip(self), err)]
    pub fn edit_row(&mut self, key: RowKey, edit: RowEdit) -> Result<(), SessionError> {
        self.rows.edit(key, edit)?;

        self.refresh();

        Ok(())
    }

    /// Rename a row.
    ///
    /// # Errors
    ///
    /// See [`Session::edit_row`].
    pub fn rename(&mut self, key: RowKey, name: impl Into<String>) -> Result<(), SessionError> {
        self.edit_row(key, RowEdit::Rename(name.into()))
    }

    /// Change a row's size, in its current unit.
    ///
    /// # Errors
    ///
    /// See [`Session::edit_row`].
    pub fn set_dimensions(
        &mut self,
        key: RowKey,
        [width, height, depth]: [Decimal; 3],
    ) -> Result<(), SessionError> {
        self.edit_row(
            key,
            RowEdit::Dimensions {
                width,
                height,
                depth,
            },
        )
    }

    /// Change the unit a row's size is entered in.
    ///
    /// # Errors
    ///
    /// See [`Session::edit_row`].
    pub fn set_unit(&mut self, key: RowKey, unit: Unit) -> Result<(), SessionError> {
        self.edit_row(key, RowEdit::Unit(unit))
    }

    /// Change a row's remaining count.
    ///
    /// # Errors
    ///
    /// See [`Session::edit_row`].
    pub fn set_count(&mut self, key: RowKey, count: u32) -> Result<(), SessionError> {
        self.edit_row(key, RowEdit::Count(count))
    }

    /// Change a row's display color.
    ///
    /// # Errors
    ///
    /// See [`Session::edit_row`].
    pub fn set_color(&mut self, key: RowKey, color: impl Into<String>) -> Result<(), SessionError> {
        self.edit_row(key, RowEdit::Color(color.into()))
    }

    /// Replace the container.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ContainerInUse`] while any batch exists.
    #[instrument(name = "session.set_container", skip(self), err)]
    pub fn set_container(&mut self, container: ContainerSpec) -> Result<(), SessionError> {
        if !self.ledger.is_empty() {
            return Err(SessionError::ContainerInUse);
        }

        self.container = container;
        self.clear_bulk();
        self.refresh();

        Ok(())
    }

    /// Pack every row's pending demand around the committed boxes.
    ///
    /// On success the bulk layer is replaced and every locked row is
    /// released: it becomes editable again and its count once more includes
    /// the committed quantity, which stays placed and is not requested again.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if validation fails, nothing is pending or
    /// the solver call fails. The session is unchanged on error.
    #[instrument(
        name = "session.run_bulk_solve",
        skip(self),
        fields(items = tracing::field::Empty, placed = tracing::field::Empty),
        err
    )]
    pub async fn run_bulk_solve(&mut self) -> Result<SessionResult, SessionError> {
        let outcome = self.busy().bulk_solve().await;

        outcome?;

        self.refresh();

        Ok(self.result.clone())
    }

    /// Drop every batch and the bulk layer, keeping the rows.
    #[instrument(name = "session.reset", skip(self))]
    pub fn reset(&mut self) {
        for batch in self.ledger.iter() {
            if batch.is_released() {
                continue;
            }

            if let Some(row) = self.rows.get_mut(batch.row()) {
                row.restore(batch.placed_count());
            }
        }

        let keys: Vec<RowKey> = self.rows.entries().map(|(key, _)| key).collect();

        for key in keys {
            if let Some(row) = self.rows.get_mut(key) {
                row.set_lock(RowLock::Unlocked);
            }
        }

        self.ledger.clear();
        self.clear_bulk();
        self.placements.clear();
        self.result = SessionResult::default();

        self.observer.on_update(&self.placements, &self.result);
    }

    async fn bulk_solve(&mut self) -> Result<(), SessionError> {
        validate_container(&self.container)?;
        validate_demand(&self.rows, self.ledger.reserved_count())?;

        let items: SmallVec<[DemandItem; 4]> = self
            .rows
            .entries()
            .filter_map(|(key, row)| {
                let count = pending(row, key, self.ledger.iter());

                (count > 0).then(|| row.demand_item(key, count))
            })
            .collect();

        if items.is_empty() {
            let reason = if self.ledger.is_empty() {
                PendingReason::NoDemand
            } else {
                PendingReason::AllCommitted
            };

            return Err(SessionError::NothingPending(reason));
        }

        validate_fit(&self.container, &self.rows)?;

        let span = tracing::Span::current();
        span.record("items", items.len());

        let request = SolveRequest {
            container: self.container,
            items,
            obstacles: self.ledger.placements(),
            phase: SolvePhase::Auto,
        };

        let solved = self.solver.solve(&request).await?;

        span.record("placed", solved.placements.len());

        self.bulk = solved.placements;
        self.unfulfilled = solved.unfulfilled;
        self.bulk_solved = true;

        self.release_locked_rows();

        info!(
            placed = self.bulk.len(),
            unfulfilled = self.unfulfilled.len(),
            "bulk solve finished"
        );

        Ok(())
    }

    /// Hand every active reservation back to its row, keeping the boxes placed.
    fn release_locked_rows(&mut self) {
        for batch in self.ledger.iter_mut() {
            if batch.is_released() {
                continue;
            }

            batch.release();

            let Some(row) = self.rows.get_mut(batch.row()) else {
                continue;
            };

            row.restore(batch.placed_count());

            if row.lock() == RowLock::Locked(batch.key()) {
                row.set_lock(RowLock::Released(batch.key()));
            }

            debug!(batch = ?batch.key(), row = ?batch.row(), "released batch");
        }
    }

    /// Report busy until the returned guard is dropped, including when the
    /// operation's future is abandoned mid-flight.
    fn busy(&mut self) -> Busy<'_, S, O> {
        self.observer.on_busy(true);

        Busy { session: self }
    }

    /// Whether the bulk layer placed or left unfulfilled any of a row's items.
    fn bulk_mentions(&self, row: RowKey) -> bool {
        self.bulk
            .iter()
            .map(PlacedBox::name)
            .chain(self.unfulfilled.iter().map(|entry| entry.name.as_str()))
            .any(|name| self.rows.resolve(name) == Some(row))
    }

    /// Drop the bulk layer. Its boxes were packed around obstacles that no
    /// longer match the ledger.
    fn clear_bulk(&mut self) {
        self.bulk.clear();
        self.unfulfilled.clear();
        self.bulk_solved = false;
    }

    /// Rebuild the placement set and result, then notify the observer.
    fn refresh(&mut self) {
        let mut placements = self.ledger.placements();
        placements.extend(self.bulk.iter().cloned());

        self.placements = placements;
        self.result = SessionResult::derive(
            &self.container,
            &self.rows,
            &self.ledger,
            &self.placements,
            &self.unfulfilled,
            self.bulk_solved,
        );

        self.observer.on_update(&self.placements, &self.result);
    }
}

/// Demand a row can still request: nothing while locked, otherwise its count
/// minus what released batches already hold in place.
fn pending<'a>(
    row: &DemandRow,
    key: RowKey,
    batches: impl IntoIterator<Item = &'a CommitBatch>,
) -> u32 {
    if row.lock().is_locked() {
        return 0;
    }

    row.count().saturating_sub(pinned_count(batches, key))
}

/// Exclusive hold on a session for one solver-bound operation.
struct Busy<'a, S, O: SessionObserver> {
    session: &'a mut Session<S, O>,
}

impl<S, O: SessionObserver> Deref for Busy<'_, S, O> {
    type Target = Session<S, O>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl<S, O: SessionObserver> DerefMut for Busy<'_, S, O> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl<S, O: SessionObserver> Drop for Busy<'_, S, O> {
    fn drop(&mut self) {
        self.session.observer.on_busy(false);
    }
}
