//! Ledger replay

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::{
    container::ContainerSpec,
    ledger::{Ledger, pinned_count},
    placements::PlacedBox,
    rows::{RowLock, RowStore},
    solver::PackingSolver,
};

use super::{SessionError, commit::place};

/// Recompute every batch from an empty container, in commit order.
///
/// Each active batch gives its quantity back to its row and re-requests the
/// row's pending demand; a released batch re-requests only the quantity it
/// already held. Earlier batches' new placements are the obstacles for later
/// ones. A batch that places nothing is dropped and its row unlocked.
///
/// Solver calls run one at a time. On error `rows` and `ledger` are left half
/// written, so callers replay on copies.
pub(super) async fn replay<S: PackingSolver>(
    solver: &S,
    container: ContainerSpec,
    rows: &mut RowStore,
    ledger: &mut Ledger,
) -> Result<(), SessionError> {
    let mut queue: VecDeque<_> = ledger.take_batches().into();
    let mut kept = Vec::with_capacity(queue.len());
    let mut obstacles: Vec<PlacedBox> = Vec::new();

    while let Some(mut batch) = queue.pop_front() {
        let key = batch.row();

        let Some(row) = rows.get_mut(key) else {
            warn!(batch = ?batch.key(), row = ?key, "dropping batch for missing row");
            continue;
        };

        let item = if batch.is_released() {
            let mut item = batch.requested().clone();
            item.count = batch.placed_count();
            item
        } else {
            row.restore(batch.placed_count());

            let pinned = pinned_count(kept.iter().chain(queue.iter()), key);
            row.demand_item(key, row.count().saturating_sub(pinned))
        };

        let placements = if item.count == 0 {
            Vec::new()
        } else {
            place(solver, container, &item, obstacles.clone()).await?
        };

        let Some(row) = rows.get_mut(key) else {
            continue;
        };

        if placements.is_empty() {
            if row.lock().batch() == Some(batch.key()) {
                row.set_lock(RowLock::Unlocked);
            }

            debug!(batch = ?batch.key(), "replayed batch placed nothing, dropping it");
            continue;
        }

        obstacles.extend(placements.iter().cloned());
        batch.recompute(item, placements);

        if !batch.is_released() {
            row.reserve(batch.placed_count());
            row.set_lock(RowLock::Locked(batch.key()));
        }

        kept.push(batch);
    }

    ledger.restore_batches(kept);

    Ok(())
}
