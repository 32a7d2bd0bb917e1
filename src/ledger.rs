//! Commit Batch Ledger
//!
//! Ordered record of commits. Each batch remembers the row that produced it,
//! the exact demand that was sent and the boxes the solver placed. Batches
//! keep their commit order for their whole life; removal takes out exactly
//! one batch and never reorders the rest.

use slotmap::{SlotMap, new_key_type};

use crate::{placements::PlacedBox, rows::RowKey, solver::DemandItem};

new_key_type! {
    /// Batch Key
    pub struct BatchKey;
}

/// The result of committing one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBatch {
    key: BatchKey,
    row: RowKey,
    requested: DemandItem,
    placements: Vec<PlacedBox>,
    released: bool,
}

impl CommitBatch {
    /// Batch key
    pub fn key(&self) -> BatchKey {
        self.key
    }

    /// Row that produced the batch
    pub fn row(&self) -> RowKey {
        self.row
    }

    /// Demand sent to the solver when the batch was last computed
    pub fn requested(&self) -> &DemandItem {
        &self.requested
    }

    /// Boxes placed for the batch, in solver order
    pub fn placements(&self) -> &[PlacedBox] {
        &self.placements
    }

    /// Number of boxes placed
    pub fn placed_count(&self) -> u32 {
        u32::try_from(self.placements.len()).unwrap_or(u32::MAX)
    }

    /// Whether a bulk solve has handed the reserved quantity back to the row
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub(crate) fn release(&mut self) {
        self.released = true;
    }

    /// Overwrite the batch with a recomputed answer.
    pub(crate) fn recompute(&mut self, requested: DemandItem, placements: Vec<PlacedBox>) {
        self.requested = requested;
        self.placements = placements;
    }
}

/// Ordered list of commit batches.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    keys: SlotMap<BatchKey, ()>,
    batches: Vec<CommitBatch>,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch and return its key.
    pub(crate) fn append(
        &mut self,
        row: RowKey,
        requested: DemandItem,
        placements: Vec<PlacedBox>,
    ) -> BatchKey {
        let key = self.keys.insert(());

        self.batches.push(CommitBatch {
            key,
            row,
            requested,
            placements,
            released: false,
        });

        key
    }

    /// Remove one batch, returning its former position and the batch.
    pub(crate) fn remove(&mut self, key: BatchKey) -> Option<(usize, CommitBatch)> {
        let index = self.position(key)?;
        self.keys.remove(key);

        Some((index, self.batches.remove(index)))
    }

    /// Take every batch out for recomputation. Keys stay reserved.
    pub(crate) fn take_batches(&mut self) -> Vec<CommitBatch> {
        std::mem::take(&mut self.batches)
    }

    /// Put recomputed batches back. Keys missing from `batches` are retired.
    pub(crate) fn restore_batches(&mut self, batches: Vec<CommitBatch>) {
        self.keys
            .retain(|key, ()| batches.iter().any(|batch| batch.key == key));
        self.batches = batches;
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut CommitBatch> {
        self.batches.iter_mut()
    }

    /// Drop every batch.
    pub(crate) fn clear(&mut self) {
        self.keys.clear();
        self.batches.clear();
    }

    /// Look up a batch.
    pub fn get(&self, key: BatchKey) -> Option<&CommitBatch> {
        self.batches.iter().find(|batch| batch.key == key)
    }

    /// Position of a batch in commit order.
    pub fn position(&self, key: BatchKey) -> Option<usize> {
        if !self.keys.contains_key(key) {
            return None;
        }

        self.batches.iter().position(|batch| batch.key == key)
    }

    /// Whether every given key sits at the end of the ledger, so removing them
    /// leaves no later batch that was computed against their boxes.
    pub fn is_tail(&self, keys: &[BatchKey]) -> bool {
        let cutoff = self.batches.len().saturating_sub(keys.len());

        keys.iter()
            .all(|&key| self.position(key).is_some_and(|index| index >= cutoff))
    }

    /// Batches in commit order.
    pub fn iter(&self) -> impl Iterator<Item = &CommitBatch> {
        self.batches.iter()
    }

    /// Batches produced by one row, in commit order.
    pub fn for_row(&self, row: RowKey) -> impl Iterator<Item = &CommitBatch> {
        self.batches.iter().filter(move |batch| batch.row == row)
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Every placed box, flattened in commit order.
    pub fn placements(&self) -> Vec<PlacedBox> {
        flatten(&self.batches)
    }

    /// Total placed by batches still holding a reservation on their row.
    pub fn reserved_count(&self) -> u64 {
        self.batches
            .iter()
            .filter(|batch| !batch.released)
            .map(|batch| u64::from(batch.placed_count()))
            .sum()
    }
}

/// Flatten the placements of a run of batches, keeping their order.
fn flatten(batches: &[CommitBatch]) -> Vec<PlacedBox> {
    batches
        .iter()
        .flat_map(|batch| batch.placements.iter().cloned())
        .collect()
}

/// Boxes pinned for a row by released batches, which its count already includes.
pub(crate) fn pinned_count<'a>(
    batches: impl IntoIterator<Item = &'a CommitBatch>,
    row: RowKey,
) -> u32 {
    batches
        .into_iter()
        .filter(|batch| batch.row == row && batch.released)
        .fold(0_u32, |total, batch| total.saturating_add(batch.placed_count()))
}
