//! Rows
//!
//! The row store holds the demand rows a user edits: item size, unit, count,
//! display color and the lock a commit places on the row. Rows are keyed by
//! a stable [`RowKey`]; display order is insertion order.

use rust_decimal::Decimal;
use slotmap::{Key, KeyData, SlotMap, new_key_type};
use thiserror::Error;

use crate::{
    ledger::BatchKey,
    placements::split_correlation,
    solver::DemandItem,
    units::{Unit, to_mm},
};

new_key_type! {
    /// Row Key
    pub struct RowKey;
}

/// Default colors handed to new rows, in rotation.
pub const ROW_PALETTE: [&str; 7] = [
    "#ef4444", "#22c55e", "#3b82f6", "#eab308", "#a855f7", "#f97316", "#ffffff",
];

/// Errors raised by row edits.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RowError {
    /// No row has the given key.
    #[error("row {0:?} not found")]
    UnknownRow(RowKey),

    /// The row is locked by a commit and the edit touches a read-only field.
    #[error("row {0:?} is locked by a commit")]
    RowLocked(RowKey),
}

/// Commit state of a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowLock {
    /// Nothing reserved; `count` is the full remaining demand.
    #[default]
    Unlocked,

    /// A batch reserves part of the demand; `count` is the residual.
    Locked(BatchKey),

    /// Soft-unlocked by a bulk solve. The batch's boxes stay placed and its
    /// quantity is back in `count`, but that quantity is not pending.
    Released(BatchKey),
}

impl RowLock {
    /// Whether name, size and unit edits are refused.
    pub fn is_locked(self) -> bool {
        matches!(self, RowLock::Locked(_))
    }

    /// Batch referenced by the lock, if any.
    pub fn batch(self) -> Option<BatchKey> {
        match self {
            RowLock::Unlocked => None,
            RowLock::Locked(key) | RowLock::Released(key) => Some(key),
        }
    }
}

/// A row of item demand.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandRow {
    name: String,
    width: Decimal,
    height: Decimal,
    depth: Decimal,
    unit: Unit,
    count: u32,
    color: String,
    lock: RowLock,
}

impl DemandRow {
    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size as entered, `[width, height, depth]`
    pub fn dimensions(&self) -> [Decimal; 3] {
        [self.width, self.height, self.depth]
    }

    /// Unit of the entered size
    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Size in millimetres, `[width, height, depth]`
    pub fn dimensions_mm(&self) -> [u32; 3] {
        [
            to_mm(self.width, self.unit),
            to_mm(self.height, self.unit),
            to_mm(self.depth, self.unit),
        ]
    }

    /// Remaining count. When locked this is only the unreserved residual.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Display color tag
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Commit state
    pub fn lock(&self) -> RowLock {
        self.lock
    }

    pub(crate) fn set_lock(&mut self, lock: RowLock) {
        self.lock = lock;
    }

    pub(crate) fn restore(&mut self, quantity: u32) {
        self.count = self.count.saturating_add(quantity);
    }

    pub(crate) fn reserve(&mut self, quantity: u32) {
        self.count = self.count.saturating_sub(quantity);
    }

    /// Build the solver demand for `count` items of this row.
    pub(crate) fn demand_item(&self, key: RowKey, count: u32) -> DemandItem {
        let [width, height, depth] = self.dimensions_mm();

        DemandItem {
            name: correlation_name(&self.name, key),
            width,
            height,
            depth,
            count,
        }
    }
}

/// Data for a new row. Name and color fall back to the store's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    /// Display name, `BOX-n` when omitted
    pub name: Option<String>,

    /// Width
    pub width: Decimal,

    /// Height
    pub height: Decimal,

    /// Depth
    pub depth: Decimal,

    /// Unit for width, height and depth
    pub unit: Unit,

    /// Item count
    pub count: u32,

    /// Display color, next palette entry when omitted
    pub color: Option<String>,
}

impl Default for NewRow {
    fn default() -> Self {
        Self {
            name: None,
            width: Decimal::ONE,
            height: Decimal::ONE,
            depth: Decimal::ONE,
            unit: Unit::M,
            count: 10,
            color: None,
        }
    }
}

/// A single field edit on a row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowEdit {
    /// Change the display name
    Rename(String),

    /// Change the size, in the row's unit
    Dimensions {
        /// Width
        width: Decimal,

        /// Height
        height: Decimal,

        /// Depth
        depth: Decimal,
    },

    /// Change the unit the size is entered in
    Unit(Unit),

    /// Change the remaining count
    Count(u32),

    /// Change the display color
    Color(String),
}

impl RowEdit {
    /// Whether the edit is refused on a locked row.
    pub fn is_restricted(&self) -> bool {
        matches!(
            self,
            RowEdit::Rename(_) | RowEdit::Dimensions { .. } | RowEdit::Unit(_)
        )
    }
}

/// Ordered store of demand rows.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: SlotMap<RowKey, DemandRow>,
    order: Vec<RowKey>,
    added: usize,
}

impl RowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row and return its key.
    pub fn add(&mut self, row: NewRow) -> RowKey {
        let position = self.added;
        self.added += 1;

        let name = row.name.unwrap_or_else(|| format!("BOX-{}", position + 1));
        let color = row.color.unwrap_or_else(|| {
            ROW_PALETTE
                .get(position % ROW_PALETTE.len())
                .copied()
                .unwrap_or_default()
                .to_string()
        });

        let key = self.rows.insert(DemandRow {
            name,
            width: row.width,
            height: row.height,
            depth: row.depth,
            unit: row.unit,
            count: row.count,
            color,
            lock: RowLock::Unlocked,
        });

        self.order.push(key);

        key
    }

    /// Apply an edit to a row.
    ///
    /// # Errors
    ///
    /// Returns [`RowError::UnknownRow`] for a stale key and
    /// [`RowError::RowLocked`] for a restricted edit on a locked row.
    pub fn edit(&mut self, key: RowKey, edit: RowEdit) -> Result<(), RowError> {
        let row = self.rows.get_mut(key).ok_or(RowError::UnknownRow(key))?;

        if row.lock.is_locked() && edit.is_restricted() {
            return Err(RowError::RowLocked(key));
        }

        match edit {
            RowEdit::Rename(name) => row.name = name,
            RowEdit::Dimensions {
                width,
                height,
                depth,
            } => {
                row.width = width;
                row.height = height;
                row.depth = depth;
            }
            RowEdit::Unit(unit) => row.unit = unit,
            RowEdit::Count(count) => row.count = count,
            RowEdit::Color(color) => row.color = color,
        }

        Ok(())
    }

    /// Remove a row. Callers release its batches first.
    pub(crate) fn remove(&mut self, key: RowKey) -> Option<DemandRow> {
        let row = self.rows.remove(key)?;
        self.order.retain(|&k| k != key);

        Some(row)
    }

    /// Look up a row.
    pub fn get(&self, key: RowKey) -> Option<&DemandRow> {
        self.rows.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: RowKey) -> Option<&mut DemandRow> {
        self.rows.get_mut(key)
    }

    /// Whether the key refers to a live row.
    pub fn contains(&self, key: RowKey) -> bool {
        self.rows.contains_key(key)
    }

    /// Resolve a solver item name back to the row that produced it.
    pub fn resolve(&self, correlated_name: &str) -> Option<RowKey> {
        let (_, tag) = split_correlation(correlated_name);
        let key = RowKey::from(KeyData::from_ffi(tag?));

        self.contains(key).then_some(key)
    }

    /// Rows in display order.
    pub fn iter(&self) -> impl Iterator<Item = &DemandRow> {
        self.order.iter().filter_map(|&key| self.rows.get(key))
    }

    /// Keys and rows in display order.
    pub fn entries(&self) -> impl Iterator<Item = (RowKey, &DemandRow)> {
        self.order
            .iter()
            .filter_map(|&key| self.rows.get(key).map(|row| (key, row)))
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the store has no rows.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of every row's remaining count.
    pub fn total_count(&self) -> u64 {
        self.iter().map(|row| u64::from(row.count)).sum()
    }
}

/// Solver item name for a row: display name plus a stable row tag.
pub fn correlation_name(name: &str, key: RowKey) -> String {
    format!("{name}#{}", key.data().as_ffi())
}
