//! Placements

use serde::{Deserialize, Serialize};

/// Which layer of the session produced a placed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Pinned ahead of the bulk solve by a commit batch
    Committed,

    /// Produced by the bulk solve
    Bulk,
}

/// A box placed inside the container. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacedBox {
    name: String,
    position: [u32; 3],
    dimensions: [u32; 3],
    origin: Origin,
}

impl PlacedBox {
    /// Create a placed box. `name` carries the row-correlation suffix.
    pub fn new(
        name: impl Into<String>,
        position: [u32; 3],
        dimensions: [u32; 3],
        origin: Origin,
    ) -> Self {
        Self {
            name: name.into(),
            position,
            dimensions,
            origin,
        }
    }

    /// Solver item name, including the row-correlation suffix
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without the row-correlation suffix
    pub fn display_name(&self) -> &str {
        split_correlation(&self.name).0
    }

    /// Minimum corner `[x, y, z]` in millimetres, `y` pointing up
    pub fn position(&self) -> [u32; 3] {
        self.position
    }

    /// Size `[w, h, d]` in millimetres as placed (after any rotation)
    pub fn dimensions(&self) -> [u32; 3] {
        self.dimensions
    }

    /// Layer that produced the box
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Volume in cubic millimetres, saturating at `u64::MAX`
    pub fn volume(&self) -> u64 {
        self.dimensions
            .iter()
            .fold(1_u64, |volume, &side| volume.saturating_mul(u64::from(side)))
    }

    /// Whether the two boxes share interior space.
    pub fn overlaps(&self, other: &PlacedBox) -> bool {
        self.position
            .iter()
            .zip(self.dimensions)
            .zip(other.position.iter().zip(other.dimensions))
            .all(|((&a, a_len), (&b, b_len))| {
                u64::from(a) < u64::from(b) + u64::from(b_len)
                    && u64::from(b) < u64::from(a) + u64::from(a_len)
            })
    }
}

/// Demand a bulk solve could not place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfulfilledEntry {
    /// Solver item name, including the row-correlation suffix
    pub name: String,

    /// Count requested for the item
    pub requested_total: u32,

    /// Count left unplaced
    pub leftover_count: u32,
}

impl UnfulfilledEntry {
    /// Name without the row-correlation suffix
    pub fn display_name(&self) -> &str {
        split_correlation(&self.name).0
    }
}

/// Split `name#tag` into the display name and the numeric row tag.
pub fn split_correlation(name: &str) -> (&str, Option<u64>) {
    match name.rsplit_once('#') {
        Some((display, tag)) => match tag.parse() {
            Ok(tag) => (display, Some(tag)),
            Err(_) => (name, None),
        },
        None => (name, None),
    }
}
