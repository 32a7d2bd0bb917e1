//! Container

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::units::{Unit, to_mm};

/// Inner size of the container being filled, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Width (x axis)
    pub width: u32,

    /// Height (y axis, up)
    pub height: u32,

    /// Depth (z axis)
    pub depth: u32,
}

impl ContainerSpec {
    /// Create a container from millimetre dimensions.
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Create a container from user-entered dimensions in the given unit.
    pub fn from_units(width: Decimal, height: Decimal, depth: Decimal, unit: Unit) -> Self {
        Self::new(to_mm(width, unit), to_mm(height, unit), to_mm(depth, unit))
    }

    /// Dimensions as `[width, height, depth]`.
    pub fn dimensions(&self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }

    /// Dimensions in ascending order, for rotation-agnostic comparisons.
    pub fn sorted_dimensions(&self) -> [u32; 3] {
        let mut dims = self.dimensions();
        dims.sort_unstable();
        dims
    }

    /// Longest side.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height).max(self.depth)
    }

    /// Inner volume in cubic millimetres, saturating at `u64::MAX`.
    pub fn volume(&self) -> u64 {
        u64::from(self.width)
            .saturating_mul(u64::from(self.height))
            .saturating_mul(u64::from(self.depth))
    }

    /// Whether a box of the given size fits in some orientation.
    pub fn fits(&self, dimensions: [u32; 3]) -> bool {
        let mut item = dimensions;
        item.sort_unstable();

        item.iter().all(|&side| side > 0)
            && item
                .iter()
                .zip(self.sorted_dimensions())
                .all(|(&side, limit)| side <= limit)
    }
}
