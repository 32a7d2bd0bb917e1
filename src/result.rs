//! Session result

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::{
    container::ContainerSpec,
    ledger::Ledger,
    placements::{PlacedBox, UnfulfilledEntry},
    rows::RowStore,
};

const MM3_PER_M3: i64 = 1_000_000_000;

/// Statistics derived from the session state after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionResult {
    visible: bool,
    placed_count: u64,
    total_demand: u64,
    unfulfilled: Vec<UnfulfilledEntry>,
    unfulfilled_count: u64,
    fill_rate_percent: u32,
    volume_utilization_percent: u32,
    free_volume_m3: Decimal,
}

impl SessionResult {
    /// Derive the result from the current state.
    ///
    /// `visible` is true once a bulk layer exists or any batch is committed.
    pub(crate) fn derive(
        container: &ContainerSpec,
        rows: &RowStore,
        ledger: &Ledger,
        placements: &[PlacedBox],
        unfulfilled: &[UnfulfilledEntry],
        bulk_solved: bool,
    ) -> Self {
        let placed_count = u64::try_from(placements.len()).unwrap_or(u64::MAX);
        let total_demand = rows.total_count().saturating_add(ledger.reserved_count());

        let placed_volume = placements
            .iter()
            .map(PlacedBox::volume)
            .fold(0_u64, u64::saturating_add);
        let container_volume = container.volume();

        Self {
            visible: bulk_solved || !ledger.is_empty(),
            placed_count,
            total_demand,
            unfulfilled: unfulfilled.to_vec(),
            unfulfilled_count: unfulfilled
                .iter()
                .map(|entry| u64::from(entry.leftover_count))
                .sum(),
            fill_rate_percent: percent(placed_count, total_demand),
            volume_utilization_percent: percent(placed_volume, container_volume),
            free_volume_m3: cubic_metres(container_volume.saturating_sub(placed_volume)),
        }
    }

    /// Whether there is anything to show yet
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Boxes in the unified placement set
    pub fn placed_count(&self) -> u64 {
        self.placed_count
    }

    /// Remaining row counts plus the quantity reserved by active batches
    pub fn total_demand(&self) -> u64 {
        self.total_demand
    }

    /// Demand the last bulk solve could not place
    pub fn unfulfilled(&self) -> &[UnfulfilledEntry] {
        &self.unfulfilled
    }

    /// Sum of leftover counts across `unfulfilled`
    pub fn unfulfilled_count(&self) -> u64 {
        self.unfulfilled_count
    }

    /// Placed count over total demand, as a whole percentage
    pub fn fill_rate_percent(&self) -> u32 {
        self.fill_rate_percent
    }

    /// Placed volume over container volume, as a whole percentage
    pub fn volume_utilization_percent(&self) -> u32 {
        self.volume_utilization_percent
    }

    /// Unused container volume in cubic metres, three decimals
    pub fn free_volume_m3(&self) -> Decimal {
        self.free_volume_m3
    }
}

/// `round(part / whole × 100)`, half away from zero; 0 for an empty whole.
fn percent(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }

    let ratio = Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole);

    ratio
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(u32::MAX)
}

fn cubic_metres(mm3: u64) -> Decimal {
    (Decimal::from(mm3) / Decimal::from(MM3_PER_M3))
        .round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use crate::{
        placements::Origin,
        rows::{NewRow, RowStore},
    };

    use super::*;

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 0), 0);
        assert_eq!(percent(48, 50), 96);
    }

    #[test]
    fn derive_reports_fill_rate_and_free_volume() {
        let container = ContainerSpec::new(2000, 1000, 1000);
        let mut rows = RowStore::new();
        rows.add(NewRow {
            count: 3,
            ..NewRow::default()
        });

        let placements = vec![PlacedBox::new(
            "BOX-1#1",
            [0, 0, 0],
            [1000, 1000, 1000],
            Origin::Bulk,
        )];
        let unfulfilled = vec![UnfulfilledEntry {
            name: "BOX-1#1".to_string(),
            requested_total: 3,
            leftover_count: 2,
        }];

        let result = SessionResult::derive(
            &container,
            &rows,
            &Ledger::new(),
            &placements,
            &unfulfilled,
            true,
        );

        assert!(result.visible());
        assert_eq!(result.placed_count(), 1);
        assert_eq!(result.total_demand(), 3);
        assert_eq!(result.unfulfilled_count(), 2);
        assert_eq!(result.fill_rate_percent(), 33);
        assert_eq!(result.volume_utilization_percent(), 50);
        assert_eq!(result.free_volume_m3(), Decimal::ONE);
    }

    #[test]
    fn derive_is_hidden_before_any_solve() {
        let container = ContainerSpec::new(1000, 1000, 1000);
        let rows = RowStore::new();

        let result = SessionResult::derive(&container, &rows, &Ledger::new(), &[], &[], false);

        assert!(!result.visible());
        assert_eq!(result.fill_rate_percent(), 0);
        assert_eq!(result.volume_utilization_percent(), 0);
    }
}
