//! Grid solver
//!
//! A deterministic first-fit stand-in for the remote solver, used by tests and
//! by the CLI's offline mode. Items are never rotated; each item is tried at
//! grid positions that are multiples of its own size, scanning depth, then
//! height, then width, and takes the first slot free of obstacles and of
//! boxes placed earlier in the same call.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    container::ContainerSpec,
    placements::{Origin, PlacedBox, UnfulfilledEntry},
    solver::{PackingSolver, PlacementResult, SolveError, SolveRequest},
};

/// Deterministic first-fit solver.
#[derive(Debug, Default)]
pub struct GridSolver {
    calls: AtomicUsize,
    fail_on_call: Option<(usize, SolveError)>,
    requests: Mutex<Vec<SolveRequest>>,
}

impl GridSolver {
    /// Create a solver that always answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver whose `call`-th request (zero-based) fails with `error`.
    pub fn failing_on(call: usize, error: SolveError) -> Self {
        Self {
            fail_on_call: Some((call, error)),
            ..Self::default()
        }
    }

    /// Number of requests received so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of the requests received so far.
    pub fn requests(&self) -> Vec<SolveRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &SolveRequest) -> usize {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        self.calls.fetch_add(1, Ordering::SeqCst)
    }
}

impl PackingSolver for GridSolver {
    async fn solve(&self, request: &SolveRequest) -> Result<PlacementResult, SolveError> {
        let call = self.record(request);

        if let Some((fail_on, error)) = &self.fail_on_call
            && *fail_on == call
        {
            return Err(error.clone());
        }

        Ok(pack(request))
    }
}

/// Run the first-fit grid over a request.
pub fn pack(request: &SolveRequest) -> PlacementResult {
    let origin = request.phase.origin();
    let mut occupied = request.obstacles.clone();
    let mut result = PlacementResult::default();

    for item in &request.items {
        let mut placed = 0_u32;

        while placed < item.count {
            let Some(position) = first_free_slot(&request.container, item.dimensions(), &occupied)
            else {
                break;
            };

            let placed_box = PlacedBox::new(&item.name, position, item.dimensions(), origin);

            occupied.push(placed_box.clone());
            result.placements.push(placed_box);
            placed += 1;
        }

        if placed < item.count {
            result.unfulfilled.push(UnfulfilledEntry {
                name: item.name.clone(),
                requested_total: item.count,
                leftover_count: item.count - placed,
            });
        }
    }

    result
}

fn first_free_slot(
    container: &ContainerSpec,
    dimensions: [u32; 3],
    occupied: &[PlacedBox],
) -> Option<[u32; 3]> {
    let [width, height, depth] = dimensions;

    let xs = grid(width, container.width);
    let ys = grid(height, container.height);
    let zs = grid(depth, container.depth);

    for &z in &zs {
        for &y in &ys {
            for &x in &xs {
                let candidate = PlacedBox::new("", [x, y, z], dimensions, Origin::Bulk);

                if !occupied.iter().any(|other| other.overlaps(&candidate)) {
                    return Some([x, y, z]);
                }
            }
        }
    }

    None
}

/// Offsets at which an item of length `len` starts along an axis of `limit`.
fn grid(len: u32, limit: u32) -> Vec<u32> {
    let Some(last) = limit.checked_sub(len) else {
        return Vec::new();
    };

    if len == 0 {
        return Vec::new();
    }

    (0..=last)
        .step_by(usize::try_from(len).unwrap_or(usize::MAX))
        .collect()
}
