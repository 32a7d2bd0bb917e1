//! Integration tests for the incremental packing session

use rust_decimal::Decimal;
use testresult::TestResult;

use lading::{
    container::ContainerSpec,
    placements::{Origin, PlacedBox},
    result::SessionResult,
    rows::{NewRow, RowKey, RowLock},
    session::{PendingReason, Redirect, Session, SessionError, SessionObserver},
    solver::{PackingSolver, PlacementResult, SolveError, SolveRequest, grid::GridSolver},
    validation::ValidationError,
};

fn container() -> ContainerSpec {
    ContainerSpec::new(2400, 2600, 12000)
}

fn cubes(name: &str, count: u32) -> NewRow {
    NewRow {
        name: Some(name.to_string()),
        count,
        ..NewRow::default()
    }
}

fn count_of<S, O>(session: &Session<S, O>, key: RowKey) -> u32
where
    S: PackingSolver,
    O: SessionObserver,
{
    session.rows().get(key).map(|row| row.count()).unwrap_or_default()
}

fn lock_of<S, O>(session: &Session<S, O>, key: RowKey) -> Option<RowLock>
where
    S: PackingSolver,
    O: SessionObserver,
{
    session.rows().get(key).map(|row| row.lock())
}

/// Reserved quantity of active batches plus every row's remaining count.
fn accounted<S, O>(session: &Session<S, O>) -> u64
where
    S: PackingSolver,
    O: SessionObserver,
{
    session.ledger().reserved_count() + session.rows().total_count()
}

#[derive(Debug, Default)]
struct RecordingObserver {
    updates: Vec<(usize, SessionResult)>,
    busy: Vec<bool>,
}

impl SessionObserver for RecordingObserver {
    fn on_update(&mut self, placements: &[PlacedBox], result: &SessionResult) {
        self.updates.push((placements.len(), result.clone()));
    }

    fn on_busy(&mut self, busy: bool) {
        self.busy.push(busy);
    }
}

#[tokio::test]
async fn commit_then_undo_single_row() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());
    let row = session.add_row(cubes("BOX-1", 50));

    let batch = session.commit(row).await?;

    assert_eq!(session.placements().len(), 48);
    assert_eq!(count_of(&session, row), 2);
    assert_eq!(lock_of(&session, row), Some(RowLock::Locked(batch)));
    assert_eq!(session.result().total_demand(), 50);
    assert_eq!(session.result().fill_rate_percent(), 96);
    assert!(session.result().visible());

    session.undo(batch).await?;

    assert_eq!(count_of(&session, row), 50);
    assert_eq!(lock_of(&session, row), Some(RowLock::Unlocked));
    assert!(session.ledger().is_empty());
    assert!(session.placements().is_empty());
    assert!(!session.result().visible());

    Ok(())
}

#[tokio::test]
async fn demand_is_conserved_across_commits_and_undos() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 20));
    let c = session.add_row(cubes("C", 30));

    assert_eq!(accounted(&session), 60);

    let batch_a = session.commit(a).await?;
    let batch_b = session.commit(b).await?;

    assert_eq!(accounted(&session), 60);

    let batch_c = session.commit(c).await?;

    assert_eq!(accounted(&session), 60);
    assert_eq!(session.result().total_demand(), 60);
    assert_eq!(count_of(&session, c), 12, "only 18 slots remain for C");

    session.undo(batch_b).await?;

    assert_eq!(accounted(&session), 60);
    assert_eq!(count_of(&session, b), 20);

    session.undo(batch_a).await?;

    assert_eq!(accounted(&session), 60);
    assert_eq!(count_of(&session, c), 0, "C gets all the space back");

    session.undo(batch_c).await?;

    assert!(session.ledger().is_empty());
    assert_eq!(accounted(&session), 60);
    assert_eq!(session.rows().total_count(), 60);

    Ok(())
}

#[tokio::test]
async fn undoing_the_latest_batch_needs_no_solver_call() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 10));

    session.commit(a).await?;
    let batch_b = session.commit(b).await?;

    let before: Vec<PlacedBox> = session
        .ledger()
        .iter()
        .flat_map(|batch| batch.placements().to_vec())
        .take(10)
        .collect();

    assert_eq!(solver.calls(), 2);

    session.undo(batch_b).await?;

    assert_eq!(solver.calls(), 2);
    assert_eq!(session.placements(), before.as_slice());

    Ok(())
}

#[tokio::test]
async fn undoing_an_earlier_batch_replays_the_rest() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 10));

    let batch_a = session.commit(a).await?;
    let batch_b = session.commit(b).await?;

    let a_positions: Vec<[u32; 3]> = session
        .ledger()
        .get(batch_a)
        .map(|batch| batch.placements().iter().map(PlacedBox::position).collect())
        .unwrap_or_default();

    session.undo(batch_a).await?;

    assert_eq!(solver.calls(), 3, "one replay call for B");
    assert_eq!(session.ledger().len(), 1);

    let replayed = session.ledger().get(batch_b).ok_or("batch B missing")?;
    let b_positions: Vec<[u32; 3]> = replayed.placements().iter().map(PlacedBox::position).collect();

    assert_eq!(b_positions, a_positions, "B moves into the freed space");
    assert_eq!(lock_of(&session, b), Some(RowLock::Locked(batch_b)));
    assert_eq!(count_of(&session, a), 10);

    Ok(())
}

#[tokio::test]
async fn recommitting_after_undo_reproduces_the_placement() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 30));
    let b = session.add_row(cubes("B", 30));

    session.commit(a).await?;
    let batch_b = session.commit(b).await?;
    let first: Vec<PlacedBox> = session.placements().to_vec();

    session.undo(batch_b).await?;
    session.commit(b).await?;

    assert_eq!(session.placements(), first.as_slice());
    assert_eq!(count_of(&session, b), 12);

    Ok(())
}

#[tokio::test]
async fn bulk_solve_requests_only_uncommitted_rows() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    session.add_row(cubes("B", 20));

    let batch_a = session.commit(a).await?;

    assert_eq!(count_of(&session, a), 0);

    let result = session.run_bulk_solve().await?;

    let requests = solver.requests();
    let bulk = requests.last().ok_or("no bulk request")?;

    assert_eq!(bulk.items.len(), 1);
    assert!(bulk.items.iter().all(|item| item.name.starts_with("B#")));
    assert_eq!(bulk.items.iter().map(|item| item.count).sum::<u32>(), 20);
    assert_eq!(bulk.obstacles.len(), 10);

    assert_eq!(result.placed_count(), 30);
    assert_eq!(result.total_demand(), 30);
    assert_eq!(result.fill_rate_percent(), 100);

    let origins: Vec<Origin> = session.placements().iter().map(PlacedBox::origin).collect();

    assert!(origins.iter().take(10).all(|&origin| origin == Origin::Committed));
    assert!(origins.iter().skip(10).all(|&origin| origin == Origin::Bulk));

    assert_eq!(lock_of(&session, a), Some(RowLock::Released(batch_a)));
    assert_eq!(count_of(&session, a), 10);
    assert_eq!(session.pending_count(a), Some(0));

    Ok(())
}

#[tokio::test]
async fn repeated_bulk_solves_replace_the_bulk_layer() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    session.add_row(cubes("B", 5));

    session.commit(a).await?;
    session.run_bulk_solve().await?;

    assert_eq!(session.placements().len(), 15);

    session.run_bulk_solve().await?;

    assert_eq!(session.placements().len(), 15);
    assert_eq!(
        session
            .placements()
            .iter()
            .filter(|placed| placed.origin() == Origin::Bulk)
            .count(),
        5
    );

    Ok(())
}

#[tokio::test]
async fn bulk_solve_reports_unfulfilled_demand() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    session.add_row(cubes("BOX-1", 50));

    let result = session.run_bulk_solve().await?;

    assert_eq!(result.placed_count(), 48);
    assert_eq!(result.unfulfilled_count(), 2);
    assert_eq!(
        result.unfulfilled().first().map(|entry| entry.display_name()),
        Some("BOX-1")
    );
    assert_eq!(result.volume_utilization_percent(), 64);
    assert_eq!(result.free_volume_m3(), Decimal::new(26_880, 3));

    Ok(())
}

#[tokio::test]
async fn nothing_pending_distinguishes_empty_and_committed() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    assert_eq!(
        session.run_bulk_solve().await,
        Err(SessionError::Validation(ValidationError::NoRows))
    );

    let empty = session.add_row(cubes("EMPTY", 0));

    assert_eq!(
        session.run_bulk_solve().await,
        Err(SessionError::NothingPending(PendingReason::NoDemand))
    );

    session.remove_row(empty).await?;

    let a = session.add_row(cubes("A", 10));
    session.commit(a).await?;

    assert_eq!(
        session.run_bulk_solve().await,
        Err(SessionError::NothingPending(PendingReason::AllCommitted))
    );
    assert_eq!(solver.calls(), 1);

    Ok(())
}

#[tokio::test]
async fn oversized_container_is_rejected_before_any_solver_call() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, ContainerSpec::new(2400, 2600, 25_000));
    let row = session.add_row(cubes("A", 10));

    assert_eq!(
        session.run_bulk_solve().await,
        Err(SessionError::Validation(ValidationError::ContainerTooLarge {
            dimension_mm: 25_000
        }))
    );
    assert!(matches!(
        session.commit(row).await,
        Err(SessionError::Validation(ValidationError::ContainerTooLarge { .. }))
    ));
    assert_eq!(solver.calls(), 0);

    Ok(())
}

#[tokio::test]
async fn excessive_demand_is_rejected_before_any_solver_call() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, ContainerSpec::new(20_000, 20_000, 20_000));

    session.add_row(cubes("A", 5_000));
    session.add_row(cubes("B", 1));

    assert_eq!(
        session.run_bulk_solve().await,
        Err(SessionError::Validation(ValidationError::DemandTooHigh {
            total: 5_001
        }))
    );
    assert_eq!(solver.calls(), 0);
    assert!(!session.result().visible());

    Ok(())
}

#[tokio::test]
async fn reserved_quantity_counts_toward_the_demand_limit() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    session.commit(a).await?;
    session.set_count(a, 4_990)?;
    let b = session.add_row(cubes("B", 1));

    assert_eq!(
        session.run_bulk_solve().await,
        Err(SessionError::Validation(ValidationError::DemandTooHigh {
            total: 5_001
        }))
    );
    assert_eq!(
        session.commit(b).await,
        Err(SessionError::Validation(ValidationError::DemandTooHigh {
            total: 5_001
        }))
    );
    assert_eq!(solver.calls(), 1);
    assert_eq!(session.result().total_demand(), 5_001);

    Ok(())
}

#[tokio::test]
async fn commit_enforces_the_demand_limit() {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, ContainerSpec::new(20_000, 20_000, 20_000));
    let row = session.add_row(cubes("A", 6_000));

    assert_eq!(
        session.commit(row).await,
        Err(SessionError::Validation(ValidationError::DemandTooHigh {
            total: 6_000
        }))
    );
    assert_eq!(solver.calls(), 0);
    assert!(session.ledger().is_empty());
}

#[tokio::test]
async fn commit_rejects_rows_that_cannot_fit() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let row = session.add_row(NewRow {
        name: Some("BEAM".to_string()),
        width: Decimal::from(13),
        ..NewRow::default()
    });

    assert_eq!(
        session.commit(row).await,
        Err(SessionError::Validation(ValidationError::RowDoesNotFit {
            name: "BEAM".to_string()
        }))
    );
    assert_eq!(solver.calls(), 0);

    Ok(())
}

#[tokio::test]
async fn commit_errors_leave_the_session_unchanged() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, ContainerSpec::new(1000, 1000, 1000));

    let a = session.add_row(cubes("A", 1));
    let b = session.add_row(cubes("B", 1));

    session.commit(a).await?;

    assert_eq!(
        session.commit(a).await,
        Err(SessionError::NothingToCommit(a))
    );
    assert_eq!(
        session.commit(b).await,
        Err(SessionError::NoSpaceAvailable(b))
    );
    assert_eq!(session.ledger().len(), 1);
    assert_eq!(count_of(&session, b), 1);
    assert_eq!(lock_of(&session, b), Some(RowLock::Unlocked));

    Ok(())
}

#[tokio::test]
async fn boundary_errors_change_nothing() -> TestResult {
    let solver = GridSolver::failing_on(0, SolveError::QuotaExceeded);
    let mut session = Session::new(&solver, container());
    let row = session.add_row(cubes("A", 10));

    let error = session.commit(row).await.err().ok_or("commit should fail")?;

    assert_eq!(error, SessionError::Solver(SolveError::QuotaExceeded));
    assert_eq!(error.redirect(), Some(Redirect::Upgrade));
    assert!(session.ledger().is_empty());
    assert_eq!(count_of(&session, row), 10);
    assert_eq!(lock_of(&session, row), Some(RowLock::Unlocked));

    Ok(())
}

#[tokio::test]
async fn failed_replay_leaves_rows_and_ledger_intact() -> TestResult {
    let solver = GridSolver::failing_on(
        4,
        SolveError::Unreachable {
            detail: "connection reset".to_string(),
        },
    );
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 10));
    let c = session.add_row(cubes("C", 10));

    let batch_a = session.commit(a).await?;
    session.commit(b).await?;
    session.commit(c).await?;

    let placements = session.placements().to_vec();
    let keys: Vec<_> = session.ledger().iter().map(|batch| batch.key()).collect();

    let undo = session.undo(batch_a).await;

    assert!(matches!(
        undo,
        Err(SessionError::Solver(SolveError::Unreachable { .. }))
    ));
    assert_eq!(solver.calls(), 5, "replay stopped at C");

    let after: Vec<_> = session.ledger().iter().map(|batch| batch.key()).collect();

    assert_eq!(after, keys);
    assert_eq!(session.placements(), placements.as_slice());
    assert_eq!(count_of(&session, a), 0);
    assert_eq!(lock_of(&session, a), Some(RowLock::Locked(batch_a)));

    Ok(())
}

#[tokio::test]
async fn unknown_batches_are_rejected() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());
    let row = session.add_row(cubes("A", 1));

    let batch = session.commit(row).await?;
    session.undo(batch).await?;

    assert_eq!(
        session.undo(batch).await,
        Err(SessionError::UnknownBatch(batch))
    );

    Ok(())
}

#[tokio::test]
async fn locked_rows_refuse_structural_edits() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());
    let row = session.add_row(cubes("A", 50));

    session.commit(row).await?;

    assert_eq!(
        session.rename(row, "CRATE"),
        Err(SessionError::RowLocked(row))
    );
    assert_eq!(
        session.set_dimensions(row, [Decimal::ONE, Decimal::TWO, Decimal::ONE]),
        Err(SessionError::RowLocked(row))
    );

    session.set_count(row, 5)?;
    session.set_color(row, "#000000")?;

    assert_eq!(count_of(&session, row), 5);
    assert_eq!(session.result().total_demand(), 53);

    let placed = session.placements().first().ok_or("nothing placed")?;

    assert_eq!(session.row_color(placed), Some("#000000"));

    Ok(())
}

#[tokio::test]
async fn released_rows_only_request_unpinned_demand() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 1));

    let first = session.commit(a).await?;
    session.run_bulk_solve().await?;

    assert_eq!(lock_of(&session, a), Some(RowLock::Released(first)));
    assert_eq!(session.pending_count(a), Some(0));

    session.rename(a, "A2")?;
    session.set_count(a, 15)?;

    assert_eq!(session.pending_count(a), Some(5));

    let second = session.commit(a).await?;
    let request = solver.requests().last().cloned().ok_or("no request")?;

    assert_eq!(request.items.first().map(|item| item.count), Some(5));
    assert_eq!(request.obstacles.len(), 10);
    assert_eq!(lock_of(&session, a), Some(RowLock::Locked(second)));
    assert_eq!(count_of(&session, a), 10);
    assert_eq!(session.result().total_demand(), 16);
    assert_eq!(count_of(&session, b), 1);

    session.undo(first).await?;

    assert_eq!(session.ledger().len(), 1);
    assert_eq!(count_of(&session, a), 0, "replay requests the full 15");
    assert_eq!(session.result().total_demand(), 16);

    Ok(())
}

#[tokio::test]
async fn undoing_a_released_batch_unlocks_its_row() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    session.add_row(cubes("B", 1));

    let batch = session.commit(a).await?;
    session.run_bulk_solve().await?;
    session.undo(batch).await?;

    assert_eq!(lock_of(&session, a), Some(RowLock::Unlocked));
    assert_eq!(count_of(&session, a), 10);
    assert_eq!(session.pending_count(a), Some(10));
    assert!(session.placements().is_empty(), "bulk layer is dropped");

    Ok(())
}

#[tokio::test]
async fn removing_a_row_undoes_its_batches() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 10));

    session.commit(a).await?;
    let batch_b = session.commit(b).await?;

    session.remove_row(a).await?;

    assert!(!session.rows().contains(a));
    assert_eq!(session.ledger().len(), 1);
    assert!(session.ledger().get(batch_b).is_some());
    assert_eq!(solver.calls(), 3);
    assert_eq!(
        session.remove_row(a).await,
        Err(SessionError::UnknownRow(a))
    );

    Ok(())
}

#[tokio::test]
async fn removing_a_row_keeps_an_unrelated_bulk_layer() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 10));

    session.run_bulk_solve().await?;

    let c = session.add_row(cubes("C", 5));
    session.remove_row(c).await?;

    assert_eq!(session.placements().len(), 20);
    assert!(session.result().visible());

    session.remove_row(b).await?;

    assert!(session.placements().is_empty(), "bulk layer held B's boxes");
    assert_eq!(solver.calls(), 1);

    Ok(())
}

#[tokio::test]
async fn reset_returns_reservations_and_keeps_rows() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());

    let a = session.add_row(cubes("A", 10));
    let b = session.add_row(cubes("B", 10));

    session.commit(a).await?;
    session.run_bulk_solve().await?;
    session.commit(b).await?;

    session.reset();

    assert!(session.ledger().is_empty());
    assert!(session.placements().is_empty());
    assert_eq!(session.result(), &SessionResult::default());
    assert_eq!(count_of(&session, a), 10);
    assert_eq!(count_of(&session, b), 10);
    assert_eq!(lock_of(&session, a), Some(RowLock::Unlocked));
    assert_eq!(lock_of(&session, b), Some(RowLock::Unlocked));

    Ok(())
}

#[tokio::test]
async fn container_is_fixed_while_batches_exist() -> TestResult {
    let solver = GridSolver::new();
    let mut session = Session::new(&solver, container());
    let row = session.add_row(cubes("A", 10));

    let batch = session.commit(row).await?;

    assert_eq!(
        session.set_container(ContainerSpec::new(1000, 1000, 1000)),
        Err(SessionError::ContainerInUse)
    );

    session.undo(batch).await?;
    session.set_container(ContainerSpec::new(1000, 1000, 1000))?;

    assert_eq!(session.container(), &ContainerSpec::new(1000, 1000, 1000));

    Ok(())
}

#[tokio::test]
async fn observer_sees_busy_flags_and_full_updates() -> TestResult {
    let solver = GridSolver::new();
    let mut observer = RecordingObserver::default();

    {
        let mut session = Session::with_observer(&solver, container(), &mut observer);
        let row = session.add_row(cubes("A", 10));

        session.commit(row).await?;

        let bulk = session.run_bulk_solve().await;

        assert!(bulk.is_err(), "everything is already committed");
    }

    assert_eq!(observer.busy, vec![true, false, true, false]);
    assert_eq!(observer.updates.len(), 2, "add_row and commit");
    assert_eq!(observer.updates.last().map(|(len, _)| *len), Some(10));

    Ok(())
}

#[derive(Debug)]
struct StalledSolver;

impl PackingSolver for StalledSolver {
    async fn solve(&self, _request: &SolveRequest) -> Result<PlacementResult, SolveError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn abandoned_operations_clear_the_busy_flag() {
    let mut observer = RecordingObserver::default();

    {
        let mut session = Session::with_observer(StalledSolver, container(), &mut observer);
        let row = session.add_row(cubes("A", 10));

        tokio::select! {
            biased;
            _ = session.commit(row) => {}
            () = std::future::ready(()) => {}
        }

        assert!(session.ledger().is_empty(), "an abandoned commit changes nothing");
        assert_eq!(session.pending_count(row), Some(10));
    }

    assert_eq!(observer.busy, vec![true, false]);
}
