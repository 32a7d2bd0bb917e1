//! Session observers

use crate::{placements::PlacedBox, result::SessionResult};

/// Receives the session's output. Every update is a full replacement.
pub trait SessionObserver {
    /// Called after every state-changing operation.
    fn on_update(&mut self, placements: &[PlacedBox], result: &SessionResult);

    /// Called with `true` before a solver-bound operation starts and `false`
    /// once it has finished, successfully or not.
    fn on_busy(&mut self, _busy: bool) {}
}

/// Observer that ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_update(&mut self, _placements: &[PlacedBox], _result: &SessionResult) {}
}

impl<O: SessionObserver + ?Sized> SessionObserver for &mut O {
    fn on_update(&mut self, placements: &[PlacedBox], result: &SessionResult) {
        (**self).on_update(placements, result);
    }

    fn on_busy(&mut self, busy: bool) {
        (**self).on_busy(busy);
    }
}
