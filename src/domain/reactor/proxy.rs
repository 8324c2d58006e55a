//! Two-phase placeholders used to break reference cycles.

use std::cell::OnceCell;
use std::rc::Rc;

use super::{Reactor, Series, State, WeakSeries};
use crate::domain::error::Fault;

/// Bookkeeping view of a placeholder, independent of its value type.
pub trait ProxyBinding {
    fn is_bound(&self) -> bool;
}

/// The patchable cell behind a proxy. Bound at most once.
pub struct ProxyCell<T> {
    target: OnceCell<WeakSeries<T>>,
}

impl<T: Clone + 'static> ProxyCell<T> {
    /// Returns `false` if the cell was already bound.
    pub fn bind(&self, series: &Series<T>) -> bool {
        self.target.set(series.downgrade()).is_ok()
    }

    fn target(&self) -> Option<Series<T>> {
        self.target.get().and_then(WeakSeries::upgrade)
    }
}

impl<T> ProxyBinding for ProxyCell<T> {
    fn is_bound(&self) -> bool {
        self.target.get().is_some()
    }
}

struct Proxy<T> {
    cell: Rc<ProxyCell<T>>,
    seen: Option<u64>,
}

impl<T: Clone + 'static> Reactor for Proxy<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let Some(target) = self.cell.target() else {
            return State::None;
        };
        let state = target.commit(sequence);
        if state.has_evaluation() {
            self.seen = Some(sequence);
            return state;
        }
        // Reached from inside the target's own commit: surface the
        // evaluation of an earlier tick that has not been forwarded yet.
        match target.evaluated_at() {
            Some(at) if at < sequence && self.seen != Some(at) => {
                self.seen = Some(at);
                State::new(true, state.is_complete())
            }
            _ => state,
        }
    }

    fn eval(&self) -> Result<T, Fault> {
        self.cell
            .target()
            .map_or(Err(Fault::Unavailable), |target| target.eval())
    }
}

/// Creates an unbound placeholder. It reports [`State::None`] until bound and
/// forwards to its target afterwards; inside a cycle it yields the target's
/// value from the previous tick. The target is held weakly; the series
/// that owns the proxy's consumers keeps it alive.
pub fn proxy<T: Clone + 'static>() -> (Rc<ProxyCell<T>>, Series<T>) {
    let cell = Rc::new(ProxyCell {
        target: OnceCell::new(),
    });
    let series = Series::new(Proxy {
        cell: Rc::clone(&cell),
        seen: None,
    });
    (cell, series)
}
