//! The reactive runtime: reactors, shared series and the commit protocol.
//!
//! A [`Reactor`] is committed once per sequence number and reports a
//! [`State`]. Reactors are wrapped in a [`Series`], the shared handle every
//! combinator holds, which memoizes the commit of a sequence, caches the last
//! evaluation and keeps completion monotone.

pub mod basic;
pub mod concur;
pub mod control;
pub mod proxy;
pub mod queue;
pub mod runner;
pub mod trigger;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::domain::error::Fault;

pub use basic::{constant, lift, lift2, lift3, none, throw};
pub use concur::{aggregate, concur, switch};
pub use control::{
    chain, count, distinct, filter, first, fold, fold_argument, last, previous, range, until,
    when, FoldSlot,
};
pub use proxy::{proxy, ProxyBinding};
pub use queue::{queue, queue_series, QueueSink};
pub use runner::{Root, RunOutcome, Runner};
pub use trigger::Trigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    None,
    Evaluated,
    Complete,
    EvaluatedAndComplete,
}

impl State {
    pub fn new(evaluated: bool, complete: bool) -> State {
        match (evaluated, complete) {
            (false, false) => State::None,
            (true, false) => State::Evaluated,
            (false, true) => State::Complete,
            (true, true) => State::EvaluatedAndComplete,
        }
    }

    pub fn has_evaluation(self) -> bool {
        matches!(self, State::Evaluated | State::EvaluatedAndComplete)
    }

    pub fn is_complete(self) -> bool {
        matches!(self, State::Complete | State::EvaluatedAndComplete)
    }
}

/// A node of the reactive graph.
///
/// `eval` is only meaningful after a commit that reported an evaluation.
pub trait Reactor {
    type Output: Clone + 'static;

    fn commit(&mut self, sequence: u64) -> State;

    fn eval(&self) -> Result<Self::Output, Fault>;
}

struct SeriesCell<T> {
    reactor: RefCell<Box<dyn Reactor<Output = T>>>,
    value: RefCell<Option<Result<T, Fault>>>,
    last: Cell<Option<(u64, State)>>,
    evaluated_at: Cell<Option<u64>>,
    committing: Cell<bool>,
    complete: Cell<bool>,
}

/// Shared handle to a reactor.
///
/// Committing the same sequence twice returns the first result. A commit
/// reached again while the series is still committing (a cycle) reports
/// [`State::None`], so readers observe the previous evaluation.
pub struct Series<T> {
    cell: Rc<SeriesCell<T>>,
}

impl<T> Clone for Series<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Clone + 'static> Series<T> {
    pub fn new(reactor: impl Reactor<Output = T> + 'static) -> Self {
        Self {
            cell: Rc::new(SeriesCell {
                reactor: RefCell::new(Box::new(reactor)),
                value: RefCell::new(None),
                last: Cell::new(None),
                evaluated_at: Cell::new(None),
                committing: Cell::new(false),
                complete: Cell::new(false),
            }),
        }
    }

    pub fn commit(&self, sequence: u64) -> State {
        let cell = &self.cell;
        if let Some((last, state)) = cell.last.get() {
            if last == sequence {
                return state;
            }
        }
        if cell.complete.get() {
            return State::Complete;
        }
        if cell.committing.get() {
            return State::None;
        }
        cell.committing.set(true);
        let state = cell.reactor.borrow_mut().commit(sequence);
        cell.committing.set(false);
        if state.has_evaluation() {
            let value = cell.reactor.borrow().eval();
            *cell.value.borrow_mut() = Some(value);
            cell.evaluated_at.set(Some(sequence));
        }
        if state.is_complete() {
            cell.complete.set(true);
        }
        cell.last.set(Some((sequence, state)));
        state
    }

    /// The most recent evaluation.
    pub fn eval(&self) -> Result<T, Fault> {
        self.cell
            .value
            .borrow()
            .clone()
            .unwrap_or(Err(Fault::Unavailable))
    }

    pub fn has_value(&self) -> bool {
        self.cell.value.borrow().is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.cell.complete.get()
    }

    /// Sequence of the most recent evaluation.
    pub fn evaluated_at(&self) -> Option<u64> {
        self.cell.evaluated_at.get()
    }

    pub fn ptr_eq(&self, other: &Series<T>) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub fn downgrade(&self) -> WeakSeries<T> {
        WeakSeries {
            cell: Rc::downgrade(&self.cell),
        }
    }
}

/// Non-owning handle to a series.
pub struct WeakSeries<T> {
    cell: Weak<SeriesCell<T>>,
}

impl<T> Clone for WeakSeries<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
        }
    }
}

impl<T> WeakSeries<T> {
    pub fn upgrade(&self) -> Option<Series<T>> {
        self.cell.upgrade().map(|cell| Series { cell })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn state_lattice() {
        assert_eq!(State::new(true, true), State::EvaluatedAndComplete);
        assert!(State::EvaluatedAndComplete.has_evaluation());
        assert!(State::Complete.is_complete());
        assert!(!State::Evaluated.is_complete());
        assert!(!State::None.has_evaluation());
    }

    #[test]
    fn commit_is_memoized_per_sequence() {
        let series = scripted(vec![Some(1), Some(2), Some(3)]);
        assert_eq!(series.commit(1), State::Evaluated);
        assert_eq!(series.commit(1), State::Evaluated);
        assert_eq!(series.eval(), Ok(1));
        assert_eq!(series.commit(2), State::Evaluated);
        assert_eq!(series.eval(), Ok(2));
    }

    #[test]
    fn completion_is_monotone() {
        let series = scripted(vec![Some(7)]);
        assert_eq!(series.commit(1), State::EvaluatedAndComplete);
        assert_eq!(series.commit(2), State::Complete);
        assert_eq!(series.commit(3), State::Complete);
        assert_eq!(series.eval(), Ok(7));
    }

    #[test]
    fn eval_before_evaluation_is_unavailable() {
        let series = scripted::<i64>(vec![None, Some(1)]);
        assert_eq!(series.eval(), Err(Fault::Unavailable));
        assert_eq!(series.commit(1), State::None);
        assert!(!series.has_value());
    }

    #[test]
    fn weak_handles_do_not_keep_series_alive() {
        let series = scripted(vec![Some(1)]);
        let weak = series.downgrade();
        assert!(weak.upgrade().is_some_and(|s| s.ptr_eq(&series)));
        drop(series);
        assert!(weak.upgrade().is_none());
    }
}
