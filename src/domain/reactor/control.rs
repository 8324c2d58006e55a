//! Control combinators over series.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{Reactor, Series, State, Trigger};
use crate::domain::error::Fault;
use crate::domain::value::Quantity;

pub struct Chain<T> {
    initial: Series<T>,
    continuation: Series<T>,
    transitioned: bool,
    trigger: Trigger,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Chain<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        if !self.transitioned {
            let state = self.initial.commit(sequence);
            if state.has_evaluation() {
                self.value = Some(self.initial.eval());
            }
            if !state.is_complete() {
                return State::new(state.has_evaluation(), false);
            }
            self.transitioned = true;
            if state.has_evaluation() {
                self.trigger.signal();
                return State::Evaluated;
            }
        }
        let state = self.continuation.commit(sequence);
        if state.has_evaluation() {
            self.value = Some(self.continuation.eval());
        }
        state
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Yields `initial` until it completes, then `continuation`.
pub fn chain<T: Clone + 'static>(
    initial: Series<T>,
    continuation: Series<T>,
    trigger: &Trigger,
) -> Series<T> {
    Series::new(Chain {
        initial,
        continuation,
        transitioned: false,
        trigger: trigger.clone(),
        value: None,
    })
}

fn is_true(condition: &Series<bool>) -> bool {
    matches!(condition.eval(), Ok(true))
}

pub struct When<T> {
    condition: Series<bool>,
    series: Series<T>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for When<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let condition = self.condition.commit(sequence);
        let series = self.series.commit(sequence);
        let fresh = condition.has_evaluation() || series.has_evaluation();
        let evaluated = fresh && is_true(&self.condition) && self.series.has_value();
        if evaluated {
            self.value = Some(self.series.eval());
        }
        let stuck_false = condition.is_complete() && !is_true(&self.condition);
        State::new(evaluated, series.is_complete() || stuck_false)
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Yields the current value of `series` on ticks where `condition` is true.
pub fn when<T: Clone + 'static>(condition: Series<bool>, series: Series<T>) -> Series<T> {
    Series::new(When {
        condition,
        series,
        value: None,
    })
}

pub struct Until<T> {
    condition: Series<bool>,
    series: Series<T>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Until<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let condition = self.condition.commit(sequence);
        if condition.has_evaluation() && is_true(&self.condition) {
            return State::Complete;
        }
        let state = self.series.commit(sequence);
        if state.has_evaluation() {
            self.value = Some(self.series.eval());
        }
        state
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Yields `series` until `condition` evaluates to true, then completes.
pub fn until<T: Clone + 'static>(condition: Series<bool>, series: Series<T>) -> Series<T> {
    Series::new(Until {
        condition,
        series,
        value: None,
    })
}

pub struct Filter<T> {
    condition: Series<bool>,
    series: Series<T>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Filter<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        self.condition.commit(sequence);
        let state = self.series.commit(sequence);
        let evaluated = state.has_evaluation() && is_true(&self.condition);
        if evaluated {
            self.value = Some(self.series.eval());
        }
        State::new(evaluated, state.is_complete())
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Passes fresh evaluations of `series` while `condition` is currently true.
pub fn filter<T: Clone + 'static>(condition: Series<bool>, series: Series<T>) -> Series<T> {
    Series::new(Filter {
        condition,
        series,
        value: None,
    })
}

pub struct Distinct<T> {
    source: Series<T>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + PartialEq + 'static> Reactor for Distinct<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        let mut evaluated = false;
        if state.has_evaluation() {
            let value = self.source.eval();
            if self.value.as_ref() != Some(&value) {
                self.value = Some(value);
                evaluated = true;
            }
        }
        State::new(evaluated, state.is_complete())
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Suppresses consecutive duplicate values.
pub fn distinct<T: Clone + PartialEq + 'static>(source: Series<T>) -> Series<T> {
    Series::new(Distinct {
        source,
        value: None,
    })
}

pub struct Count<T> {
    source: Series<T>,
    count: Quantity,
}

impl<T: Clone + 'static> Reactor for Count<T> {
    type Output = Quantity;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        if state.has_evaluation() {
            self.count += 1;
        }
        state
    }

    fn eval(&self) -> Result<Quantity, Fault> {
        Ok(self.count)
    }
}

/// Number of evaluations of `source` so far.
pub fn count<T: Clone + 'static>(source: Series<T>) -> Series<Quantity> {
    Series::new(Count { source, count: 0 })
}

pub struct First<T> {
    source: Series<T>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for First<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        if state.has_evaluation() {
            self.value = Some(self.source.eval());
            return State::EvaluatedAndComplete;
        }
        state
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

pub fn first<T: Clone + 'static>(source: Series<T>) -> Series<T> {
    Series::new(First {
        source,
        value: None,
    })
}

pub struct Last<T> {
    source: Series<T>,
}

impl<T: Clone + 'static> Reactor for Last<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        if !state.is_complete() {
            return State::None;
        }
        State::new(self.source.has_value(), true)
    }

    fn eval(&self) -> Result<T, Fault> {
        self.source.eval()
    }
}

/// Yields only the final value of `source`, once it completes.
pub fn last<T: Clone + 'static>(source: Series<T>) -> Series<T> {
    Series::new(Last { source })
}

pub struct Previous<T> {
    source: Series<T>,
    current: Option<Result<T, Fault>>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Previous<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        let mut evaluated = false;
        if state.has_evaluation() {
            let next = self.source.eval();
            if let Some(current) = self.current.replace(next) {
                self.value = Some(current);
                evaluated = true;
            }
        }
        State::new(evaluated, state.is_complete())
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Yields the value `source` held before its latest evaluation.
pub fn previous<T: Clone + 'static>(source: Series<T>) -> Series<T> {
    Series::new(Previous {
        source,
        current: None,
        value: None,
    })
}

pub struct Range {
    lower: Series<Quantity>,
    upper: Series<Quantity>,
    next: Option<Quantity>,
    end: Quantity,
    trigger: Trigger,
    value: Option<Result<Quantity, Fault>>,
}

impl Reactor for Range {
    type Output = Quantity;

    fn commit(&mut self, sequence: u64) -> State {
        let lower = self.lower.commit(sequence);
        let upper = self.upper.commit(sequence);
        let bounds_complete = lower.is_complete() && upper.is_complete();
        let starved = (lower.is_complete() && !self.lower.has_value())
            || (upper.is_complete() && !self.upper.has_value());
        if (lower.has_evaluation() || upper.has_evaluation())
            && self.lower.has_value()
            && self.upper.has_value()
        {
            match (self.lower.eval(), self.upper.eval()) {
                (Ok(start), Ok(end)) => {
                    self.next = Some(start);
                    self.end = end;
                }
                (Err(fault), _) | (_, Err(fault)) => {
                    self.next = None;
                    self.value = Some(Err(fault));
                    return State::new(true, bounds_complete);
                }
            }
        }
        match self.next {
            Some(current) if current <= self.end => {
                self.value = Some(Ok(current));
                let more = current < self.end;
                self.next = if more { Some(current + 1) } else { None };
                if more {
                    self.trigger.signal();
                }
                State::new(true, !more && bounds_complete)
            }
            _ => State::new(false, bounds_complete || starved),
        }
    }

    fn eval(&self) -> Result<Quantity, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Counts from `lower` to `upper` inclusive, one value per commit. New bounds
/// restart the progression.
pub fn range(
    lower: Series<Quantity>,
    upper: Series<Quantity>,
    trigger: &Trigger,
) -> Series<Quantity> {
    Series::new(Range {
        lower,
        upper,
        next: None,
        end: 0,
        trigger: trigger.clone(),
        value: None,
    })
}

/// Writable cell behind a fold operand.
pub struct FoldSlot<T> {
    value: RefCell<Option<T>>,
    dirty: Cell<bool>,
}

impl<T: Clone> FoldSlot<T> {
    pub fn set(&self, value: T) {
        *self.value.borrow_mut() = Some(value);
        self.dirty.set(true);
    }
}

struct FoldArgument<T> {
    slot: Rc<FoldSlot<T>>,
}

impl<T: Clone + 'static> Reactor for FoldArgument<T> {
    type Output = T;

    fn commit(&mut self, _sequence: u64) -> State {
        State::new(self.slot.dirty.replace(false), false)
    }

    fn eval(&self) -> Result<T, Fault> {
        self.slot.value.borrow().clone().ok_or(Fault::Unavailable)
    }
}

/// A series evaluating to whatever the fold last wrote into the slot.
pub fn fold_argument<T: Clone + 'static>() -> (Rc<FoldSlot<T>>, Series<T>) {
    let slot = Rc::new(FoldSlot {
        value: RefCell::new(None),
        dirty: Cell::new(false),
    });
    let series = Series::new(FoldArgument {
        slot: Rc::clone(&slot),
    });
    (slot, series)
}

pub struct Fold<T> {
    combiner: Series<T>,
    left: Rc<FoldSlot<T>>,
    right: Rc<FoldSlot<T>>,
    source: Series<T>,
    accumulator: Option<T>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Fold<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        if !state.has_evaluation() {
            return State::new(false, state.is_complete());
        }
        let element = match self.source.eval() {
            Ok(element) => element,
            Err(fault) => {
                self.value = Some(Err(fault));
                return State::new(true, state.is_complete());
            }
        };
        let Some(accumulator) = self.accumulator.take() else {
            self.accumulator = Some(element.clone());
            self.value = Some(Ok(element));
            return State::new(true, state.is_complete());
        };
        self.left.set(accumulator.clone());
        self.right.set(element);
        let combined = self.combiner.commit(sequence);
        if !combined.has_evaluation() {
            self.accumulator = Some(accumulator);
            return State::new(false, state.is_complete());
        }
        let result = self.combiner.eval();
        self.accumulator = Some(match &result {
            Ok(next) => next.clone(),
            Err(_) => accumulator,
        });
        self.value = Some(result);
        State::new(true, state.is_complete())
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Left fold of `source`. The first element seeds the accumulator and is
/// emitted as is; each later element is combined by committing `combiner`
/// after writing the accumulator into `left` and the element into `right`.
pub fn fold<T: Clone + 'static>(
    combiner: Series<T>,
    left: Rc<FoldSlot<T>>,
    right: Rc<FoldSlot<T>>,
    source: Series<T>,
) -> Series<T> {
    Series::new(Fold {
        combiner,
        left,
        right,
        source,
        accumulator: None,
        value: None,
    })
}
