//! Combinators over sets of series.

use std::collections::VecDeque;

use super::{Reactor, Series, State, Trigger};
use crate::domain::error::Fault;

pub struct Concur<T> {
    source: Option<Series<Series<T>>>,
    members: Vec<Series<T>>,
    pending: VecDeque<Result<T, Fault>>,
    trigger: Trigger,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Concur<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let mut closed = true;
        if let Some(source) = &self.source {
            let state = source.commit(sequence);
            if state.has_evaluation() {
                match source.eval() {
                    Ok(member) => self.members.push(member),
                    Err(fault) => self.pending.push_back(Err(fault)),
                }
            }
            closed = state.is_complete();
        }
        let mut all_complete = true;
        for member in &self.members {
            let state = member.commit(sequence);
            if state.has_evaluation() {
                self.pending.push_back(member.eval());
            }
            all_complete &= state.is_complete();
        }
        let evaluated = match self.pending.pop_front() {
            Some(value) => {
                self.value = Some(value);
                true
            }
            None => false,
        };
        if !self.pending.is_empty() {
            self.trigger.signal();
        }
        State::new(evaluated, closed && all_complete && self.pending.is_empty())
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Merges every series `source` produces, completing once `source` is
/// complete and every member has completed. Simultaneous evaluations are
/// queued and delivered on subsequent commits.
pub fn concur<T: Clone + 'static>(source: Series<Series<T>>, trigger: &Trigger) -> Series<T> {
    Series::new(Concur {
        source: Some(source),
        members: Vec::new(),
        pending: VecDeque::new(),
        trigger: trigger.clone(),
        value: None,
    })
}

/// Merges a closed set of series.
pub fn aggregate<T: Clone + 'static>(members: Vec<Series<T>>, trigger: &Trigger) -> Series<T> {
    Series::new(Concur {
        source: None,
        members,
        pending: VecDeque::new(),
        trigger: trigger.clone(),
        value: None,
    })
}

pub struct Switch<T> {
    source: Series<Series<T>>,
    current: Option<Series<T>>,
    value: Option<Result<T, Fault>>,
}

impl<T: Clone + 'static> Reactor for Switch<T> {
    type Output = T;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        if state.has_evaluation() {
            match self.source.eval() {
                Ok(series) => self.current = Some(series),
                Err(fault) => {
                    self.current = None;
                    self.value = Some(Err(fault));
                    return State::new(true, state.is_complete());
                }
            }
        }
        let Some(current) = &self.current else {
            return State::new(false, state.is_complete());
        };
        let inner = current.commit(sequence);
        if inner.has_evaluation() {
            self.value = Some(current.eval());
        }
        State::new(
            inner.has_evaluation(),
            state.is_complete() && inner.is_complete(),
        )
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Yields the most recent series produced by `source`, abandoning the
/// previous one whenever a new one arrives.
pub fn switch<T: Clone + 'static>(source: Series<Series<T>>) -> Series<T> {
    Series::new(Switch {
        source,
        current: None,
        value: None,
    })
}
