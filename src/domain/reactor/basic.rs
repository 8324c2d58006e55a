//! Leaf reactors and function application.

use std::marker::PhantomData;

use super::{Reactor, Series, State};
use crate::domain::error::Fault;

pub struct Constant<T> {
    value: T,
}

impl<T: Clone + 'static> Reactor for Constant<T> {
    type Output = T;

    fn commit(&mut self, _sequence: u64) -> State {
        State::EvaluatedAndComplete
    }

    fn eval(&self) -> Result<T, Fault> {
        Ok(self.value.clone())
    }
}

/// Evaluates once to `value` and completes.
pub fn constant<T: Clone + 'static>(value: T) -> Series<T> {
    Series::new(Constant { value })
}

pub struct NoneReactor<T> {
    _marker: PhantomData<T>,
}

impl<T: Clone + 'static> Reactor for NoneReactor<T> {
    type Output = T;

    fn commit(&mut self, _sequence: u64) -> State {
        State::Complete
    }

    fn eval(&self) -> Result<T, Fault> {
        Err(Fault::Unavailable)
    }
}

/// Completes immediately without ever producing a value.
pub fn none<T: Clone + 'static>() -> Series<T> {
    Series::new(NoneReactor {
        _marker: PhantomData,
    })
}

pub struct Throw<T> {
    fault: Fault,
    _marker: PhantomData<T>,
}

impl<T: Clone + 'static> Reactor for Throw<T> {
    type Output = T;

    fn commit(&mut self, _sequence: u64) -> State {
        State::EvaluatedAndComplete
    }

    fn eval(&self) -> Result<T, Fault> {
        Err(self.fault.clone())
    }
}

/// Evaluates once to a fault and completes.
pub fn throw<T: Clone + 'static>(fault: Fault) -> Series<T> {
    Series::new(Throw {
        fault,
        _marker: PhantomData,
    })
}

macro_rules! lift_reactor {
    ($name:ident, $ctor:ident, $($arg:ident: $ty:ident),+) => {
        pub struct $name<$($ty,)+ R, F> {
            $($arg: Series<$ty>,)+
            function: F,
            value: Option<Result<R, Fault>>,
        }

        impl<$($ty: Clone + 'static,)+ R: Clone + 'static, F> Reactor for $name<$($ty,)+ R, F>
        where
            F: Fn($($ty),+) -> Result<R, Fault> + 'static,
        {
            type Output = R;

            fn commit(&mut self, sequence: u64) -> State {
                let mut fresh = false;
                let mut ready = true;
                let mut all_complete = true;
                let mut starved = false;
                $(
                    let state = self.$arg.commit(sequence);
                    fresh |= state.has_evaluation();
                    all_complete &= state.is_complete();
                    if !self.$arg.has_value() {
                        ready = false;
                        starved |= state.is_complete();
                    }
                )+
                let complete = all_complete || starved;
                if !(fresh && ready) {
                    return State::new(false, complete);
                }
                let result = (|| {
                    $(let $arg = self.$arg.eval()?;)+
                    (self.function)($($arg),+)
                })();
                self.value = Some(result);
                State::new(true, complete)
            }

            fn eval(&self) -> Result<R, Fault> {
                self.value.clone().unwrap_or(Err(Fault::Unavailable))
            }
        }

        /// Applies `function` whenever an operand evaluates and every operand
        /// has a value. An operand fault is passed through.
        pub fn $ctor<$($ty: Clone + 'static,)+ R: Clone + 'static, F>(
            function: F,
            $($arg: Series<$ty>,)+
        ) -> Series<R>
        where
            F: Fn($($ty),+) -> Result<R, Fault> + 'static,
        {
            Series::new($name {
                $($arg,)+
                function,
                value: None,
            })
        }
    };
}

lift_reactor!(Lift, lift, a: A);
lift_reactor!(Lift2, lift2, a: A, b: B);
lift_reactor!(Lift3, lift3, a: A, b: B, c: C);
