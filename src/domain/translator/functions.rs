//! Arithmetic, comparison and selection nodes.

use chrono::{Duration, NaiveDateTime};

use crate::domain::error::{CompileError, Fault};
use crate::domain::node::NodeKind;
use crate::domain::reactor::{lift, lift2, lift3, Series};
use crate::domain::signatures::Signature;
use crate::domain::translation::{with_native_type, with_ordered_type, Translation};
use crate::domain::types::{CanvasType, NativeType};
use crate::domain::value::{
    ceil_duration, ceil_to, floor_duration, floor_to, round_duration, round_to, Money,
    NativeValue, OrderStatus, Quantity, Side,
};

/// Compiled children of a node, addressed by slot index.
pub(super) struct Arguments<'a> {
    pub kind: &'a NodeKind,
    pub translations: &'a [Translation],
}

impl Arguments<'_> {
    pub fn get<T: NativeValue>(&self, index: usize) -> Result<Series<T>, CompileError> {
        self.translations
            .get(index)
            .ok_or_else(|| CompileError::MissingChild {
                kind: self.kind.name().to_string(),
                slot: self
                    .kind
                    .slot_names()
                    .get(index)
                    .map_or_else(|| index.to_string(), |s| s.to_string()),
            })?
            .extract()
    }

    pub fn unary<A, R>(
        &self,
        f: impl Fn(A) -> Result<R, Fault> + 'static,
    ) -> Result<Translation, CompileError>
    where
        A: NativeValue,
        R: NativeValue,
    {
        Ok(Translation::new(lift(f, self.get::<A>(0)?)))
    }

    pub fn binary<A, B, R>(
        &self,
        f: impl Fn(A, B) -> Result<R, Fault> + 'static,
    ) -> Result<Translation, CompileError>
    where
        A: NativeValue,
        B: NativeValue,
        R: NativeValue,
    {
        Ok(Translation::new(lift2(f, self.get::<A>(0)?, self.get::<B>(1)?)))
    }

    pub fn ternary<A, B, C, R>(
        &self,
        f: impl Fn(A, B, C) -> Result<R, Fault> + 'static,
    ) -> Result<Translation, CompileError>
    where
        A: NativeValue,
        B: NativeValue,
        C: NativeValue,
        R: NativeValue,
    {
        Ok(Translation::new(lift3(
            f,
            self.get::<A>(0)?,
            self.get::<B>(1)?,
            self.get::<C>(2)?,
        )))
    }
}

fn micros(duration: Duration) -> Result<i64, Fault> {
    duration.num_microseconds().ok_or(Fault::Overflow)
}

fn scale_duration(duration: Duration, factor: f64) -> Result<Duration, Fault> {
    let scaled = micros(duration)? as f64 * factor;
    if scaled.is_finite() && scaled.abs() < i64::MAX as f64 {
        Ok(Duration::microseconds(scaled.round() as i64))
    } else {
        Err(Fault::Overflow)
    }
}

fn nonzero_decimal(divisor: f64) -> Result<f64, Fault> {
    if divisor == 0.0 {
        Err(Fault::DivisionByZero)
    } else {
        Ok(divisor)
    }
}

fn comparison<T: NativeValue + PartialOrd>(
    arguments: &Arguments,
) -> Result<Translation, CompileError> {
    let test: fn(&T, &T) -> bool = match arguments.kind {
        NodeKind::Greater => PartialOrd::gt,
        NodeKind::GreaterOrEquals => PartialOrd::ge,
        NodeKind::Lesser => PartialOrd::lt,
        _ => PartialOrd::le,
    };
    arguments.binary(move |a: T, b: T| Ok(test(&a, &b)))
}

fn extremum<T: NativeValue + PartialOrd>(
    arguments: &Arguments,
) -> Result<Translation, CompileError> {
    let take_max = *arguments.kind == NodeKind::Max;
    arguments.binary(move |a: T, b: T| {
        let a_wins = if take_max { a >= b } else { a <= b };
        Ok(if a_wins { a } else { b })
    })
}

/// Builds the reactor for a signature-driven node once its arguments have
/// been coerced to the parameters of `signature`.
pub(super) fn instantiate(
    kind: &NodeKind,
    signature: &Signature,
    translations: &[Translation],
) -> Result<Translation, CompileError> {
    use NativeType as N;
    use NodeKind as K;

    let natives: Vec<NativeType> = signature
        .params
        .iter()
        .filter_map(CanvasType::native_type)
        .collect();
    let args = Arguments { kind, translations };
    match (kind, natives.as_slice()) {
        (K::Addition, [N::Integer, N::Integer]) => {
            args.binary(|a: Quantity, b: Quantity| a.checked_add(b).ok_or(Fault::Overflow))
        }
        (K::Addition, [N::Decimal, N::Decimal]) => args.binary(|a: f64, b: f64| Ok(a + b)),
        (K::Addition, [N::Money, N::Money]) => args.binary(|a: Money, b: Money| Ok(a + b)),
        (K::Addition, [N::Duration, N::Duration]) => {
            args.binary(|a: Duration, b: Duration| a.checked_add(&b).ok_or(Fault::Overflow))
        }
        (K::Addition, [N::DateTime, N::Duration]) => args.binary(|a: NaiveDateTime, b: Duration| {
            a.checked_add_signed(b).ok_or(Fault::Overflow)
        }),
        (K::Addition, [N::Duration, N::DateTime]) => args.binary(|a: Duration, b: NaiveDateTime| {
            b.checked_add_signed(a).ok_or(Fault::Overflow)
        }),
        (K::Addition, [N::Text, N::Text]) => args.binary(|a: String, b: String| Ok(a + &b)),

        (K::Subtraction, [N::Integer, N::Integer]) => {
            args.binary(|a: Quantity, b: Quantity| a.checked_sub(b).ok_or(Fault::Overflow))
        }
        (K::Subtraction, [N::Decimal, N::Decimal]) => args.binary(|a: f64, b: f64| Ok(a - b)),
        (K::Subtraction, [N::Money, N::Money]) => args.binary(|a: Money, b: Money| Ok(a - b)),
        (K::Subtraction, [N::DateTime, N::DateTime]) => {
            args.binary(|a: NaiveDateTime, b: NaiveDateTime| Ok(a.signed_duration_since(b)))
        }
        (K::Subtraction, [N::DateTime, N::Duration]) => {
            args.binary(|a: NaiveDateTime, b: Duration| {
                a.checked_sub_signed(b).ok_or(Fault::Overflow)
            })
        }
        (K::Subtraction, [N::Duration, N::Duration]) => {
            args.binary(|a: Duration, b: Duration| a.checked_sub(&b).ok_or(Fault::Overflow))
        }

        (K::Multiplication, [N::Integer, N::Integer]) => {
            args.binary(|a: Quantity, b: Quantity| a.checked_mul(b).ok_or(Fault::Overflow))
        }
        (K::Multiplication, [N::Decimal, N::Decimal]) => args.binary(|a: f64, b: f64| Ok(a * b)),
        (K::Multiplication, [N::Money, N::Integer]) => {
            args.binary(|a: Money, b: Quantity| Ok(a.times(b)))
        }
        (K::Multiplication, [N::Integer, N::Money]) => {
            args.binary(|a: Quantity, b: Money| Ok(b.times(a)))
        }
        (K::Multiplication, [N::Money, N::Decimal]) => args.binary(|a: Money, b: f64| Ok(a.scale(b))),
        (K::Multiplication, [N::Decimal, N::Money]) => args.binary(|a: f64, b: Money| Ok(b.scale(a))),
        (K::Multiplication, [N::Duration, N::Integer]) => {
            args.binary(|a: Duration, b: Quantity| scale_duration(a, b as f64))
        }
        (K::Multiplication, [N::Integer, N::Duration]) => {
            args.binary(|a: Quantity, b: Duration| scale_duration(b, a as f64))
        }
        (K::Multiplication, [N::Duration, N::Decimal]) => {
            args.binary(|a: Duration, b: f64| scale_duration(a, b))
        }
        (K::Multiplication, [N::Decimal, N::Duration]) => {
            args.binary(|a: f64, b: Duration| scale_duration(b, a))
        }

        (K::Division, [N::Decimal, N::Decimal]) => {
            args.binary(|a: f64, b: f64| Ok(a / nonzero_decimal(b)?))
        }
        (K::Division, [N::Money, N::Integer]) => args.binary(|a: Money, b: Quantity| {
            if b == 0 {
                Err(Fault::DivisionByZero)
            } else {
                a.checked_div(b).ok_or(Fault::Overflow)
            }
        }),
        (K::Division, [N::Money, N::Decimal]) => {
            args.binary(|a: Money, b: f64| Ok(a.scale(1.0 / nonzero_decimal(b)?)))
        }
        (K::Division, [N::Money, N::Money]) => args.binary(|a: Money, b: Money| {
            if b.is_zero() {
                Err(Fault::DivisionByZero)
            } else {
                Ok(a.raw() as f64 / b.raw() as f64)
            }
        }),
        (K::Division, [N::Duration, N::Integer]) => args.binary(|a: Duration, b: Quantity| {
            if b == 0 {
                Err(Fault::DivisionByZero)
            } else {
                micros(a)?
                    .checked_div(b)
                    .map(Duration::microseconds)
                    .ok_or(Fault::Overflow)
            }
        }),
        (K::Division, [N::Duration, N::Decimal]) => {
            args.binary(|a: Duration, b: f64| scale_duration(a, 1.0 / nonzero_decimal(b)?))
        }
        (K::Division, [N::Duration, N::Duration]) => args.binary(|a: Duration, b: Duration| {
            let divisor = micros(b)?;
            if divisor == 0 {
                Err(Fault::DivisionByZero)
            } else {
                Ok(micros(a)? as f64 / divisor as f64)
            }
        }),

        (K::Max | K::Min, [native, _]) => with_ordered_type!(*native, T => extremum::<T>(&args), _ => {
            Err(no_instance(kind, signature))
        }),

        (K::Abs, [N::Integer]) => args.unary(|a: Quantity| a.checked_abs().ok_or(Fault::Overflow)),
        (K::Abs, [N::Decimal]) => args.unary(|a: f64| Ok(a.abs())),
        (K::Abs, [N::Money]) => args.unary(|a: Money| a.checked_abs().ok_or(Fault::Overflow)),
        (K::Abs, [N::Duration]) => {
            args.unary(|a: Duration| Ok(if a < Duration::zero() { -a } else { a }))
        }

        (K::Floor, [N::Decimal, N::Decimal]) => args.binary(|a: f64, b: f64| Ok(floor_to(a, b))),
        (K::Ceil, [N::Decimal, N::Decimal]) => args.binary(|a: f64, b: f64| Ok(ceil_to(a, b))),
        (K::Round, [N::Decimal, N::Decimal]) => args.binary(|a: f64, b: f64| Ok(round_to(a, b))),
        (K::Floor, [N::Money, N::Money]) => {
            args.binary(|a: Money, b: Money| a.floor_to(b).ok_or(Fault::Overflow))
        }
        (K::Ceil, [N::Money, N::Money]) => {
            args.binary(|a: Money, b: Money| a.ceil_to(b).ok_or(Fault::Overflow))
        }
        (K::Round, [N::Money, N::Money]) => {
            args.binary(|a: Money, b: Money| a.round_to(b).ok_or(Fault::Overflow))
        }
        (K::Floor, [N::Duration, N::Duration]) => {
            args.binary(|a: Duration, b: Duration| floor_duration(a, b).ok_or(Fault::Overflow))
        }
        (K::Ceil, [N::Duration, N::Duration]) => {
            args.binary(|a: Duration, b: Duration| ceil_duration(a, b).ok_or(Fault::Overflow))
        }
        (K::Round, [N::Duration, N::Duration]) => {
            args.binary(|a: Duration, b: Duration| round_duration(a, b).ok_or(Fault::Overflow))
        }

        (K::Not, [N::Bool]) => args.unary(|a: bool| Ok(!a)),
        (K::Not, [N::Side]) => args.unary(|a: Side| Ok(a.opposite())),
        (K::IsTerminal, [N::OrderStatus]) => {
            args.unary(|status: OrderStatus| Ok(status.is_terminal()))
        }

        (K::Equals, [native, _]) => with_native_type!(*native, T => {
            args.binary(|a: T, b: T| Ok(a == b))
        }),
        (K::Unequal, [native, _]) => with_native_type!(*native, T => {
            args.binary(|a: T, b: T| Ok(a != b))
        }),
        (K::Greater | K::GreaterOrEquals | K::Lesser | K::LesserOrEquals, [native, _]) => {
            with_ordered_type!(*native, T => comparison::<T>(&args), _ => {
                Err(no_instance(kind, signature))
            })
        }

        (K::If, [N::Bool, native, _]) => with_native_type!(*native, T => {
            args.ternary(|condition: bool, consequent: T, default: T| {
                Ok(if condition { consequent } else { default })
            })
        }),

        _ => Err(no_instance(kind, signature)),
    }
}

fn no_instance(kind: &NodeKind, signature: &Signature) -> CompileError {
    CompileError::NoMatchingSignature {
        kind: kind.name().to_string(),
        arguments: signature.to_string(),
    }
}
