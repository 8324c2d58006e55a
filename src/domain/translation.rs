//! Type-erased handle to a compiled series.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::domain::error::{CompileError, Fault};
use crate::domain::reactor::{constant, lift, Root, Series, State};
use crate::domain::types::NativeType;
use crate::domain::value::{Money, NativeValue, Quantity, Value};

/// Expands `$body` once per native type with `$t` aliased to the matching
/// Rust type.
macro_rules! with_native_type {
    ($native:expr, $t:ident => $body:expr) => {{
        use $crate::domain::types::NativeType as __Native;
        match $native {
            __Native::Bool => { type $t = bool; $body }
            __Native::Integer => { type $t = $crate::domain::value::Quantity; $body }
            __Native::Decimal => { type $t = f64; $body }
            __Native::Money => { type $t = $crate::domain::value::Money; $body }
            __Native::Currency => { type $t = $crate::domain::value::Currency; $body }
            __Native::Duration => { type $t = ::chrono::Duration; $body }
            __Native::DateTime => { type $t = ::chrono::NaiveDateTime; $body }
            __Native::Text => { type $t = String; $body }
            __Native::Security => { type $t = $crate::domain::value::Security; $body }
            __Native::Venue => { type $t = $crate::domain::value::Venue; $body }
            __Native::Side => { type $t = $crate::domain::value::Side; $body }
            __Native::OrderType => { type $t = $crate::domain::value::OrderType; $body }
            __Native::TimeInForce => { type $t = $crate::domain::value::TimeInForce; $body }
            __Native::OrderStatus => { type $t = $crate::domain::value::OrderStatus; $body }
            __Native::Order => { type $t = $crate::domain::order::OrderHandle; $body }
            __Native::Record => { type $t = $crate::domain::value::Record; $body }
        }
    }};
}

/// Like [`with_native_type`] restricted to ordered types; anything else
/// evaluates `$fallback`.
macro_rules! with_ordered_type {
    ($native:expr, $t:ident => $body:expr, _ => $fallback:expr) => {{
        use $crate::domain::types::NativeType as __Native;
        match $native {
            __Native::Integer => { type $t = $crate::domain::value::Quantity; $body }
            __Native::Decimal => { type $t = f64; $body }
            __Native::Money => { type $t = $crate::domain::value::Money; $body }
            __Native::Duration => { type $t = ::chrono::Duration; $body }
            __Native::DateTime => { type $t = ::chrono::NaiveDateTime; $body }
            __Native::Text => { type $t = String; $body }
            _ => $fallback,
        }
    }};
}

pub(crate) use with_native_type;
pub(crate) use with_ordered_type;

/// Object-safe view of a `Series<T>`.
pub trait ErasedSeries {
    fn native_type(&self) -> NativeType;

    fn commit(&self, sequence: u64) -> State;

    /// The latest evaluation, if any, as a dynamic value.
    fn value(&self) -> Option<Result<Value, Fault>>;

    fn as_any(&self) -> &dyn Any;
}

impl<T: NativeValue> ErasedSeries for Series<T> {
    fn native_type(&self) -> NativeType {
        T::NATIVE
    }

    fn commit(&self, sequence: u64) -> State {
        Series::commit(self, sequence)
    }

    fn value(&self) -> Option<Result<Value, Fault>> {
        self.has_value()
            .then(|| self.eval().map(NativeValue::into_value))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A compiled node: a series of some native type.
#[derive(Clone)]
pub struct Translation {
    series: Rc<dyn ErasedSeries>,
}

impl Translation {
    pub fn new<T: NativeValue>(series: Series<T>) -> Self {
        Self {
            series: Rc::new(series),
        }
    }

    /// A series evaluating once to `value`.
    pub fn constant(value: Value) -> Self {
        match value {
            Value::Bool(v) => Translation::new(constant(v)),
            Value::Integer(v) => Translation::new(constant(v)),
            Value::Decimal(v) => Translation::new(constant(v)),
            Value::Money(v) => Translation::new(constant(v)),
            Value::Currency(v) => Translation::new(constant(v)),
            Value::Duration(v) => Translation::new(constant(v)),
            Value::DateTime(v) => Translation::new(constant(v)),
            Value::Text(v) => Translation::new(constant(v)),
            Value::Security(v) => Translation::new(constant(v)),
            Value::Venue(v) => Translation::new(constant(v)),
            Value::Side(v) => Translation::new(constant(v)),
            Value::OrderType(v) => Translation::new(constant(v)),
            Value::TimeInForce(v) => Translation::new(constant(v)),
            Value::OrderStatus(v) => Translation::new(constant(v)),
            Value::Order(v) => Translation::new(constant(v)),
            Value::Record(v) => Translation::new(constant(v)),
        }
    }

    pub fn native_type(&self) -> NativeType {
        self.series.native_type()
    }

    /// Recovers the typed series.
    pub fn extract<T: NativeValue>(&self) -> Result<Series<T>, CompileError> {
        self.series
            .as_any()
            .downcast_ref::<Series<T>>()
            .cloned()
            .ok_or_else(|| CompileError::TypeMismatch {
                expected: T::NATIVE.name().to_string(),
                found: self.native_type().name().to_string(),
            })
    }

    /// Whether both translations share the same underlying series.
    pub fn ptr_eq(&self, other: &Translation) -> bool {
        Rc::ptr_eq(&self.series, &other.series)
    }

    pub fn value(&self) -> Option<Result<Value, Fault>> {
        self.series.value()
    }

    /// Converts to `target`, widening integers into decimals or money.
    pub fn coerce(&self, target: NativeType) -> Result<Translation, CompileError> {
        match (self.native_type(), target) {
            (from, to) if from == to => Ok(self.clone()),
            (NativeType::Integer, NativeType::Decimal) => Ok(Translation::new(lift(
                |v: Quantity| Ok(v as f64),
                self.extract::<Quantity>()?,
            ))),
            (NativeType::Integer, NativeType::Money) => Ok(Translation::new(lift(
                |v: Quantity| Ok(Money::from_units(v)),
                self.extract::<Quantity>()?,
            ))),
            (from, to) => Err(CompileError::TypeMismatch {
                expected: to.name().to_string(),
                found: from.name().to_string(),
            }),
        }
    }

    /// The same series viewed as dynamic values.
    pub fn to_values(&self) -> Result<Series<Value>, CompileError> {
        with_native_type!(self.native_type(), T => {
            Ok(lift(|v: T| Ok(v.into_value()), self.extract::<T>()?))
        })
    }
}

impl Root for Translation {
    fn commit(&self, sequence: u64) -> State {
        self.series.commit(sequence)
    }
}

impl fmt::Debug for Translation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translation")
            .field("native", &self.native_type())
            .finish()
    }
}
