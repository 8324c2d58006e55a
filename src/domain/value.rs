//! Native values carried through a compiled graph.
//!
//! Every concrete series in the reactive runtime produces one of the types in
//! this module. [`Value`] is the dynamically typed union of all of them and is
//! used wherever a value crosses a type-erased boundary (literal nodes, records,
//! order tag fields, scripts).

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};

use crate::domain::order::handle::OrderHandle;
use crate::domain::types::{CanvasType, NativeType, RecordType};

/// Signed share or contract count.
pub type Quantity = i64;

/// Fixed point monetary amount with six decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    pub const MULTIPLIER: i64 = 1_000_000;
    pub const ZERO: Money = Money(0);
    pub const ONE: Money = Money(Self::MULTIPLIER);
    pub const CENT: Money = Money(Self::MULTIPLIER / 100);

    pub fn from_raw(raw: i64) -> Self {
        Money(raw)
    }

    pub fn from_units(units: i64) -> Self {
        Money(units.saturating_mul(Self::MULTIPLIER))
    }

    pub fn from_f64(value: f64) -> Self {
        Money((value * Self::MULTIPLIER as f64).round() as i64)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::MULTIPLIER as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_abs(self) -> Option<Money> {
        self.0.checked_abs().map(Money)
    }

    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// `None` for a zero divisor or an out of range quotient.
    pub fn checked_div(self, quantity: Quantity) -> Option<Money> {
        self.0.checked_div(quantity).map(Money)
    }

    pub fn scale(self, factor: f64) -> Self {
        Money((self.0 as f64 * factor).round() as i64)
    }

    pub fn times(self, quantity: Quantity) -> Self {
        Money(self.0.saturating_mul(quantity))
    }

    /// Rounds down to a multiple of `multiple`. `None` if the result leaves
    /// the representable range.
    pub fn floor_to(self, multiple: Money) -> Option<Money> {
        if multiple.is_zero() {
            return Some(Money::ZERO);
        }
        floor_div(self.0, multiple.0)?.checked_mul(multiple.0).map(Money)
    }

    pub fn ceil_to(self, multiple: Money) -> Option<Money> {
        if multiple.is_zero() {
            return Some(Money::ZERO);
        }
        ceil_div(self.0, multiple.0)?.checked_mul(multiple.0).map(Money)
    }

    pub fn round_to(self, multiple: Money) -> Option<Money> {
        if multiple.is_zero() {
            return Some(Money::ZERO);
        }
        let steps = (self.0 as f64 / multiple.0 as f64).round() as i64;
        steps.checked_mul(multiple.0).map(Money)
    }
}

fn floor_div(numerator: i64, denominator: i64) -> Option<i64> {
    let quotient = numerator.checked_div(denominator)?;
    if numerator % denominator != 0 && ((numerator < 0) != (denominator < 0)) {
        quotient.checked_sub(1)
    } else {
        Some(quotient)
    }
}

fn ceil_div(numerator: i64, denominator: i64) -> Option<i64> {
    let quotient = numerator.checked_div(denominator)?;
    if numerator % denominator != 0 && ((numerator < 0) == (denominator < 0)) {
        quotient.checked_add(1)
    } else {
        Some(quotient)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let raw = self.0.unsigned_abs();
        let units = raw / Self::MULTIPLIER as u64;
        let fraction = raw % Self::MULTIPLIER as u64;
        if fraction % 10_000 == 0 {
            write!(f, "{sign}{units}.{:02}", fraction / 10_000)
        } else {
            let digits = format!("{fraction:06}");
            write!(f, "{sign}{units}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|e| format!("invalid money value '{s}': {e}"))?;
        if !value.is_finite() {
            return Err(format!("invalid money value '{s}'"));
        }
        Ok(Money::from_f64(value))
    }
}

/// `floor(value / multiple) * multiple`, or zero for a zero multiple.
pub fn floor_to(value: f64, multiple: f64) -> f64 {
    if multiple == 0.0 {
        return 0.0;
    }
    (value / multiple).floor() * multiple
}

pub fn ceil_to(value: f64, multiple: f64) -> f64 {
    if multiple == 0.0 {
        return 0.0;
    }
    (value / multiple).ceil() * multiple
}

pub fn round_to(value: f64, multiple: f64) -> f64 {
    if multiple == 0.0 {
        return 0.0;
    }
    (value / multiple).round() * multiple
}

pub fn floor_duration(value: Duration, multiple: Duration) -> Option<Duration> {
    match multiple.num_microseconds()? {
        0 => Some(Duration::zero()),
        step => floor_div(value.num_microseconds()?, step)?
            .checked_mul(step)
            .map(Duration::microseconds),
    }
}

pub fn ceil_duration(value: Duration, multiple: Duration) -> Option<Duration> {
    match multiple.num_microseconds()? {
        0 => Some(Duration::zero()),
        step => ceil_div(value.num_microseconds()?, step)?
            .checked_mul(step)
            .map(Duration::microseconds),
    }
}

pub fn round_duration(value: Duration, multiple: Duration) -> Option<Duration> {
    match multiple.num_microseconds()? {
        0 => Some(Duration::zero()),
        step => {
            let steps = (value.num_microseconds()? as f64 / step as f64).round() as i64;
            steps.checked_mul(step).map(Duration::microseconds)
        }
    }
}

/// ISO style currency code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Self {
        Currency(code.trim().to_uppercase())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::new("USD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A market or order destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Venue(String);

impl Venue {
    pub fn new(name: &str) -> Self {
        Venue(name.trim().to_uppercase())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Security {
    pub symbol: String,
    pub venue: Venue,
}

impl Security {
    pub fn new(symbol: &str, venue: &str) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            venue: Venue::new(venue),
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.symbol, self.venue)
    }
}

impl FromStr for Security {
    type Err = String;

    /// Parses `SYMBOL.VENUE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().rsplit_once('.') {
            Some((symbol, venue)) if !symbol.is_empty() && !venue.is_empty() => {
                Ok(Security::new(symbol, venue))
            }
            _ => Err(format!("invalid security '{s}', expected SYMBOL.VENUE")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// Picks `ask` for an ask and `bid` for a bid.
    pub fn pick<T>(self, ask: T, bid: T) -> T {
        match self {
            Side::Ask => ask,
            Side::Bid => bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => f.write_str("BID"),
            Side::Ask => f.write_str("ASK"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BID" | "BUY" | "B" => Ok(Side::Bid),
            "ASK" | "SELL" | "S" | "A" => Ok(Side::Ask),
            other => Err(format!("invalid side '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderType {
    Limit,
    Market,
    Pegged,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Limit => f.write_str("LIMIT"),
            OrderType::Market => f.write_str("MARKET"),
            OrderType::Pegged => f.write_str("PEGGED"),
        }
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LIMIT" => Ok(OrderType::Limit),
            "MARKET" => Ok(OrderType::Market),
            "PEGGED" => Ok(OrderType::Pegged),
            other => Err(format!("invalid order type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeInForce {
    Day,
    Gtc,
    Ioc,
    Fok,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Day => f.write_str("DAY"),
            TimeInForce::Gtc => f.write_str("GTC"),
            TimeInForce::Ioc => f.write_str("IOC"),
            TimeInForce::Fok => f.write_str("FOK"),
        }
    }
}

impl FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DAY" => Ok(TimeInForce::Day),
            "GTC" => Ok(TimeInForce::Gtc),
            "IOC" => Ok(TimeInForce::Ioc),
            "FOK" => Ok(TimeInForce::Fok),
            other => Err(format!("invalid time in force '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderStatus {
    PendingNew,
    New,
    PartiallyFilled,
    PendingCancel,
    Filled,
    Canceled,
    Rejected,
    Expired,
    DoneForDay,
}

impl OrderStatus {
    /// No further execution reports follow a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::DoneForDay
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::PendingNew => "PENDING_NEW",
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::PendingCancel => "PENDING_CANCEL",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::DoneForDay => "DONE_FOR_DAY",
        };
        f.write_str(name)
    }
}

/// An ordered tuple of values; field names live on the [`RecordType`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub fields: Vec<Value>,
}

impl Record {
    pub fn new(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }
}

/// Dynamically typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(Quantity),
    Decimal(f64),
    Money(Money),
    Currency(Currency),
    Duration(Duration),
    DateTime(NaiveDateTime),
    Text(String),
    Security(Security),
    Venue(Venue),
    Side(Side),
    OrderType(OrderType),
    TimeInForce(TimeInForce),
    OrderStatus(OrderStatus),
    Order(OrderHandle),
    Record(Record),
}

impl Value {
    pub fn native_type(&self) -> NativeType {
        match self {
            Value::Bool(_) => NativeType::Bool,
            Value::Integer(_) => NativeType::Integer,
            Value::Decimal(_) => NativeType::Decimal,
            Value::Money(_) => NativeType::Money,
            Value::Currency(_) => NativeType::Currency,
            Value::Duration(_) => NativeType::Duration,
            Value::DateTime(_) => NativeType::DateTime,
            Value::Text(_) => NativeType::Text,
            Value::Security(_) => NativeType::Security,
            Value::Venue(_) => NativeType::Venue,
            Value::Side(_) => NativeType::Side,
            Value::OrderType(_) => NativeType::OrderType,
            Value::TimeInForce(_) => NativeType::TimeInForce,
            Value::OrderStatus(_) => NativeType::OrderStatus,
            Value::Order(_) => NativeType::Order,
            Value::Record(_) => NativeType::Record,
        }
    }

    /// The descriptor of a literal. Records get positional field names.
    pub fn canvas_type(&self) -> CanvasType {
        match self {
            Value::Record(record) => CanvasType::record(RecordType::new(
                record
                    .fields
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (format!("field{i}"), v.canvas_type()))
                    .collect(),
            )),
            other => CanvasType::from_native(other.native_type()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Money(v) => write!(f, "{v}"),
            Value::Currency(v) => write!(f, "{v}"),
            Value::Duration(v) => write!(f, "{}ms", v.num_milliseconds()),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.3f")),
            Value::Text(v) => f.write_str(v),
            Value::Security(v) => write!(f, "{v}"),
            Value::Venue(v) => write!(f, "{v}"),
            Value::Side(v) => write!(f, "{v}"),
            Value::OrderType(v) => write!(f, "{v}"),
            Value::TimeInForce(v) => write!(f, "{v}"),
            Value::OrderStatus(v) => write!(f, "{v}"),
            Value::Order(v) => write!(f, "order #{}", v.id()),
            Value::Record(record) => {
                f.write_str("(")?;
                for (i, field) in record.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A Rust type that can flow through a typed series and be recovered from a
/// [`Value`].
pub trait NativeValue: Clone + PartialEq + fmt::Debug + 'static {
    const NATIVE: NativeType;

    fn into_value(self) -> Value;

    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! native_value {
    ($ty:ty, $variant:ident) => {
        impl NativeValue for $ty {
            const NATIVE: NativeType = NativeType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

native_value!(bool, Bool);
native_value!(Quantity, Integer);
native_value!(f64, Decimal);
native_value!(Money, Money);
native_value!(Currency, Currency);
native_value!(Duration, Duration);
native_value!(NaiveDateTime, DateTime);
native_value!(String, Text);
native_value!(Security, Security);
native_value!(Venue, Venue);
native_value!(Side, Side);
native_value!(OrderType, OrderType);
native_value!(TimeInForce, TimeInForce);
native_value!(OrderStatus, OrderStatus);
native_value!(OrderHandle, Order);
native_value!(Record, Record);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_trims_to_cents() {
        assert_eq!(Money::from_f64(12.5).to_string(), "12.50");
        assert_eq!(Money::from_f64(-0.25).to_string(), "-0.25");
        assert_eq!(Money::from_raw(1_234_567).to_string(), "1.234567");
    }

    #[test]
    fn money_parses_decimal_strings() {
        assert_eq!("10.01".parse::<Money>().unwrap(), Money::from_raw(10_010_000));
        assert!("abc".parse::<Money>().is_err());
        assert!("inf".parse::<Money>().is_err());
    }

    #[test]
    fn money_rounding_to_multiples() {
        let price = Money::from_f64(10.37);
        assert_eq!(price.floor_to(Money::from_f64(0.05)), Some(Money::from_f64(10.35)));
        assert_eq!(price.ceil_to(Money::from_f64(0.05)), Some(Money::from_f64(10.40)));
        assert_eq!(price.round_to(Money::from_f64(0.05)), Some(Money::from_f64(10.35)));
        assert_eq!(price.floor_to(Money::ZERO), Some(Money::ZERO));
    }

    #[test]
    fn money_extremes_do_not_wrap() {
        let floor = Money::from_f64(-1e13);
        assert_eq!(floor.raw(), i64::MIN);
        assert_eq!(floor.checked_abs(), None);
        assert_eq!(floor.checked_neg(), None);
        assert_eq!(floor.checked_div(-1), None);
        assert_eq!(floor.checked_div(0), None);
        assert_eq!(Money::from_f64(-3.0).checked_abs(), Some(Money::from_f64(3.0)));
        assert_eq!(Money::from_raw(i64::MIN).floor_to(Money::from_raw(-1)), None);
        assert_eq!(Money::from_raw(i64::MAX).ceil_to(Money::from_raw(2)), None);
    }

    #[test]
    fn negative_money_floors_away_from_zero() {
        let price = Money::from_f64(-1.01);
        assert_eq!(price.floor_to(Money::from_f64(0.5)), Some(Money::from_f64(-1.5)));
        assert_eq!(price.ceil_to(Money::from_f64(0.5)), Some(Money::from_f64(-1.0)));
    }

    #[test]
    fn decimal_floor_to() {
        assert!((floor_to(7.3, 0.5) - 7.0).abs() < f64::EPSILON);
        assert!((ceil_to(7.3, 0.5) - 7.5).abs() < f64::EPSILON);
        assert!((round_to(7.3, 0.5) - 7.5).abs() < f64::EPSILON);
        assert_eq!(floor_to(7.3, 0.0), 0.0);
    }

    #[test]
    fn duration_rounding() {
        let value = Duration::milliseconds(1_750);
        let second = Duration::seconds(1);
        assert_eq!(floor_duration(value, second), Some(Duration::seconds(1)));
        assert_eq!(ceil_duration(value, second), Some(Duration::seconds(2)));
        assert_eq!(round_duration(value, second), Some(Duration::seconds(2)));
        assert_eq!(floor_duration(value, Duration::zero()), Some(Duration::zero()));
    }

    #[test]
    fn side_opposite_and_pick() {
        assert_eq!(Side::Bid.opposite(), Side::Ask);
        assert_eq!(Side::Ask.pick(1, 2), 1);
        assert_eq!(Side::Bid.pick(1, 2), 2);
    }

    #[test]
    fn security_parses_symbol_and_venue() {
        let security: Security = "bhp.asx".parse().unwrap();
        assert_eq!(security.symbol, "BHP");
        assert_eq!(security.venue, Venue::new("ASX"));
        assert!("BHP".parse::<Security>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PendingCancel.is_terminal());
    }

    #[test]
    fn native_value_round_trips_through_value() {
        let value = Money::from_units(3).into_value();
        assert_eq!(value.native_type(), NativeType::Money);
        assert_eq!(Money::from_value(value), Some(Money::from_units(3)));
        assert_eq!(Quantity::from_value(Value::Bool(true)), None);
    }
}
