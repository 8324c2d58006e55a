//! Market data records delivered by a market data client.

use chrono::NaiveDateTime;

use crate::domain::value::{Money, Quantity, Record, Security, Side, Value, Venue};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeAndSale {
    pub timestamp: NaiveDateTime,
    pub price: Money,
    pub size: Quantity,
    pub market_center: String,
}

impl TimeAndSale {
    /// Fields follow [`crate::domain::types::time_and_sale_type`].
    pub fn to_record(&self) -> Record {
        Record::new(vec![
            Value::DateTime(self.timestamp),
            Value::Money(self.price),
            Value::Integer(self.size),
            Value::Text(self.market_center.clone()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub price: Money,
    pub size: Quantity,
    pub side: Side,
}

/// Best bid and offer at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct BboQuote {
    pub bid: Quote,
    pub ask: Quote,
    pub timestamp: NaiveDateTime,
}

impl BboQuote {
    /// The quote on `side`, following [`crate::domain::types::quote_type`].
    pub fn side_record(&self, side: Side) -> Record {
        let quote = side.pick(&self.ask, &self.bid);
        Record::new(vec![
            Value::Money(quote.price),
            Value::Integer(quote.size),
            Value::Side(quote.side),
            Value::DateTime(self.timestamp),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderImbalance {
    pub security: Security,
    pub side: Side,
    pub size: Quantity,
    pub reference_price: Money,
    pub timestamp: NaiveDateTime,
}

impl OrderImbalance {
    /// Fields follow [`crate::domain::types::order_imbalance_type`].
    pub fn to_record(&self) -> Record {
        Record::new(vec![
            Value::Security(self.security.clone()),
            Value::Side(self.side),
            Value::Integer(self.size),
            Value::Money(self.reference_price),
            Value::DateTime(self.timestamp),
        ])
    }
}

/// Window of a market data query. A missing end streams in real time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    /// Everything from `start` onward, including live updates.
    pub fn real_time(start: NaiveDateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| timestamp >= start)
            && self.end.is_none_or(|end| timestamp <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotLimit {
    #[default]
    Unlimited,
    /// Only the most recent `n` historical records.
    Tail(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuery<I> {
    pub index: I,
    pub range: TimeRange,
    pub snapshot_limit: SnapshotLimit,
}

impl<I> MarketQuery<I> {
    pub fn real_time(index: I, start: NaiveDateTime) -> Self {
        Self {
            index,
            range: TimeRange::real_time(start),
            snapshot_limit: SnapshotLimit::Unlimited,
        }
    }
}

pub type SecurityQuery = MarketQuery<Security>;
pub type VenueQuery = MarketQuery<Venue>;
