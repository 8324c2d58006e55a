//! Market data port trait.
//!
//! Queries deliver records into a sink until the requested range is
//! exhausted, then drop the sink to close the stream.

use crate::domain::market::{BboQuote, OrderImbalance, SecurityQuery, TimeAndSale, VenueQuery};
use crate::domain::reactor::QueueSink;

pub trait MarketDataClient {
    fn query_time_and_sales(&self, query: SecurityQuery, sink: QueueSink<TimeAndSale>);

    fn query_bbo_quotes(&self, query: SecurityQuery, sink: QueueSink<BboQuote>);

    fn query_order_imbalances(&self, query: VenueQuery, sink: QueueSink<OrderImbalance>);
}
