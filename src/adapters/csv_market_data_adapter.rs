//! Time and sales replay from a CSV recording.
//!
//! Rows are `timestamp,symbol,venue,price,size,market_center` with a header
//! line. A query replays the recording rebased so its first trade lands on
//! the query's start time, then closes the stream.

use std::path::Path;
use std::thread;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::error::TradeflowError;
use crate::domain::market::{
    BboQuote, OrderImbalance, SecurityQuery, SnapshotLimit, TimeAndSale, VenueQuery,
};
use crate::domain::reactor::QueueSink;
use crate::domain::value::{Money, Quantity, Security};
use crate::ports::market_data_port::MarketDataClient;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Clone)]
struct Trade {
    security: Security,
    sale: TimeAndSale,
}

pub struct CsvMarketDataClient {
    trades: Vec<Trade>,
}

fn market_data_err(reason: String) -> TradeflowError {
    TradeflowError::MarketData { reason }
}

fn column<'r>(record: &'r csv::StringRecord, index: usize, name: &str) -> Result<&'r str, TradeflowError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| market_data_err(format!("missing {name} column")))
}

impl CsvMarketDataClient {
    pub fn from_file(path: &Path) -> Result<Self, TradeflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            market_data_err(format!("failed to read {}: {}", path.display(), e))
        })?;
        let client = Self::from_csv(&content)?;
        info!(path = %path.display(), trades = client.trades.len(), "loaded time and sales");
        Ok(client)
    }

    pub fn from_csv(content: &str) -> Result<Self, TradeflowError> {
        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut trades = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| market_data_err(format!("CSV parse error: {}", e)))?;

            let timestamp = NaiveDateTime::parse_from_str(
                column(&record, 0, "timestamp")?,
                TIMESTAMP_FORMAT,
            )
            .map_err(|e| market_data_err(format!("invalid timestamp: {}", e)))?;
            let security = Security::new(
                column(&record, 1, "symbol")?,
                column(&record, 2, "venue")?,
            );
            let price: Money = column(&record, 3, "price")?
                .parse()
                .map_err(|e| market_data_err(format!("invalid price value: {}", e)))?;
            let size: Quantity = column(&record, 4, "size")?
                .parse()
                .map_err(|e| market_data_err(format!("invalid size value: {}", e)))?;
            let market_center = record.get(5).unwrap_or_default().trim().to_string();

            trades.push(Trade {
                security,
                sale: TimeAndSale {
                    timestamp,
                    price,
                    size,
                    market_center,
                },
            });
        }
        trades.sort_by_key(|t| t.sale.timestamp);
        Ok(Self { trades })
    }

    /// The recorded trades of a security, rebased and cut to the query.
    fn replay(&self, query: &SecurityQuery) -> Vec<TimeAndSale> {
        let mut sales: Vec<TimeAndSale> = self
            .trades
            .iter()
            .filter(|t| t.security == query.index)
            .map(|t| t.sale.clone())
            .collect();
        if let (Some(start), Some(first)) = (query.range.start, sales.first()) {
            let shift = start - first.timestamp;
            for sale in &mut sales {
                sale.timestamp += shift;
            }
        }
        sales.retain(|sale| query.range.contains(sale.timestamp));
        if let SnapshotLimit::Tail(n) = query.snapshot_limit {
            let skip = sales.len().saturating_sub(n);
            sales.drain(..skip);
        }
        sales
    }
}

impl MarketDataClient for CsvMarketDataClient {
    fn query_time_and_sales(&self, query: SecurityQuery, sink: QueueSink<TimeAndSale>) {
        let sales = self.replay(&query);
        debug!(security = %query.index, count = sales.len(), "replaying time and sales");
        let spawned = thread::Builder::new()
            .name("tradeflow-replay".into())
            .spawn(move || {
                for sale in sales {
                    if !sink.push(sale) {
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            warn!(%err, "failed to start time and sales replay");
        }
    }

    fn query_bbo_quotes(&self, query: SecurityQuery, _sink: QueueSink<BboQuote>) {
        debug!(security = %query.index, "no BBO quotes recorded");
    }

    fn query_order_imbalances(&self, query: VenueQuery, _sink: QueueSink<OrderImbalance>) {
        debug!(venue = %query.index, "no order imbalances recorded");
    }
}
