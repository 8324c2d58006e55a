use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;

use crate::domain::reactor::QueueSink;
use crate::domain::value::{
    Currency, Money, OrderStatus, OrderType, Quantity, Record, Security, Side, TimeInForce, Value,
    Venue,
};

/// Everything needed to submit an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFields {
    pub account: String,
    pub security: Security,
    pub currency: Currency,
    pub order_type: OrderType,
    pub side: Side,
    pub destination: Venue,
    pub quantity: Quantity,
    pub price: Money,
    pub time_in_force: TimeInForce,
    /// Additional tag fields, in declaration order.
    pub extra: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub order_id: u64,
    pub sequence: u32,
    pub status: OrderStatus,
    pub last_quantity: Quantity,
    pub last_price: Money,
    pub timestamp: NaiveDateTime,
    pub text: String,
}

impl ExecutionReport {
    /// A report with no fill. The order id and sequence are assigned on
    /// publication.
    pub fn status(status: OrderStatus, timestamp: NaiveDateTime) -> Self {
        Self {
            order_id: 0,
            sequence: 0,
            status,
            last_quantity: 0,
            last_price: Money::ZERO,
            timestamp,
            text: String::new(),
        }
    }

    pub fn fill(
        status: OrderStatus,
        quantity: Quantity,
        price: Money,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            last_quantity: quantity,
            last_price: price,
            ..Self::status(status, timestamp)
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Fields follow [`crate::domain::types::execution_report_type`].
    pub fn to_record(&self) -> Record {
        Record::new(vec![
            Value::Integer(self.order_id as Quantity),
            Value::Integer(Quantity::from(self.sequence)),
            Value::OrderStatus(self.status),
            Value::Integer(self.last_quantity),
            Value::Money(self.last_price),
            Value::DateTime(self.timestamp),
            Value::Text(self.text.clone()),
        ])
    }
}

struct ReportLog {
    reports: Vec<ExecutionReport>,
    subscribers: Vec<QueueSink<ExecutionReport>>,
}

struct OrderState {
    id: u64,
    fields: OrderFields,
    log: Mutex<ReportLog>,
}

/// Shared handle to a submitted order and its execution report history.
#[derive(Clone)]
pub struct OrderHandle {
    inner: Arc<OrderState>,
}

impl OrderHandle {
    pub fn new(id: u64, fields: OrderFields) -> Self {
        Self {
            inner: Arc::new(OrderState {
                id,
                fields,
                log: Mutex::new(ReportLog {
                    reports: Vec::new(),
                    subscribers: Vec::new(),
                }),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn fields(&self) -> &OrderFields {
        &self.inner.fields
    }

    /// Appends a report and forwards it to every monitor. Reports after a
    /// terminal status are ignored; a terminal report closes all monitors.
    pub fn publish(&self, mut report: ExecutionReport) -> bool {
        let mut log = self.inner.log.lock();
        if log
            .reports
            .last()
            .is_some_and(|last| last.status.is_terminal())
        {
            return false;
        }
        report.order_id = self.inner.id;
        report.sequence = log.reports.len() as u32;
        log.subscribers.retain(|sink| sink.push(report.clone()));
        if report.status.is_terminal() {
            log.subscribers.clear();
        }
        log.reports.push(report);
        true
    }

    /// Replays the history into `sink`, then streams new reports until the
    /// order is terminal.
    pub fn monitor(&self, sink: QueueSink<ExecutionReport>) {
        let mut log = self.inner.log.lock();
        for report in &log.reports {
            sink.push(report.clone());
        }
        let terminal = log
            .reports
            .last()
            .is_some_and(|last| last.status.is_terminal());
        if !terminal {
            log.subscribers.push(sink);
        }
    }

    pub fn reports(&self) -> Vec<ExecutionReport> {
        self.inner.log.lock().reports.clone()
    }

    pub fn status(&self) -> OrderStatus {
        self.inner
            .log
            .lock()
            .reports
            .last()
            .map_or(OrderStatus::PendingNew, |r| r.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.inner
            .log
            .lock()
            .reports
            .iter()
            .map(|r| r.last_quantity)
            .sum()
    }
}

impl PartialEq for OrderHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderHandle")
            .field("id", &self.inner.id)
            .field("security", &self.inner.fields.security)
            .field("side", &self.inner.fields.side)
            .field("quantity", &self.inner.fields.quantity)
            .finish()
    }
}
