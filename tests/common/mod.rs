#![allow(dead_code)]

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use tradeflow::adapters::simulated_order_adapter::SimulatedOrderClient;
use tradeflow::domain::context::CompilationContext;
use tradeflow::domain::error::Fault;
use tradeflow::domain::node::{Node, NodeKind};
use tradeflow::domain::order::OrderFields;
use tradeflow::domain::reactor::Runner;
use tradeflow::domain::session::SimulationSettings;
use tradeflow::domain::translation::Translation;
use tradeflow::domain::value::{
    Currency, Money, OrderType, Security, Side, TimeInForce, Value, Venue,
};
use tradeflow::ports::script_port::{Script, ScriptHost};
use tradeflow::ports::time_port::TimeClient;

pub const ACCOUNT: &str = "ACC-TEST";

pub fn at(hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(hour, min, sec)
        .unwrap()
}

pub struct FixedClock(pub NaiveDateTime);

impl TimeClient for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn fixed_clock() -> Rc<dyn TimeClient> {
    Rc::new(FixedClock(at(10, 0, 0)))
}

/// A context with a fixed clock and nothing else attached.
pub fn bare_context<'a>() -> CompilationContext<'a> {
    CompilationContext::new(ACCOUNT, fixed_clock()).unwrap()
}

pub fn simulated_venue(auto_fill: bool, reject_above: Option<i64>) -> Rc<SimulatedOrderClient> {
    Rc::new(SimulatedOrderClient::new(
        SimulationSettings {
            auto_fill,
            reject_above,
        },
        fixed_clock(),
    ))
}

/// A script host whose scripts sum their integer parameters. Loading a path
/// named `missing.py` fails.
pub struct SummingScriptHost;

struct SumScript;

impl Script for SumScript {
    fn call(&mut self, parameters: &[Value]) -> Result<Value, String> {
        parameters
            .iter()
            .map(|p| match p {
                Value::Integer(i) => Ok(*i),
                other => Err(format!("cannot sum {other}")),
            })
            .sum::<Result<i64, String>>()
            .map(Value::Integer)
    }
}

impl ScriptHost for SummingScriptHost {
    fn load(&self, path: &Path) -> Result<Box<dyn Script>, String> {
        if path.file_name().is_some_and(|name| name == "missing.py") {
            return Err(format!("{} not found", path.display()));
        }
        Ok(Box::new(SumScript))
    }
}

pub fn binary(kind: NodeKind, left: Node, right: Node) -> Node {
    Node::new(kind, vec![left, right]).unwrap()
}

pub fn money(value: f64) -> Node {
    Node::value(Money::from_f64(value))
}

pub struct OrderFieldsBuilder {
    fields: OrderFields,
}

impl OrderFieldsBuilder {
    pub fn new() -> Self {
        Self {
            fields: OrderFields {
                account: ACCOUNT.into(),
                security: Security::new("BHP", "ASX"),
                currency: Currency::default(),
                order_type: OrderType::Limit,
                side: Side::Bid,
                destination: Venue::new("ASX"),
                quantity: 100,
                price: Money::from_f64(45.10),
                time_in_force: TimeInForce::Day,
                extra: Vec::new(),
            },
        }
    }

    pub fn quantity(mut self, quantity: i64) -> Self {
        self.fields.quantity = quantity;
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.fields.price = Money::from_f64(price);
        self
    }

    pub fn side(mut self, side: Side) -> Self {
        self.fields.side = side;
        self
    }

    pub fn build(self) -> OrderFields {
        self.fields
    }
}

/// Commits `root` until it completes or idles, collecting every value.
pub fn evaluate(
    context: &CompilationContext<'_>,
    root: &Translation,
    max_ticks: u64,
) -> Vec<Result<Value, Fault>> {
    let mut runner = Runner::new(context.trigger().clone());
    let mut values = Vec::new();
    runner.run(root, max_ticks, Duration::from_millis(100), |_, state| {
        if state.has_evaluation() {
            if let Some(value) = root.value() {
                values.push(value);
            }
        }
    });
    values
}
