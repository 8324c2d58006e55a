//! Simulation sessions.
//!
//! A session turns a validated config into an order program: a catalog
//! template with its open fields filled in, optionally wrapped so the order
//! is cancelled after a delay. The program is compiled and committed until
//! it completes, goes idle, or runs out of ticks.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::catalog;
use crate::domain::config_validation::validate_session_config;
use crate::domain::context::CompilationContext;
use crate::domain::error::{CompileError, Fault, TradeflowError};
use crate::domain::node::{Node, NodeKind};
use crate::domain::order::OrderHandle;
use crate::domain::reactor::{RunOutcome, Runner};
use crate::domain::translator::translate;
use crate::domain::value::{
    Currency, Money, Quantity, Security, Side, TimeInForce, Value, Venue,
};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub account: String,
    pub max_ticks: u64,
    pub idle_timeout: Duration,
    pub entry: String,
    pub security: Security,
    pub currency: Currency,
    pub side: Option<Side>,
    pub destination: Venue,
    pub quantity: Quantity,
    pub price: Money,
    pub time_in_force: TimeInForce,
    pub cancel_after: Option<chrono::Duration>,
    pub simulation: SimulationSettings,
    pub time_and_sales: Option<PathBuf>,
}

/// How the simulated venue treats submitted orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationSettings {
    pub auto_fill: bool,
    /// Orders above this quantity are rejected.
    pub reject_above: Option<Quantity>,
}

impl SessionSettings {
    /// Validates `config` and reads the session out of it.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradeflowError> {
        validate_session_config(config)?;
        let text = |section: &str, key: &str| {
            config
                .get_string(section, key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let parse_err = |key: &str, reason: String| TradeflowError::ConfigInvalid {
            section: "order".into(),
            key: key.into(),
            reason,
        };

        let symbol = text("order", "symbol").unwrap_or_default();
        let venue = text("order", "venue").unwrap_or_default();
        let price = match text("order", "price") {
            Some(s) => s.parse::<Money>().map_err(|e| parse_err("price", e))?,
            None => Money::ZERO,
        };
        let side = match text("order", "side") {
            Some(s) => Some(s.parse::<Side>().map_err(|e| parse_err("side", e))?),
            None => None,
        };
        let time_in_force = match text("order", "time_in_force") {
            Some(s) => s
                .parse::<TimeInForce>()
                .map_err(|e| parse_err("time_in_force", e))?,
            None => TimeInForce::Day,
        };
        let cancel_after_ms = config.get_int("order", "cancel_after_ms", 0);
        let reject_above = config.get_int("simulation", "reject_above", 0);

        Ok(SessionSettings {
            account: text("session", "account").unwrap_or_default(),
            max_ticks: config.get_int("session", "max_ticks", 10_000) as u64,
            idle_timeout: Duration::from_millis(
                config.get_int("session", "idle_timeout_ms", 250) as u64,
            ),
            entry: text("order", "entry").unwrap_or_default(),
            security: Security::new(&symbol, &venue),
            currency: text("order", "currency")
                .map(|code| Currency::new(&code))
                .unwrap_or_default(),
            side,
            destination: Venue::new(&text("order", "destination").unwrap_or(venue)),
            quantity: config.get_int("order", "quantity", 0),
            price,
            time_in_force,
            cancel_after: (cancel_after_ms > 0).then(|| chrono::Duration::milliseconds(cancel_after_ms)),
            simulation: SimulationSettings {
                auto_fill: config.get_bool("simulation", "auto_fill", true),
                reject_above: (reject_above > 0).then_some(reject_above),
            },
            time_and_sales: text("market_data", "time_and_sales").map(PathBuf::from),
        })
    }
}

/// Builds the node tree a session compiles.
pub fn build_program(settings: &SessionSettings) -> Result<Node, CompileError> {
    let entry = catalog::find(&settings.entry).ok_or_else(|| CompileError::InvalidNode {
        node: settings.entry.clone(),
        reason: "not a catalog entry".into(),
    })?;
    let mut order = entry.instantiate()?;
    order = fill(order, "security", settings.security.clone())?;
    order = fill(order, "currency", settings.currency.clone())?;
    if let Some(side) = settings.side {
        order = fill(order, "side", side)?;
    }
    order = fill(order, "destination", settings.destination.clone())?;
    order = fill(order, "quantity", settings.quantity)?;
    order = fill(order, "price", settings.price)?;
    order = fill(order, "time_in_force", settings.time_in_force)?;

    match settings.cancel_after {
        Some(delay) => {
            let expiry = Node::new(
                NodeKind::Addition,
                vec![Node::new(NodeKind::CurrentDateTime, vec![])?, Node::value(delay)],
            )?;
            let alarm = Node::new(NodeKind::Alarm, vec![expiry])?;
            Node::new(NodeKind::Until, vec![alarm, order])
        }
        None => Ok(order),
    }
}

/// Sets an order slot's literal. Pinned slots keep the template's value.
fn fill(order: Node, slot: &str, value: impl Into<Value>) -> Result<Node, CompileError> {
    let child = order
        .find_child(slot)
        .ok_or_else(|| CompileError::MissingChild {
            kind: order.kind().name().to_string(),
            slot: slot.to_string(),
        })?;
    if child.metadata("read_only") == Some("true") {
        debug!(slot, "slot pinned by template");
        return Ok(order);
    }
    let updated = child.set_value(value)?;
    order.replace(child, updated)
}

#[derive(Debug)]
pub struct SessionReport {
    pub outcome: RunOutcome,
    /// Every order the program submitted, in submission order.
    pub orders: Vec<OrderHandle>,
    /// The last value the program produced, if any.
    pub last_value: Option<Value>,
}

/// Compiles `program` and commits it until it completes, idles, or uses up
/// `max_ticks`. A fault produced by the program fails the session.
pub fn run<'a>(
    context: &mut CompilationContext<'a>,
    program: &'a Node,
    max_ticks: u64,
    idle_timeout: Duration,
) -> Result<SessionReport, TradeflowError> {
    let root = translate(context, program)?;
    let unbound = context.unbound_proxies();
    if unbound > 0 {
        warn!(unbound, "program compiled with unbound proxies");
    }
    info!(program = program.label(), native = ?root.native_type(), "program compiled");

    let mut runner = Runner::new(context.trigger().clone());
    let mut last_value = None;
    let mut fault = None;
    let outcome = runner.run(&root, max_ticks, idle_timeout, |sequence, state| {
        if !state.has_evaluation() {
            return;
        }
        match root.value() {
            Some(Ok(value)) => {
                debug!(sequence, %value, "program evaluated");
                last_value = Some(value);
            }
            Some(Err(err)) => {
                warn!(sequence, %err, "program faulted");
                fault = Some(err);
            }
            None => {}
        }
    });
    info!(?outcome, "session finished");

    match fault {
        Some(Fault::OrderSubmission(reason)) => Err(TradeflowError::OrderRejected { reason }),
        Some(fault) => Err(TradeflowError::Runtime(fault)),
        None => Ok(SessionReport {
            outcome,
            orders: context.publisher().orders(),
            last_value,
        }),
    }
}
