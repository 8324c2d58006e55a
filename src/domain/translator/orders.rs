//! Order submission, live order wrappers and execution report monitors.

use tracing::{debug, warn};

use super::functions::Arguments;
use super::{translate, Translator};
use crate::domain::context::{node_key, CompilationContext};
use crate::domain::error::{CompileError, Fault};
use crate::domain::signatures;
use crate::domain::node::{Node, ORDER_FIELDS};
use crate::domain::order::{
    cancel_on_completion, publish, submit_orders, ExecutionReport, OrderFieldSeries, OrderHandle,
};
use crate::domain::reactor::{concur, constant, distinct, lift, queue_series, throw, until, Series};
use crate::domain::translation::Translation;
use crate::domain::value::Value;

impl<'a> Translator<'a, '_> {
    /// Submits an order built from the children, registering each child's
    /// translation under its slot name.
    pub(super) fn single_order(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let key = node_key(node);
        for (index, (child, translation)) in node.children().iter().zip(&translations).enumerate() {
            self.context
                .register_order_slot(key, &slot_name(child, index), translation.clone());
        }
        let Some(client) = self.context.order_client() else {
            return Ok(Translation::new(throw::<OrderHandle>(Fault::Unsupported(
                "order execution".into(),
            ))));
        };
        let arguments = Arguments {
            kind: node.kind(),
            translations: &translations,
        };
        let extra = node
            .children()
            .iter()
            .zip(&translations)
            .enumerate()
            .skip(ORDER_FIELDS.len())
            .map(|(index, (child, translation))| {
                Ok((slot_name(child, index), distinct(translation.to_values()?)))
            })
            .collect::<Result<Vec<_>, CompileError>>()?;
        let fields = OrderFieldSeries {
            security: distinct(arguments.get(0)?),
            currency: distinct(arguments.get(1)?),
            order_type: distinct(arguments.get(2)?),
            side: distinct(arguments.get(3)?),
            destination: distinct(arguments.get(4)?),
            quantity: distinct(arguments.get(5)?),
            price: distinct(arguments.get(6)?),
            time_in_force: distinct(arguments.get(7)?),
            extra,
        };
        let orders = submit_orders(
            client,
            self.context.account(),
            fields,
            self.context.trigger(),
        );
        Ok(Translation::new(publish(self.context.publisher(), orders)))
    }

    /// Presents an already live order. Its children compile to the order's
    /// actual fields.
    pub(super) fn order_wrapper(&mut self, node: &'a Node, order: &OrderHandle) -> Translation {
        let fields = order.fields();
        let live_values = [
            Value::Security(fields.security.clone()),
            Value::Currency(fields.currency.clone()),
            Value::OrderType(fields.order_type),
            Value::Side(fields.side),
            Value::Venue(fields.destination.clone()),
            Value::Integer(fields.quantity),
            Value::Money(fields.price),
            Value::TimeInForce(fields.time_in_force),
        ];
        let key = node_key(node);
        for (index, (child, value)) in node.children().iter().zip(live_values).enumerate() {
            let translation = Translation::constant(value);
            self.context.memoize(node_key(child), translation.clone());
            self.context
                .register_order_slot(key, &slot_name(child, index), translation);
        }
        for (name, value) in &fields.extra {
            self.context
                .register_order_slot(key, name, Translation::constant(value.clone()));
        }
        debug!(order_id = order.id(), "wrapping live order");
        Translation::new(publish(self.context.publisher(), constant(order.clone())))
    }

    pub(super) fn execution_reports(
        &mut self,
        node: &'a Node,
    ) -> Result<Translation, CompileError> {
        let (_, translations) = self.resolve(node)?;
        let orders = Arguments {
            kind: node.kind(),
            translations: &translations,
        }
        .get::<OrderHandle>(0)?;
        let trigger = self.context.trigger().clone();
        let monitor_trigger = trigger.clone();
        let streams = lift(
            move |order: OrderHandle| {
                let (sink, reports) = queue_series::<ExecutionReport>(&monitor_trigger);
                order.monitor(sink);
                Ok(lift(|report: ExecutionReport| Ok(report.to_record()), reports))
            },
            orders,
        );
        Ok(Translation::new(concur(streams, &trigger)))
    }

    /// Compiles a fresh copy of the order child each time the trigger
    /// evaluates and merges the orders of every copy. The child is not
    /// compiled up front, so nothing is submitted before the first trigger.
    pub(super) fn spawn(&mut self, node: &'a Node) -> Result<Translation, CompileError> {
        let child = |index: usize| {
            node.children().get(index).ok_or_else(|| CompileError::MissingChild {
                kind: node.kind().name().to_string(),
                slot: node
                    .kind()
                    .slot_names()
                    .get(index)
                    .map_or_else(|| index.to_string(), |s| s.to_string()),
            })
        };
        let (trigger_node, template) = (child(0)?, child(1)?);
        let table = signatures::signatures(node.kind());
        signatures::resolve(
            node.kind().name(),
            &table,
            &[trigger_node.node_type().clone(), template.node_type().clone()],
            Some(node.node_type()),
        )?;
        let triggers = self.translate(trigger_node)?.to_values()?;
        let template = template.clone();
        let scope: CompilationContext<'static> = self.context.fork();
        let spawned = lift(move |_: Value| spawn_order(&scope, &template), triggers);
        Ok(Translation::new(concur(spawned, self.context.trigger())))
    }

    /// `until` over orders: once the condition holds, every order produced
    /// so far is canceled.
    pub(super) fn cancellable_until(
        &self,
        condition: Series<bool>,
        orders: Series<OrderHandle>,
    ) -> Translation {
        let orders = until(condition, orders);
        match self.context.order_client() {
            Some(client) => Translation::new(cancel_on_completion(
                client,
                self.context.tasks(),
                self.context.trigger(),
                orders,
            )),
            None => Translation::new(orders),
        }
    }
}

fn spawn_order(
    scope: &CompilationContext<'_>,
    template: &Node,
) -> Result<Series<OrderHandle>, Fault> {
    let mut context = scope.fork();
    translate(&mut context, template)
        .and_then(|translation| translation.extract::<OrderHandle>())
        .map_err(|error| {
            warn!(%error, node = template.label(), "spawned order failed to compile");
            Fault::OrderSubmission(error.to_string())
        })
}

fn slot_name(child: &Node, index: usize) -> String {
    if child.name().is_empty() {
        ORDER_FIELDS
            .get(index)
            .map_or_else(|| format!("tag{index}"), |name| name.to_string())
    } else {
        child.name().to_string()
    }
}
