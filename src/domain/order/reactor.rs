use std::rc::Rc;

use crossbeam_channel::{unbounded, Receiver};
use tracing::{debug, info, warn};

use super::handle::{ExecutionReport, OrderFields, OrderHandle};
use crate::domain::error::{Fault, TradeflowError};
use crate::domain::reactor::{QueueSink, Reactor, Series, State, Trigger};
use crate::domain::value::{
    Currency, Money, OrderType, Quantity, Security, Side, TimeInForce, Value, Venue,
};
use crate::ports::order_execution_port::OrderExecutionClient;

/// The series feeding each order field.
pub struct OrderFieldSeries {
    pub security: Series<Security>,
    pub currency: Series<Currency>,
    pub order_type: Series<OrderType>,
    pub side: Series<Side>,
    pub destination: Series<Venue>,
    pub quantity: Series<Quantity>,
    pub price: Series<Money>,
    pub time_in_force: Series<TimeInForce>,
    pub extra: Vec<(String, Series<Value>)>,
}

impl OrderFieldSeries {
    /// Commits every field; returns whether any changed and whether all are
    /// complete.
    fn commit(&self, sequence: u64) -> (bool, bool) {
        let states = [
            self.security.commit(sequence),
            self.currency.commit(sequence),
            self.order_type.commit(sequence),
            self.side.commit(sequence),
            self.destination.commit(sequence),
            self.quantity.commit(sequence),
            self.price.commit(sequence),
            self.time_in_force.commit(sequence),
        ];
        let mut changed = states.iter().any(|s| s.has_evaluation());
        let mut complete = states.iter().all(|s| s.is_complete());
        for (_, series) in &self.extra {
            let state = series.commit(sequence);
            changed |= state.has_evaluation();
            complete &= state.is_complete();
        }
        (changed, complete)
    }

    fn has_values(&self) -> bool {
        self.security.has_value()
            && self.currency.has_value()
            && self.order_type.has_value()
            && self.side.has_value()
            && self.destination.has_value()
            && self.quantity.has_value()
            && self.price.has_value()
            && self.time_in_force.has_value()
            && self.extra.iter().all(|(_, s)| s.has_value())
    }

    fn snapshot(&self, account: &str) -> Result<OrderFields, Fault> {
        let extra = self
            .extra
            .iter()
            .map(|(name, series)| Ok((name.clone(), series.eval()?)))
            .collect::<Result<Vec<_>, Fault>>()?;
        Ok(OrderFields {
            account: account.to_string(),
            security: self.security.eval()?,
            currency: self.currency.eval()?,
            order_type: self.order_type.eval()?,
            side: self.side.eval()?,
            destination: self.destination.eval()?,
            quantity: self.quantity.eval()?,
            price: self.price.eval()?,
            time_in_force: self.time_in_force.eval()?,
            extra,
        })
    }
}

struct LiveOrder {
    order: OrderHandle,
    reports: Receiver<ExecutionReport>,
}

/// Keeps one live order in line with its fields.
///
/// The first complete set of fields submits an order. When a field changes
/// the live order is canceled and, once terminal, the unfilled remainder is
/// resubmitted with the new fields.
struct SubmitOrders {
    client: Rc<dyn OrderExecutionClient>,
    account: String,
    fields: OrderFieldSeries,
    trigger: Trigger,
    live: Option<LiveOrder>,
    filled: Quantity,
    resubmit: bool,
    failed: bool,
    value: Option<Result<OrderHandle, Fault>>,
}

impl SubmitOrders {
    fn settle_live_order(&mut self) {
        let Some(live) = &self.live else {
            return;
        };
        let drained = live.reports.try_iter().count();
        if drained > 0 {
            debug!(order_id = live.order.id(), drained, "execution reports received");
        }
        if live.order.is_terminal() {
            self.filled += live.order.filled_quantity();
            debug!(
                order_id = live.order.id(),
                status = %live.order.status(),
                filled = self.filled,
                "order settled"
            );
            self.live = None;
        }
    }

    fn submit(&mut self, fields: OrderFields) -> Result<OrderHandle, Fault> {
        let order = self
            .client
            .submit(fields)
            .map_err(|e| match e {
                TradeflowError::OrderRejected { reason } => Fault::OrderSubmission(reason),
                other => Fault::OrderSubmission(other.to_string()),
            })?;
        info!(
            order_id = order.id(),
            security = %order.fields().security,
            quantity = order.fields().quantity,
            price = %order.fields().price,
            "order submitted"
        );
        let (sender, receiver) = unbounded();
        order.monitor(QueueSink::new(sender, &self.trigger));
        self.live = Some(LiveOrder {
            order: order.clone(),
            reports: receiver,
        });
        Ok(order)
    }
}

impl Reactor for SubmitOrders {
    type Output = OrderHandle;

    fn commit(&mut self, sequence: u64) -> State {
        if self.failed {
            return State::Complete;
        }
        let (changed, fields_complete) = self.fields.commit(sequence);
        self.settle_live_order();

        let mut evaluated = false;
        if changed && self.fields.has_values() {
            if let Some(live) = &self.live {
                if !self.resubmit {
                    debug!(order_id = live.order.id(), "fields changed, canceling");
                    self.client.cancel(&live.order);
                }
            }
            self.resubmit = true;
        }

        if self.live.is_none() && self.resubmit {
            self.resubmit = false;
            match self.fields.snapshot(&self.account) {
                Ok(mut fields) => {
                    fields.quantity -= self.filled;
                    if fields.quantity > 0 {
                        let result = self.submit(fields);
                        if let Err(fault) = &result {
                            warn!(%fault, "order submission failed");
                            self.failed = true;
                        }
                        self.value = Some(result);
                        evaluated = true;
                    }
                }
                Err(fault) => {
                    self.value = Some(Err(fault));
                    evaluated = true;
                }
            }
        }

        let complete =
            self.failed || (fields_complete && self.live.is_none() && !self.resubmit);
        State::new(evaluated, complete)
    }

    fn eval(&self) -> Result<OrderHandle, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// A series of the orders submitted on behalf of `fields`.
pub fn submit_orders(
    client: Rc<dyn OrderExecutionClient>,
    account: &str,
    fields: OrderFieldSeries,
    trigger: &Trigger,
) -> Series<OrderHandle> {
    Series::new(SubmitOrders {
        client,
        account: account.to_string(),
        fields,
        trigger: trigger.clone(),
        live: None,
        filled: 0,
        resubmit: false,
        failed: false,
        value: None,
    })
}


#[cfg(test)]
mod tests {
    use super::fake::*;
    use super::*;
    use crate::domain::reactor::testing::{collect, scripted};
    use crate::domain::reactor::constant;

    #[test]
    fn submits_once_fields_are_available() {
        let client = Rc::new(FakeOrderClient::default());
        let orders = submit_orders(
            client.clone(),
            "acct",
            fields_with_price(constant(Money::from_units(10))),
            &Trigger::new(),
        );
        let values = collect(&orders, 3);
        assert_eq!(values.len(), 1);
        assert_eq!(client.submitted.borrow().len(), 1);
        assert_eq!(client.submitted.borrow()[0].fields().account, "acct");
    }

    #[test]
    fn price_change_cancels_and_resubmits() {
        let client = Rc::new(FakeOrderClient::default());
        let prices = scripted(vec![
            Some(Money::from_units(10)),
            None,
            Some(Money::from_units(11)),
            None,
        ]);
        let orders = submit_orders(client.clone(), "acct", fields_with_price(prices), &Trigger::new());
        let values = collect(&orders, 6);
        assert_eq!(values.len(), 2);
        assert_eq!(*client.canceled.borrow(), vec![1]);
        let second = values[1].clone().unwrap();
        assert_eq!(second.fields().price, Money::from_units(11));
        assert_eq!(second.fields().quantity, 100);
    }

    #[test]
    fn rejection_faults_and_completes() {
        let client = Rc::new(FakeOrderClient {
            reject: true,
            ..Default::default()
        });
        let orders = submit_orders(
            client,
            "acct",
            fields_with_price(constant(Money::ONE)),
            &Trigger::new(),
        );
        assert_eq!(orders.commit(1), State::EvaluatedAndComplete);
        assert!(matches!(orders.eval(), Err(Fault::OrderSubmission(_))));
    }
}
