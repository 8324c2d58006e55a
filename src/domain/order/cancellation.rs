use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Select};
use tracing::{debug, info, warn};

use super::handle::{ExecutionReport, OrderHandle};
use super::task_queue::TaskQueue;
use crate::domain::error::Fault;
use crate::domain::reactor::{QueueSink, Reactor, Series, State, Trigger};
use crate::ports::order_execution_port::OrderExecutionClient;

enum Phase {
    Running,
    Cancelling {
        expected: usize,
        terminated: Arc<AtomicUsize>,
    },
    Done,
}

/// Passes orders through until `source` completes, then cancels every order
/// seen and completes once all of them are terminal.
struct CancelOnCompletion {
    client: Rc<dyn OrderExecutionClient>,
    tasks: TaskQueue,
    trigger: Trigger,
    source: Series<OrderHandle>,
    orders: Vec<OrderHandle>,
    phase: Phase,
    value: Option<Result<OrderHandle, Fault>>,
}

impl CancelOnCompletion {
    fn cancel_all(&mut self) -> Phase {
        let expected = self.orders.len();
        info!(orders = expected, "canceling outstanding orders");
        if expected == 0 {
            return Phase::Done;
        }
        let terminated = Arc::new(AtomicUsize::new(0));
        let mut pending = Vec::with_capacity(expected);
        for order in self.orders.drain(..) {
            let (sender, receiver) = unbounded();
            order.monitor(QueueSink::new(sender, &self.trigger));
            self.client.cancel(&order);
            pending.push((order.id(), receiver));
        }
        let counter = Arc::clone(&terminated);
        let trigger = self.trigger.clone();
        self.tasks
            .push(move || await_terminal_reports(pending, &counter, &trigger));
        Phase::Cancelling {
            expected,
            terminated,
        }
    }
}

/// Waits on every report stream at once and counts each order whose stream
/// delivers a terminal status. A stream that closes first is not counted.
fn await_terminal_reports(
    mut pending: Vec<(u64, Receiver<ExecutionReport>)>,
    terminated: &AtomicUsize,
    trigger: &Trigger,
) {
    while !pending.is_empty() {
        let (index, received) = {
            let mut select = Select::new();
            for (_, receiver) in &pending {
                select.recv(receiver);
            }
            let operation = select.select();
            let index = operation.index();
            (index, operation.recv(&pending[index].1))
        };
        let id = pending[index].0;
        match received {
            Ok(report) if report.status.is_terminal() => {
                debug!(order_id = id, status = %report.status, "order terminal after cancel");
                pending.swap_remove(index);
                terminated.fetch_add(1, Ordering::SeqCst);
                trigger.signal();
            }
            Ok(_) => {}
            Err(_) => {
                warn!(order_id = id, "report stream closed without a terminal status");
                pending.swap_remove(index);
            }
        }
    }
}

impl Reactor for CancelOnCompletion {
    type Output = OrderHandle;

    fn commit(&mut self, sequence: u64) -> State {
        match &self.phase {
            Phase::Running => {
                let state = self.source.commit(sequence);
                if state.has_evaluation() {
                    let value = self.source.eval();
                    if let Ok(order) = &value {
                        if !self.orders.contains(order) {
                            self.orders.push(order.clone());
                        }
                    }
                    self.value = Some(value);
                }
                if !state.is_complete() {
                    return state;
                }
                self.phase = self.cancel_all();
                State::new(
                    state.has_evaluation(),
                    matches!(self.phase, Phase::Done),
                )
            }
            Phase::Cancelling {
                expected,
                terminated,
            } => {
                if terminated.load(Ordering::SeqCst) >= *expected {
                    self.phase = Phase::Done;
                    State::Complete
                } else {
                    State::None
                }
            }
            Phase::Done => State::Complete,
        }
    }

    fn eval(&self) -> Result<OrderHandle, Fault> {
        self.value.clone().unwrap_or(Err(Fault::Unavailable))
    }
}

/// Wraps an order series so that its completion cancels every order it
/// produced. The result completes only after each of those orders reports a
/// terminal status, or immediately when there were none.
pub fn cancel_on_completion(
    client: Rc<dyn OrderExecutionClient>,
    tasks: &TaskQueue,
    trigger: &Trigger,
    source: Series<OrderHandle>,
) -> Series<OrderHandle> {
    Series::new(CancelOnCompletion {
        client,
        tasks: tasks.clone(),
        trigger: trigger.clone(),
        source,
        orders: Vec::new(),
        phase: Phase::Running,
        value: None,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDateTime;

    use super::super::reactor::fake::FakeOrderClient;
    use super::*;
    use crate::domain::order::handle::OrderFields;
    use crate::domain::reactor::testing::scripted;
    use crate::domain::reactor::{none, until};
    use crate::domain::value::*;

    fn fields() -> OrderFields {
        OrderFields {
            account: "acct".into(),
            security: Security::new("NAB", "ASX"),
            currency: Currency::new("AUD"),
            order_type: OrderType::Limit,
            side: Side::Ask,
            destination: Venue::new("ASX"),
            quantity: 5,
            price: Money::from_units(30),
            time_in_force: TimeInForce::Gtc,
            extra: Vec::new(),
        }
    }

    fn run_until_complete(series: &Series<OrderHandle>, trigger: &Trigger) -> bool {
        for sequence in 1..200 {
            if series.commit(sequence).is_complete() {
                return true;
            }
            trigger.wait(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn cancels_every_emitted_order() {
        let client = Rc::new(FakeOrderClient::default());
        let orders: Vec<OrderHandle> = (0..3)
            .map(|_| client.submit(fields()).unwrap())
            .collect();
        let source = scripted(orders.iter().cloned().map(Some).collect());
        let trigger = Trigger::new();
        let tasks = TaskQueue::new("cancel-test").unwrap();
        let series = cancel_on_completion(client.clone(), &tasks, &trigger, source);

        assert!(run_until_complete(&series, &trigger));
        assert_eq!(*client.canceled.borrow(), vec![1, 2, 3]);
        assert!(orders.iter().all(OrderHandle::is_terminal));
    }

    #[test]
    fn completes_immediately_without_orders() {
        let client = Rc::new(FakeOrderClient::default());
        let trigger = Trigger::new();
        let tasks = TaskQueue::new("cancel-test").unwrap();
        let series = cancel_on_completion(client.clone(), &tasks, &trigger, none());
        assert_eq!(series.commit(1), State::Complete);
        assert!(client.canceled.borrow().is_empty());
    }

    #[test]
    fn completes_only_after_the_last_terminal_report() {
        let client = Rc::new(FakeOrderClient {
            silent_cancel: true,
            ..FakeOrderClient::default()
        });
        let orders: Vec<OrderHandle> = (0..3)
            .map(|_| client.submit(fields()).unwrap())
            .collect();
        let mut steps: Vec<Option<OrderHandle>> = orders.iter().cloned().map(Some).collect();
        steps.extend([None, None]);
        let condition = scripted(vec![Some(false), Some(false), Some(false), Some(true)]);
        let trigger = Trigger::new();
        let tasks = TaskQueue::new("cancel-test").unwrap();
        let series = cancel_on_completion(
            client.clone(),
            &tasks,
            &trigger,
            until(condition, scripted(steps)),
        );

        for sequence in 1..=3 {
            assert_eq!(series.commit(sequence), State::Evaluated);
        }
        assert_eq!(series.commit(4), State::None);
        assert_eq!(*client.canceled.borrow(), vec![1, 2, 3]);

        let mut sequence = 4;
        for order in &orders[..2] {
            order.publish(ExecutionReport::status(OrderStatus::Canceled, NaiveDateTime::MIN));
            std::thread::sleep(Duration::from_millis(50));
            sequence += 1;
            assert!(!series.commit(sequence).is_complete());
        }

        orders[2].publish(ExecutionReport::status(OrderStatus::Canceled, NaiveDateTime::MIN));
        let mut complete = false;
        for _ in 0..100 {
            sequence += 1;
            if series.commit(sequence).is_complete() {
                complete = true;
                break;
            }
            trigger.wait(Duration::from_millis(20));
        }
        assert!(complete);
    }

    #[test]
    fn closed_stream_is_not_counted_as_terminal() {
        let trigger = Trigger::new();
        let terminated = AtomicUsize::new(0);
        let (abandoned, abandoned_reports) = unbounded();
        let (live, live_reports) = unbounded();
        abandoned
            .send(ExecutionReport::status(OrderStatus::New, NaiveDateTime::MIN))
            .unwrap();
        drop(abandoned);
        live.send(ExecutionReport::status(OrderStatus::Canceled, NaiveDateTime::MIN))
            .unwrap();

        await_terminal_reports(
            vec![(1, abandoned_reports), (2, live_reports)],
            &terminated,
            &trigger,
        );
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }
}
