use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::handle::OrderHandle;
use crate::domain::error::Fault;
use crate::domain::reactor::{QueueSink, Reactor, Series, State};

#[derive(Default)]
struct Registry {
    orders: Vec<OrderHandle>,
    subscribers: Vec<QueueSink<OrderHandle>>,
}

/// Session-wide record of every order the graph submitted.
#[derive(Clone, Default)]
pub struct OrderPublisher {
    registry: Arc<Mutex<Registry>>,
}

impl OrderPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `order` once and forwards it to subscribers.
    pub fn publish(&self, order: &OrderHandle) {
        let mut registry = self.registry.lock();
        if registry.orders.contains(order) {
            return;
        }
        info!(
            order_id = order.id(),
            security = %order.fields().security,
            side = %order.fields().side,
            quantity = order.fields().quantity,
            "order published"
        );
        registry.orders.push(order.clone());
        registry.subscribers.retain(|sink| sink.push(order.clone()));
    }

    /// Replays published orders into `sink`, then streams new ones.
    pub fn subscribe(&self, sink: QueueSink<OrderHandle>) {
        let mut registry = self.registry.lock();
        for order in &registry.orders {
            sink.push(order.clone());
        }
        registry.subscribers.push(sink);
    }

    pub fn orders(&self) -> Vec<OrderHandle> {
        self.registry.lock().orders.clone()
    }
}

impl std::fmt::Debug for OrderPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPublisher")
            .field("orders", &self.registry.lock().orders.len())
            .finish()
    }
}

struct Publish {
    publisher: OrderPublisher,
    source: Series<OrderHandle>,
}

impl Reactor for Publish {
    type Output = OrderHandle;

    fn commit(&mut self, sequence: u64) -> State {
        let state = self.source.commit(sequence);
        if state.has_evaluation() {
            if let Ok(order) = self.source.eval() {
                self.publisher.publish(&order);
            }
        }
        state
    }

    fn eval(&self) -> Result<OrderHandle, Fault> {
        self.source.eval()
    }
}

/// Passes `source` through, publishing every order it evaluates to.
pub fn publish(publisher: &OrderPublisher, source: Series<OrderHandle>) -> Series<OrderHandle> {
    Series::new(Publish {
        publisher: publisher.clone(),
        source,
    })
}
