//! In-process order execution for simulation sessions.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::domain::error::TradeflowError;
use crate::domain::order::{ExecutionReport, OrderFields, OrderHandle};
use crate::domain::session::SimulationSettings;
use crate::domain::value::OrderStatus;
use crate::ports::order_execution_port::OrderExecutionClient;
use crate::ports::time_port::TimeClient;

/// Acknowledges every order, optionally fills it in full at its limit
/// price, and confirms cancels at once. Orders above the configured quantity
/// limit are refused.
pub struct SimulatedOrderClient {
    settings: SimulationSettings,
    time: Rc<dyn TimeClient>,
    next_id: AtomicU64,
}

impl SimulatedOrderClient {
    pub fn new(settings: SimulationSettings, time: Rc<dyn TimeClient>) -> Self {
        Self {
            settings,
            time,
            next_id: AtomicU64::new(1),
        }
    }
}

impl OrderExecutionClient for SimulatedOrderClient {
    fn submit(&self, fields: OrderFields) -> Result<OrderHandle, TradeflowError> {
        if let Some(limit) = self.settings.reject_above {
            if fields.quantity > limit {
                return Err(TradeflowError::OrderRejected {
                    reason: format!("quantity {} exceeds limit {limit}", fields.quantity),
                });
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let order = OrderHandle::new(id, fields);
        order.publish(ExecutionReport::status(OrderStatus::New, self.time.now()));
        info!(
            order_id = id,
            security = %order.fields().security,
            side = %order.fields().side,
            quantity = order.fields().quantity,
            price = %order.fields().price,
            "simulated order accepted"
        );
        if self.settings.auto_fill {
            let fields = order.fields();
            order.publish(ExecutionReport::fill(
                OrderStatus::Filled,
                fields.quantity,
                fields.price,
                self.time.now(),
            ));
            debug!(order_id = id, "simulated order filled");
        }
        Ok(order)
    }

    fn cancel(&self, order: &OrderHandle) {
        if order.is_terminal() {
            debug!(order_id = order.id(), "cancel ignored, order already terminal");
            return;
        }
        order.publish(ExecutionReport::status(
            OrderStatus::Canceled,
            self.time.now(),
        ));
        info!(order_id = order.id(), "simulated order canceled");
    }
}
