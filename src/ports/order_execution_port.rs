//! Order execution port trait.

use crate::domain::error::TradeflowError;
use crate::domain::order::{OrderFields, OrderHandle};

/// Submits and cancels orders. Execution reports are published on the
/// returned handle, possibly from another thread.
pub trait OrderExecutionClient {
    fn submit(&self, fields: OrderFields) -> Result<OrderHandle, TradeflowError>;

    /// Requests cancellation. The order becomes terminal once the venue
    /// confirms, which may be later or never.
    fn cancel(&self, order: &OrderHandle);
}
