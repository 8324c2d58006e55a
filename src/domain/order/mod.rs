//! Live orders: submission, publication and cancellation.

pub mod cancellation;
pub mod handle;
pub mod publisher;
pub mod reactor;
pub mod task_queue;

pub use cancellation::cancel_on_completion;
pub use handle::{ExecutionReport, OrderFields, OrderHandle};
pub use publisher::{publish, OrderPublisher};
pub use reactor::{submit_orders, OrderFieldSeries};
pub use task_queue::TaskQueue;
