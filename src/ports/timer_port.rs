//! Timer port trait.

use std::any::Any;

use chrono::Duration;

use crate::domain::reactor::QueueSink;
use crate::domain::value::Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Fires once, then closes the sink.
    OneShot,
    Periodic,
}

pub trait TimerFactory {
    /// Starts a timer pushing the running tick count into `sink` every
    /// `interval`. The timer stops when the returned guard is dropped.
    fn start(
        &self,
        interval: Duration,
        mode: TimerMode,
        sink: QueueSink<Quantity>,
    ) -> Box<dyn Any>;
}
