//! Timers backed by sleeping threads.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{trace, warn};

use crate::domain::reactor::QueueSink;
use crate::domain::value::Quantity;
use crate::ports::timer_port::{TimerFactory, TimerMode};

const MIN_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1);

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTimerFactory;

/// Stops its timer thread when dropped. The thread notices at its next wake.
struct TimerGuard {
    stopped: Arc<AtomicBool>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
    }
}

impl TimerFactory for ThreadTimerFactory {
    fn start(
        &self,
        interval: chrono::Duration,
        mode: TimerMode,
        sink: QueueSink<Quantity>,
    ) -> Box<dyn Any> {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let period = interval.to_std().unwrap_or_default().max(MIN_INTERVAL);
        let spawned = thread::Builder::new()
            .name("tradeflow-timer".into())
            .spawn(move || {
                let mut ticks: Quantity = 0;
                loop {
                    thread::sleep(period);
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    ticks += 1;
                    trace!(ticks, "timer fired");
                    if !sink.push(ticks) || mode == TimerMode::OneShot {
                        break;
                    }
                }
            });
        if let Err(err) = spawned {
            warn!(%err, "failed to start timer thread");
        }
        Box::new(TimerGuard { stopped })
    }
}
