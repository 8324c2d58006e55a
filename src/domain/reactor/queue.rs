//! Bridge from background producers into the single-threaded graph.

use std::any::Any;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use super::{Reactor, Series, State, Trigger};
use crate::domain::error::Fault;

/// Producer half of a queue: pushes an item and signals the trigger.
///
/// Dropping every sink closes the queue, which completes the consuming series
/// once its buffer is drained.
pub struct QueueSink<T> {
    // Only `None` while dropping, so the consumer is woken after the
    // channel has disconnected.
    sender: Option<Sender<T>>,
    trigger: Trigger,
}

impl<T> Clone for QueueSink<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            trigger: self.trigger.clone(),
        }
    }
}

impl<T> QueueSink<T> {
    /// Wraps a raw channel, for consumers that read outside the graph.
    pub fn new(sender: Sender<T>, trigger: &Trigger) -> Self {
        Self {
            sender: Some(sender),
            trigger: trigger.clone(),
        }
    }

    /// Returns `false` once the consumer is gone.
    pub fn push(&self, item: T) -> bool {
        let delivered = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(item).is_ok());
        self.trigger.signal();
        delivered
    }
}

impl<T> Drop for QueueSink<T> {
    fn drop(&mut self) {
        drop(self.sender.take());
        self.trigger.signal();
    }
}

pub struct QueueReactor<T> {
    receiver: Receiver<T>,
    trigger: Trigger,
    value: Option<T>,
    /// Item read past the one just delivered.
    ahead: Option<T>,
    guard: Option<Box<dyn Any>>,
}

impl<T> QueueReactor<T> {
    /// Keeps `guard` alive for as long as the queue is consumed, e.g. a timer
    /// handle that stops on drop.
    pub fn with_guard(mut self, guard: Box<dyn Any>) -> Self {
        self.guard = Some(guard);
        self
    }
}

impl<T: Clone + 'static> Reactor for QueueReactor<T> {
    type Output = T;

    fn commit(&mut self, _sequence: u64) -> State {
        let next = match self.ahead.take() {
            Some(item) => Ok(item),
            None => self.receiver.try_recv(),
        };
        match next {
            Ok(item) => {
                self.value = Some(item);
                // Look one item ahead: a close that raced the last push has
                // already spent its wake-up, so schedule the completing tick.
                match self.receiver.try_recv() {
                    Ok(item) => {
                        self.ahead = Some(item);
                        self.trigger.signal();
                    }
                    Err(TryRecvError::Disconnected) => self.trigger.signal(),
                    Err(TryRecvError::Empty) => {}
                }
                State::Evaluated
            }
            Err(TryRecvError::Empty) => State::None,
            Err(TryRecvError::Disconnected) => {
                self.guard = None;
                State::Complete
            }
        }
    }

    fn eval(&self) -> Result<T, Fault> {
        self.value.clone().ok_or(Fault::Unavailable)
    }
}

/// Creates a queue whose consumer is a series.
pub fn queue<T: Clone + 'static>(trigger: &Trigger) -> (QueueSink<T>, QueueReactor<T>) {
    let (sender, receiver) = unbounded();
    (
        QueueSink::new(sender, trigger),
        QueueReactor {
            receiver,
            trigger: trigger.clone(),
            value: None,
            ahead: None,
            guard: None,
        },
    )
}

/// Convenience for a queue consumed directly as a series.
pub fn queue_series<T: Clone + 'static>(trigger: &Trigger) -> (QueueSink<T>, Series<T>) {
    let (sink, reactor) = queue(trigger);
    (sink, Series::new(reactor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reactor::{RunOutcome, Runner};
    use std::time::Duration;

    #[test]
    fn buffered_items_are_delivered_one_per_commit() {
        let trigger = Trigger::new();
        let (sink, series) = queue_series::<i64>(&trigger);
        assert_eq!(series.commit(1), State::None);
        sink.push(1);
        sink.push(2);
        assert!(trigger.take());
        assert_eq!(series.commit(2), State::Evaluated);
        assert_eq!(series.eval(), Ok(1));
        assert!(trigger.take());
        assert_eq!(series.commit(3), State::Evaluated);
        assert_eq!(series.eval(), Ok(2));
    }

    #[test]
    fn dropping_the_sink_completes_after_drain() {
        let trigger = Trigger::new();
        let (sink, series) = queue_series::<i64>(&trigger);
        sink.push(5);
        drop(sink);
        assert_eq!(series.commit(1), State::Evaluated);
        assert_eq!(series.eval(), Ok(5));
        assert_eq!(series.commit(2), State::Complete);
        assert_eq!(series.eval(), Ok(5));
    }

    #[test]
    fn empty_closed_queue_completes_without_value() {
        let trigger = Trigger::new();
        let (sink, series) = queue_series::<i64>(&trigger);
        drop(sink);
        assert_eq!(series.commit(1), State::Complete);
        assert!(!series.has_value());
    }

    #[test]
    fn producer_thread_hands_off_items() {
        let trigger = Trigger::new();
        let (sink, series) = queue_series::<i64>(&trigger);
        let producer = std::thread::spawn(move || {
            for i in 0..3 {
                sink.push(i);
            }
        });
        producer.join().unwrap();
        let mut seen = Vec::new();
        for sequence in 1..10 {
            let state = series.commit(sequence);
            if state.has_evaluation() {
                seen.push(series.eval().unwrap());
            }
            if state.is_complete() {
                break;
            }
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn closing_after_the_last_push_still_wakes_the_consumer() {
        let trigger = Trigger::new();
        let (sink, series) = queue_series::<i64>(&trigger);
        sink.push(7);
        drop(sink);
        assert!(trigger.take());
        assert_eq!(series.commit(1), State::Evaluated);
        assert!(trigger.take());
        assert_eq!(series.commit(2), State::Complete);
    }

    #[test]
    fn runner_completes_when_the_producer_closes() {
        let trigger = Trigger::new();
        let (sink, series) = queue_series::<i64>(&trigger);
        let producer = std::thread::spawn(move || {
            sink.push(1);
        });
        let mut runner = Runner::new(trigger.clone());
        let outcome = runner.run(&series, 100, Duration::from_millis(500), |_, _| {});
        producer.join().unwrap();
        assert!(matches!(outcome, RunOutcome::Complete { .. }));
    }
}
