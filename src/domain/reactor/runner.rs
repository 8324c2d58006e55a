//! The cooperative commit loop.

use std::time::Duration;

use tracing::{debug, trace};

use super::{Series, State, Trigger};

/// Anything the runner can commit.
pub trait Root {
    fn commit(&self, sequence: u64) -> State;
}

impl<T: Clone + 'static> Root for Series<T> {
    fn commit(&self, sequence: u64) -> State {
        Series::commit(self, sequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The root reported completion.
    Complete { ticks: u64 },
    /// No wake signal arrived within the idle timeout.
    Idle { ticks: u64 },
    /// The tick budget ran out first.
    TickLimit { ticks: u64 },
}

/// Commits a root once per wake signal, with strictly increasing sequence
/// numbers.
pub struct Runner {
    trigger: Trigger,
    sequence: u64,
}

impl Runner {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            sequence: 0,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Commits the root once with the next sequence number.
    pub fn step(&mut self, root: &dyn Root) -> State {
        self.sequence += 1;
        let state = root.commit(self.sequence);
        trace!(sequence = self.sequence, ?state, "commit");
        state
    }

    /// Commits until the root completes, the graph goes idle for
    /// `idle_timeout`, or `max_ticks` commits have run. `observe` sees every
    /// commit's state.
    pub fn run(
        &mut self,
        root: &dyn Root,
        max_ticks: u64,
        idle_timeout: Duration,
        mut observe: impl FnMut(u64, State),
    ) -> RunOutcome {
        let mut ticks = 0;
        loop {
            if ticks >= max_ticks {
                debug!(ticks, "tick limit reached");
                return RunOutcome::TickLimit { ticks };
            }
            let state = self.step(root);
            ticks += 1;
            observe(self.sequence, state);
            if state.is_complete() {
                debug!(ticks, "root complete");
                return RunOutcome::Complete { ticks };
            }
            if !self.trigger.take() && !self.trigger.wait(idle_timeout) {
                debug!(ticks, "graph idle");
                return RunOutcome::Idle { ticks };
            }
        }
    }
}
