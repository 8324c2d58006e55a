use std::io;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Hands jobs from the commit loop to background threads.
///
/// A dispatcher thread starts each job on its own named thread, so a job that
/// blocks never holds up the ones behind it. The dispatcher exits once every
/// clone of the queue is dropped.
#[derive(Clone)]
pub struct TaskQueue {
    sender: Sender<Job>,
}

impl TaskQueue {
    pub fn new(name: &str) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let prefix = name.to_string();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for (index, job) in receiver.into_iter().enumerate() {
                    let worker = thread::Builder::new().name(format!("{prefix}-{index}"));
                    if let Err(err) = worker.spawn(job) {
                        warn!(%err, "failed to start background job");
                    }
                }
            })?;
        Ok(Self { sender })
    }

    pub fn push(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            warn!("task queue worker has exited, job dropped");
        }
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("backlog", &self.sender.len())
            .finish()
    }
}
