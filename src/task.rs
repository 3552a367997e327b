//! # Background Tasks
//!
//! Long operations (fetching records, rendering a batch, running a print job)
//! run on tokio's blocking pool. Their results come back as [`Completion`]s
//! on a channel owned by the interactive side.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use seatlabel::task::TaskRunner;
//!
//! let (runner, mut completions) = TaskRunner::<u32>::new(tokio::runtime::Handle::current());
//! runner.spawn("count", || Ok(42));
//!
//! let done = completions.recv().await.unwrap();
//! assert_eq!(done.task, "count");
//! assert_eq!(done.result.unwrap(), 42);
//! # }
//! ```
//!
//! Tasks cannot be cancelled. A task that panics is reported as
//! [`LabelError::Task`].

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error};

use crate::error::LabelError;

/// A finished task.
#[derive(Debug)]
pub struct Completion<T> {
    pub task: String,
    pub result: Result<T, LabelError>,
}

/// Spawns blocking work and reports completions.
#[derive(Debug)]
pub struct TaskRunner<T> {
    handle: Handle,
    tx: UnboundedSender<Completion<T>>,
}

impl<T> Clone for TaskRunner<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> TaskRunner<T> {
    pub fn new(handle: Handle) -> (Self, UnboundedReceiver<Completion<T>>) {
        let (tx, rx) = unbounded_channel();
        (Self { handle, tx }, rx)
    }

    /// Run `work` off the calling thread.
    pub fn spawn<F>(&self, name: impl Into<String>, work: F)
    where
        F: FnOnce() -> Result<T, LabelError> + Send + 'static,
    {
        let task = name.into();
        let tx = self.tx.clone();
        let handle = self.handle.clone();

        debug!("Starting task '{}'", task);
        self.handle.spawn(async move {
            let result = match handle.spawn_blocking(work).await {
                Ok(result) => result,
                Err(e) => Err(LabelError::Task(format!("{} did not finish: {}", task, e))),
            };
            if let Err(e) = &result {
                error!("Task '{}' failed: {}", task, e);
            }
            // Receiver gone means nobody is waiting any more
            let _ = tx.send(Completion { task, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_delivered() {
        let (runner, mut rx) = TaskRunner::new(Handle::current());
        runner.spawn("fetch", || Ok(vec![1, 2, 3]));
        let done = rx.recv().await.unwrap();
        assert_eq!(done.task, "fetch");
        assert_eq!(done.result.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_error_delivered() {
        let (runner, mut rx) = TaskRunner::<()>::new(Handle::current());
        runner.spawn("print", || Err(LabelError::Connectivity("offline".into())));
        let done = rx.recv().await.unwrap();
        assert!(matches!(done.result, Err(LabelError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_panic_becomes_task_error() {
        let (runner, mut rx) = TaskRunner::<()>::new(Handle::current());
        runner.spawn("boom", || panic!("render crashed"));
        let done = rx.recv().await.unwrap();
        assert!(matches!(done.result, Err(LabelError::Task(_))));
    }

    #[tokio::test]
    async fn test_many_tasks_all_complete() {
        let (runner, mut rx) = TaskRunner::new(Handle::current());
        for i in 0..5u32 {
            runner.spawn(format!("t{}", i), move || Ok(i));
        }
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(rx.recv().await.unwrap().result.unwrap());
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
