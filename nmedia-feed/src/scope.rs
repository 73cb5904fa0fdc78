//! Ownership of background tasks. Whoever owns the handle owns the task:
//! dropping it aborts the work.

use parking_lot::Mutex;
use std::future::Future;
use tokio::task::JoinHandle;

/// A single spawned task, aborted on drop.
#[derive(Debug)]
pub struct ScopedTask(JoinHandle<()>);

impl ScopedTask {
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        ScopedTask(tokio::spawn(fut))
    }

    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Tasks launched on behalf of one presentation context.
#[derive(Debug, Default)]
pub struct TaskScope {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    /// Number of tasks still running.
    pub fn active(&self) -> usize {
        let handles = self.handles.lock();
        handles.iter().filter(|handle| !handle.is_finished()).count()
    }

    pub fn shutdown(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.shutdown();
    }
}
