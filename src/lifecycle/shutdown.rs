//! Shutdown coordination for background tasks.

use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Owns the transport's background tasks and the signal that stops them.
///
/// Tasks started through [`Shutdown::spawn`] get their own receiver and are
/// joined by [`Shutdown::close`]. Dropping the coordinator only signals.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Start a task that exits when it hears on the receiver it is handed.
    pub fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.subscribe()));
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Signal every subscriber; a no-op when none are left.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Signal, then wait for every spawned task to return.
    pub async fn close(&self) {
        self.trigger();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(error = %e, "background task panicked");
                }
            }
        }
    }

    /// Spawned tasks that have not returned yet.
    pub fn running(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Number of receivers still open.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
