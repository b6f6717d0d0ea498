//! Atomically replaceable pool membership.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::pool::ConnectionPool;

/// Holds the current [`ConnectionPool`] and serialises membership changes.
///
/// Readers take a snapshot with [`load`](Self::load) and never block.
/// Writers (sniffs, `add_connection`, `set_connections`) must hold the
/// writer guard, so two topology refreshes can never interleave.
#[derive(Debug)]
pub struct PoolSlot {
    current: ArcSwap<ConnectionPool>,
    writer: Mutex<()>,
}

/// Proof that the caller owns the right to replace the pool.
pub type WriterGuard<'a> = MutexGuard<'a, ()>;

impl PoolSlot {
    pub fn new(pool: ConnectionPool) -> Self {
        pool.set_reporting(true);
        Self {
            current: ArcSwap::from_pointee(pool),
            writer: Mutex::new(()),
        }
    }

    /// Snapshot of the current membership.
    pub fn load(&self) -> Arc<ConnectionPool> {
        self.current.load_full()
    }

    pub async fn lock_writer(&self) -> WriterGuard<'_> {
        self.writer.lock().await
    }

    /// `None` when another membership change is in progress.
    pub fn try_lock_writer(&self) -> Option<WriterGuard<'_>> {
        self.writer.try_lock().ok()
    }

    /// Swap in a new pool; callers see either the old or the new one.
    pub fn replace(&self, _guard: &WriterGuard<'_>, pool: ConnectionPool) -> Arc<ConnectionPool> {
        pool.set_reporting(true);
        let old = self.current.swap(Arc::new(pool));
        old.set_reporting(false);
        old
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostConfig, PoolConfig};
    use crate::connection::testing::ScriptedSender;
    use crate::connection::Connection;

    fn pool(hosts: &[&str]) -> ConnectionPool {
        let conns = hosts
            .iter()
            .map(|h| {
                Arc::new(Connection::new(
                    HostConfig::new(*h, 9200),
                    Arc::new(ScriptedSender::ok()),
                ))
            })
            .collect();
        ConnectionPool::new(conns, &PoolConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn replace_is_visible_to_new_loads_only() {
        let slot = PoolSlot::new(pool(&["a", "b"]));
        let before = slot.load();

        let guard = slot.lock_writer().await;
        let old = slot.replace(&guard, pool(&["c"]));
        drop(guard);

        assert_eq!(old.len(), 2);
        assert_eq!(before.len(), 2);
        assert_eq!(slot.load().len(), 1);
        assert_eq!(slot.load().get_connection().unwrap().host().host, "c");
    }

    #[tokio::test]
    async fn writers_are_exclusive() {
        let slot = PoolSlot::new(pool(&["a", "b"]));
        let guard = slot.lock_writer().await;
        assert!(slot.try_lock_writer().is_none());
        drop(guard);
        assert!(slot.try_lock_writer().is_some());
    }
}
