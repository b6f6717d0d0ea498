//! Live/dead connection bookkeeping and node selection.
//!
//! # Responsibilities
//! - Pick the least-used live connection (ties: least recently used)
//! - Move failed connections to the dead set with exponential backoff
//! - Resurrect dead connections once their timeout elapses, or forcibly
//!   when nothing is live
//!
//! # Design Decisions
//! - One `parking_lot::Mutex` around all structures; never held across I/O
//! - Both heaps use lazy invalidation: every state change bumps the member's
//!   stamp, and heap entries with an old stamp are discarded when popped
//! - A single-connection pool skips bookkeeping entirely

use parking_lot::Mutex;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::PoolConfig;
use crate::connection::{Connection, ConnectionId};
use crate::observability::metrics;
use crate::resilience::{dead_timeout, deadline_after};
use crate::transport::Error;

/// Selection key of a live connection; the smallest key is picked next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct LiveKey {
    uses: u64,
    /// `None` (never used) sorts before any timestamp.
    last_used: Option<Instant>,
    order: usize,
    stamp: u64,
    id: ConnectionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DeadKey {
    resurrect_at: Instant,
    order: usize,
    stamp: u64,
    id: ConnectionId,
}

#[derive(Debug)]
struct Member {
    conn: Arc<Connection>,
    /// Position in the membership list, used as the final tie-breaker.
    order: usize,
    uses: u64,
    last_used: Option<Instant>,
    stamp: u64,
}

impl Member {
    fn live_key(&self) -> LiveKey {
        LiveKey {
            uses: self.uses,
            last_used: self.last_used,
            order: self.order,
            stamp: self.stamp,
            id: self.conn.id(),
        }
    }
}

#[derive(Debug)]
struct PoolState {
    members: HashMap<ConnectionId, Member>,
    live: BinaryHeap<Reverse<LiveKey>>,
    dead: BinaryHeap<Reverse<DeadKey>>,
    dead_ids: HashSet<ConnectionId>,
}

impl PoolState {
    fn new(connections: Vec<Arc<Connection>>) -> Self {
        let mut members = HashMap::with_capacity(connections.len());
        let mut live = BinaryHeap::with_capacity(connections.len());
        for (order, conn) in connections.into_iter().enumerate() {
            let member = Member {
                conn,
                order,
                uses: 0,
                last_used: None,
                stamp: 0,
            };
            live.push(Reverse(member.live_key()));
            members.insert(member.conn.id(), member);
        }
        Self {
            members,
            live,
            dead: BinaryHeap::new(),
            dead_ids: HashSet::new(),
        }
    }

    fn is_current_live(&self, key: &LiveKey) -> bool {
        !self.dead_ids.contains(&key.id)
            && self.members.get(&key.id).is_some_and(|m| m.stamp == key.stamp)
    }

    fn is_current_dead(&self, key: &DeadKey) -> bool {
        self.dead_ids.contains(&key.id)
            && self.members.get(&key.id).is_some_and(|m| m.stamp == key.stamp)
    }

    /// Smallest valid live key, discarding stale entries on the way.
    fn peek_live(&mut self) -> Option<LiveKey> {
        while let Some(Reverse(key)) = self.live.peek().copied() {
            if self.is_current_live(&key) {
                return Some(key);
            }
            self.live.pop();
        }
        None
    }

    fn peek_dead(&mut self) -> Option<DeadKey> {
        while let Some(Reverse(key)) = self.dead.peek().copied() {
            if self.is_current_dead(&key) {
                return Some(key);
            }
            self.dead.pop();
        }
        None
    }

    /// Put a member back into the live heap.
    ///
    /// Its usage count is raised to the current live minimum so a node that
    /// sat out a long backoff does not absorb all traffic on return.
    fn revive(&mut self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.dead_ids.remove(&id);
        let floor = self.peek_live().map(|k| k.uses).unwrap_or(0);
        let member = self.members.get_mut(&id)?;
        member.stamp += 1;
        member.uses = member.uses.max(floor);
        let key = member.live_key();
        let conn = member.conn.clone();
        self.live.push(Reverse(key));
        Some(conn)
    }

    fn resurrect(&mut self, now: Instant, force: bool) -> Option<Arc<Connection>> {
        let key = self.peek_dead()?;
        if !force && key.resurrect_at > now {
            return None;
        }
        self.dead.pop();
        let conn = self.revive(key.id)?;
        conn.record_resurrected();
        tracing::info!(
            node = %conn,
            forced = force,
            failures = conn.consecutive_failures(),
            "Resurrecting dead connection"
        );
        metrics::record_resurrected(&conn.address(), force);
        Some(conn)
    }

    fn select(&mut self, now: Instant) -> Option<Arc<Connection>> {
        // Every connection whose timeout has passed gets its trial.
        while self.resurrect(now, false).is_some() {}

        if self.peek_live().is_none() {
            self.resurrect(now, true)?;
        }

        let key = self.peek_live()?;
        self.live.pop();
        let member = self.members.get_mut(&key.id)?;
        member.uses += 1;
        member.last_used = Some(now);
        member.stamp += 1;
        let next = member.live_key();
        let conn = member.conn.clone();
        self.live.push(Reverse(next));
        Some(conn)
    }

    fn live_count(&self) -> usize {
        self.members.len() - self.dead_ids.len()
    }
}

enum Mode {
    /// Exactly one node: no failover is possible, so no bookkeeping.
    Single(Arc<Connection>),
    Multi(Mutex<PoolState>),
}

/// Set of connections to the cluster with failure-aware selection.
pub struct ConnectionPool {
    mode: Mode,
    dead_timeout: Duration,
    max_dead_timeout: Duration,
    /// Set while this pool is the installed one; only it feeds the size gauge.
    reporting: AtomicBool,
}

impl ConnectionPool {
    /// Build a pool; every connection starts live.
    ///
    /// Fails with [`Error::Configuration`] when `connections` is empty.
    pub fn new(connections: Vec<Arc<Connection>>, config: &PoolConfig) -> Result<Self, Error> {
        let mode = match connections.len() {
            0 => return Err(Error::Configuration("no connections configured".to_string())),
            1 => Mode::Single(connections[0].clone()),
            _ => Mode::Multi(Mutex::new(PoolState::new(connections))),
        };
        Ok(Self {
            mode,
            dead_timeout: config.dead_timeout(),
            max_dead_timeout: config.max_dead_timeout(),
            reporting: AtomicBool::new(false),
        })
    }

    /// Start or stop publishing this pool's live/dead sizes.
    pub(crate) fn set_reporting(&self, reporting: bool) {
        self.reporting.store(reporting, Ordering::Release);
        if reporting {
            metrics::record_pool_size(self.live_count(), self.dead_count());
        }
    }

    fn report_size(&self, state: &PoolState) {
        if self.reporting.load(Ordering::Acquire) {
            metrics::record_pool_size(state.live_count(), state.dead_ids.len());
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self.mode, Mode::Single(_))
    }

    /// Select a connection for one attempt.
    pub fn get_connection(&self) -> Result<Arc<Connection>, Error> {
        self.get_connection_at(Instant::now())
    }

    /// [`get_connection`](Self::get_connection) with an explicit clock.
    pub fn get_connection_at(&self, now: Instant) -> Result<Arc<Connection>, Error> {
        match &self.mode {
            Mode::Single(conn) => Ok(conn.clone()),
            Mode::Multi(state) => {
                let mut state = state.lock();
                let dead_before = state.dead_ids.len();
                let selected = state.select(now);
                if state.dead_ids.len() != dead_before {
                    self.report_size(&state);
                }
                selected.ok_or_else(|| Error::Configuration("connection pool is empty".to_string()))
            }
        }
    }

    /// Take `conn` out of rotation until its backoff elapses.
    pub fn mark_dead(&self, conn: &Connection) {
        self.mark_dead_at(conn, Instant::now())
    }

    pub fn mark_dead_at(&self, conn: &Connection, now: Instant) {
        let Mode::Multi(state) = &self.mode else {
            return;
        };
        let mut state = state.lock();
        let id = conn.id();
        if state.dead_ids.contains(&id) {
            return;
        }
        let Some(member) = state.members.get_mut(&id) else {
            tracing::debug!(node = %conn, "Ignoring mark_dead for connection outside the pool");
            return;
        };

        let timeout = dead_timeout(
            member.conn.consecutive_failures(),
            self.dead_timeout,
            self.max_dead_timeout,
        );
        let resurrect_at = deadline_after(now, timeout);
        member.conn.record_failure(now, resurrect_at);
        member.stamp += 1;
        let key = DeadKey {
            resurrect_at,
            order: member.order,
            stamp: member.stamp,
            id,
        };
        state.dead_ids.insert(id);
        state.dead.push(Reverse(key));

        tracing::warn!(
            node = %conn,
            failures = conn.consecutive_failures(),
            dead_for = ?timeout,
            "Marking connection dead"
        );
        metrics::record_marked_dead(&conn.address());
        self.report_size(&state);
    }

    /// Reset `conn`'s failure count and make sure it is live.
    pub fn mark_live(&self, conn: &Connection) {
        let Mode::Multi(state) = &self.mode else {
            return;
        };
        let mut state = state.lock();
        let id = conn.id();
        if !state.members.contains_key(&id) {
            return;
        }
        conn.record_success();
        if state.dead_ids.contains(&id) {
            state.revive(id);
            self.report_size(&state);
        }
        tracing::debug!(node = %conn, "Connection marked live");
    }

    /// Revive the dead connection with the earliest deadline.
    ///
    /// Without `force` only a connection whose timeout has elapsed qualifies.
    pub fn resurrect(&self, force: bool) -> Option<Arc<Connection>> {
        self.resurrect_at(Instant::now(), force)
    }

    pub fn resurrect_at(&self, now: Instant, force: bool) -> Option<Arc<Connection>> {
        match &self.mode {
            Mode::Single(_) => None,
            Mode::Multi(state) => {
                let mut state = state.lock();
                let revived = state.resurrect(now, force);
                if revived.is_some() {
                    self.report_size(&state);
                }
                revived
            }
        }
    }

    /// Every member, in membership order.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        match &self.mode {
            Mode::Single(conn) => vec![conn.clone()],
            Mode::Multi(state) => {
                let state = state.lock();
                let mut members: Vec<_> = state.members.values().collect();
                members.sort_by_key(|m| m.order);
                members.into_iter().map(|m| m.conn.clone()).collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.mode {
            Mode::Single(_) => 1,
            Mode::Multi(state) => state.lock().members.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn live_count(&self) -> usize {
        match &self.mode {
            Mode::Single(_) => 1,
            Mode::Multi(state) => state.lock().live_count(),
        }
    }

    pub fn dead_count(&self) -> usize {
        match &self.mode {
            Mode::Single(_) => 0,
            Mode::Multi(state) => state.lock().dead_ids.len(),
        }
    }

    /// How many times each member has been selected, in membership order.
    pub fn usage_counts(&self) -> Vec<u64> {
        match &self.mode {
            Mode::Single(_) => vec![0],
            Mode::Multi(state) => {
                let state = state.lock();
                let mut members: Vec<_> = state.members.values().collect();
                members.sort_by_key(|m| m.order);
                members.into_iter().map(|m| m.uses).collect()
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("connections", &self.len())
            .field("live", &self.live_count())
            .field("dead", &self.dead_count())
            .finish()
    }
}
