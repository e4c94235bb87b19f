//! Page-level locks for concurrency control.
//!
//! Each page has a set of shared holders and at most one exclusive
//! holder. Blocked requesters sleep in short jittered slices on a
//! condvar, and on every blocked attempt re-register their edges in the
//! waits-for graph and re-run cycle detection; a requester that closes a
//! cycle is the deadlock victim.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use rand::Rng;

use crate::lock_recover;
use crate::transaction::TransactionId;
use crate::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
pub enum LockError {
    /// Granting the request would close a waits-for cycle; the requester
    /// is the victim and must abort.
    Deadlock,
    /// The owning transaction released its locks while this request was
    /// blocked; the wait is abandoned without the lock.
    Cancelled,
}

#[derive(Debug, Default)]
struct LockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockState {
    fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }
}

#[derive(Debug, Default)]
struct LockTables {
    locks: HashMap<PageId, LockState>,
    /// Maps a waiting transaction to the holders it is blocked on.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
    /// Blocked requesters whose transaction has since released all locks.
    cancelled: HashSet<TransactionId>,
}

/// The lock manager: one monitor around the lock table and the
/// waits-for graph.
#[derive(Debug, Default)]
pub struct LockManager {
    tables: Mutex<LockTables>,
    cvar: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is granted, or fails with `Deadlock` when
    /// this request closes a waits-for cycle. Re-acquiring a lock of
    /// equal or lesser strength is a no-op; the sole shared holder may
    /// upgrade to exclusive.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    ) -> Result<(), LockError> {
        let mut tables = lock_recover(&self.tables);
        loop {
            if tables.cancelled.remove(&tid) {
                tables.waits_for.remove(&tid);
                return Err(LockError::Cancelled);
            }

            if Self::try_grant(&mut tables, tid, pid, mode) {
                tables.waits_for.remove(&tid);
                return Ok(());
            }

            let blockers = Self::blockers(&tables, tid, pid, mode);
            tables.waits_for.insert(tid, blockers);
            if Self::closes_cycle(&tables.waits_for, tid) {
                crate::limestone_debug_log!(
                    "[LockManager] deadlock: {} requesting {:?} on table {} page {}",
                    tid,
                    mode,
                    pid.table,
                    pid.page_no
                );
                tables.waits_for.remove(&tid);
                self.cvar.notify_all();
                return Err(LockError::Deadlock);
            }

            let jitter = rand::thread_rng().gen_range(1..=4);
            let (guard, _timeout) = self
                .cvar
                .wait_timeout(tables, Duration::from_millis(jitter))
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            tables = guard;
        }
    }

    fn try_grant(tables: &mut LockTables, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let state = tables.locks.entry(pid).or_default();
        match mode {
            LockMode::Shared => {
                if state.exclusive.is_none() || state.exclusive == Some(tid) {
                    state.shared.insert(tid);
                    true
                } else {
                    false
                }
            }
            LockMode::Exclusive => {
                if state.exclusive == Some(tid) {
                    return true;
                }
                let sole_holder = state.shared.is_empty()
                    || (state.shared.len() == 1 && state.shared.contains(&tid));
                if state.exclusive.is_none() && sole_holder {
                    state.shared.remove(&tid);
                    state.exclusive = Some(tid);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn blockers(
        tables: &LockTables,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
    ) -> HashSet<TransactionId> {
        let mut blockers = HashSet::new();
        if let Some(state) = tables.locks.get(&pid) {
            if let Some(holder) = state.exclusive {
                if holder != tid {
                    blockers.insert(holder);
                }
            }
            if mode == LockMode::Exclusive {
                blockers.extend(state.shared.iter().copied().filter(|t| *t != tid));
            }
        }
        blockers
    }

    fn closes_cycle(
        waits_for: &HashMap<TransactionId, HashSet<TransactionId>>,
        start: TransactionId,
    ) -> bool {
        let mut visited = HashSet::new();
        let mut path = HashSet::new();
        Self::dfs_detect(start, waits_for, &mut visited, &mut path)
    }

    fn dfs_detect(
        current: TransactionId,
        waits_for: &HashMap<TransactionId, HashSet<TransactionId>>,
        visited: &mut HashSet<TransactionId>,
        path: &mut HashSet<TransactionId>,
    ) -> bool {
        visited.insert(current);
        path.insert(current);

        if let Some(next_set) = waits_for.get(&current) {
            for &next in next_set {
                if path.contains(&next) {
                    return true;
                }
                if !visited.contains(&next) && Self::dfs_detect(next, waits_for, visited, path) {
                    return true;
                }
            }
        }

        path.remove(&current);
        false
    }

    /// Drops one lock. Silently a no-op when `tid` does not hold it.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut tables = lock_recover(&self.tables);
        if let Some(state) = tables.locks.get_mut(&pid) {
            if state.exclusive == Some(tid) {
                state.exclusive = None;
            }
            state.shared.remove(&tid);
            if state.is_empty() {
                tables.locks.remove(&pid);
            }
        }
        self.cvar.notify_all();
    }

    /// Drops every lock held by `tid`, removes it from the waits-for
    /// graph, and cancels any request it still has blocked.
    pub fn release_all(&self, tid: TransactionId) {
        let mut tables = lock_recover(&self.tables);
        tables.locks.retain(|_, state| {
            if state.exclusive == Some(tid) {
                state.exclusive = None;
            }
            state.shared.remove(&tid);
            !state.is_empty()
        });

        if tables.waits_for.remove(&tid).is_some() {
            tables.cancelled.insert(tid);
        }
        for blocked_on in tables.waits_for.values_mut() {
            blocked_on.remove(&tid);
        }
        self.cvar.notify_all();
    }

    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        let tables = lock_recover(&self.tables);
        tables
            .locks
            .get(&pid)
            .map(|state| state.exclusive == Some(tid) || state.shared.contains(&tid))
            .unwrap_or(false)
    }

    /// Pages on which `tid` holds the exclusive lock: the working set
    /// the buffer pool walks at commit/abort.
    pub fn exclusive_pages(&self, tid: TransactionId) -> HashSet<PageId> {
        let tables = lock_recover(&self.tables);
        tables
            .locks
            .iter()
            .filter(|(_, state)| state.exclusive == Some(tid))
            .map(|(pid, _)| *pid)
            .collect()
    }
}
