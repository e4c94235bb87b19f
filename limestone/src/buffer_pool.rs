//! The buffer pool: the page cache and the gatekeeper for every page
//! access.
//!
//! `get_page` acquires the page lock before touching the cache, so the
//! pool is also where the two-phase locking discipline is enforced.
//! Eviction is NO-STEAL: a dirty page belongs to an in-flight
//! transaction and must never reach disk before that transaction
//! commits, so only clean pages are eviction candidates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::error::DbError;
use crate::lock_manager::{LockError, LockManager, LockMode};
use crate::lock_recover;
use crate::page::HeapPage;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::PageId;

/// Default number of resident pages.
pub const DEFAULT_PAGES: usize = 50;

/// A cached page handle. Contents are read or mutated under the
/// `RwLock`; the transaction-level page lock must already be held.
pub type SharedPage = Arc<RwLock<HeapPage>>;

/// Access intent for a page fetch, mapped onto shared or exclusive
/// page locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

struct CacheEntry {
    page: SharedPage,
    last_access: u64,
}

#[derive(Default)]
struct Cache {
    entries: HashMap<PageId, CacheEntry>,
    tick: u64,
}

pub struct BufferPool {
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    cache: Mutex<Cache>,
    max_pages: usize,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_capacity(DEFAULT_PAGES, catalog)
    }

    pub fn with_capacity(max_pages: usize, catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            lock_manager: LockManager::new(),
            cache: Mutex::new(Cache::default()),
            max_pages,
        }
    }

    /// Fetches a page, locking it first. Blocks while another
    /// transaction holds a conflicting lock. A deadlock verdict aborts
    /// the requesting transaction (its pages are discarded and its
    /// locks released) and surfaces as `TransactionAborted`.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<SharedPage, DbError> {
        let mode = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        if let Err(e) = self.lock_manager.acquire(tid, pid, mode) {
            match e {
                LockError::Deadlock => {
                    crate::limestone_debug_log!(
                        "[BufferPool::get_page] {} is the deadlock victim, aborting",
                        tid
                    );
                    self.transaction_complete(tid, false)?;
                }
                LockError::Cancelled => {}
            }
            return Err(DbError::TransactionAborted);
        }

        let mut cache = lock_recover(&self.cache);
        cache.tick += 1;
        let tick = cache.tick;
        if let Some(entry) = cache.entries.get_mut(&pid) {
            entry.last_access = tick;
            return Ok(entry.page.clone());
        }

        if cache.entries.len() >= self.max_pages {
            Self::evict(&mut cache)?;
        }
        let file = self.catalog.file(pid.table)?;
        let page: SharedPage = Arc::new(RwLock::new(file.read_page(pid)?));
        cache.entries.insert(
            pid,
            CacheEntry {
                page: page.clone(),
                last_access: tick,
            },
        );
        Ok(page)
    }

    /// Drops the oldest-accessed clean page. Dirty pages are pinned by
    /// NO-STEAL; if nothing is clean the caller's workload has outgrown
    /// the pool.
    fn evict(cache: &mut Cache) -> Result<(), DbError> {
        let victim = cache
            .entries
            .iter()
            .filter(|(_, e)| e.page.read().is_dirty().is_none())
            .min_by_key(|(_, e)| e.last_access)
            .map(|(pid, _)| *pid)
            .ok_or(DbError::NoCleanPage)?;
        crate::limestone_debug_log!(
            "[BufferPool::evict] dropping clean page {} of table {}",
            victim.page_no,
            victim.table
        );
        cache.entries.remove(&victim);
        Ok(())
    }

    /// Adds `t` to the named table, write-locking whatever pages the
    /// file touches and marking them dirty with `tid`. Pages the file
    /// produced are (re)installed in the cache so later fetches see the
    /// mutated version.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        t: &Tuple,
    ) -> Result<(), DbError> {
        let file = self.catalog.file(table_id)?;
        let touched = file.insert_tuple(tid, t, self)?;
        self.install_dirty(tid, touched);
        Ok(())
    }

    /// Removes `t` from its table; the page it lived on is marked dirty
    /// with `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, t: &Tuple) -> Result<(), DbError> {
        let rid = t.record_id().ok_or(DbError::NotOnPage)?;
        let file = self.catalog.file(rid.pid.table)?;
        let touched = file.delete_tuple(tid, t, self)?;
        self.install_dirty(tid, touched);
        Ok(())
    }

    fn install_dirty(&self, tid: TransactionId, pages: Vec<SharedPage>) {
        let mut cache = lock_recover(&self.cache);
        cache.tick += 1;
        let tick = cache.tick;
        for page in pages {
            let pid = {
                let mut p = page.write();
                p.mark_dirty(tid);
                p.id()
            };
            cache
                .entries
                .entry(pid)
                .or_insert(CacheEntry {
                    page: page.clone(),
                    last_access: tick,
                })
                .last_access = tick;
        }
    }

    /// Commits or aborts `tid` and releases all of its locks. Commit
    /// flushes the pages this transaction dirtied and resets their
    /// before images; abort discards them from the cache so the next
    /// fetch re-reads the committed bytes from disk. A failed commit
    /// flush aborts the transaction and surfaces the error.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<(), DbError> {
        let result = if commit {
            self.flush_pages(tid)
        } else {
            self.discard_pages_of(tid);
            Ok(())
        };
        if result.is_err() {
            self.discard_pages_of(tid);
        }
        self.lock_manager.release_all(tid);
        crate::limestone_debug_log!(
            "[BufferPool::transaction_complete] {} {}",
            tid,
            if commit { "committed" } else { "aborted" }
        );
        result
    }

    /// Writes every page `tid` dirtied to disk, snapshotting the new
    /// bytes as each page's before image.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), DbError> {
        for pid in self.lock_manager.exclusive_pages(tid) {
            let handle = {
                let cache = lock_recover(&self.cache);
                cache.entries.get(&pid).map(|e| e.page.clone())
            };
            let Some(handle) = handle else { continue };
            let mut page = handle.write();
            if page.is_dirty() == Some(tid) {
                let file = self.catalog.file(pid.table)?;
                file.write_page(&page)?;
                page.set_before_image();
                page.mark_clean();
            }
        }
        Ok(())
    }

    fn discard_pages_of(&self, tid: TransactionId) {
        for pid in self.lock_manager.exclusive_pages(tid) {
            let mut cache = lock_recover(&self.cache);
            let dirtied_here = cache
                .entries
                .get(&pid)
                .map(|e| e.page.read().is_dirty() == Some(tid))
                .unwrap_or(false);
            if dirtied_here {
                cache.entries.remove(&pid);
            }
        }
    }

    /// Writes every dirty resident page to disk. Breaks NO-STEAL for
    /// in-flight transactions; only for tests and shutdown.
    pub fn flush_all_pages(&self) -> Result<(), DbError> {
        let handles: Vec<(PageId, SharedPage)> = {
            let cache = lock_recover(&self.cache);
            cache
                .entries
                .iter()
                .map(|(pid, e)| (*pid, e.page.clone()))
                .collect()
        };
        for (pid, handle) in handles {
            let mut page = handle.write();
            if page.is_dirty().is_some() {
                let file = self.catalog.file(pid.table)?;
                file.write_page(&page)?;
                page.mark_clean();
            }
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn discard_page(&self, pid: PageId) {
        lock_recover(&self.cache).entries.remove(&pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    /// Page ids currently resident, for introspection and tests.
    pub fn resident_pages(&self) -> Vec<PageId> {
        lock_recover(&self.cache).entries.keys().copied().collect()
    }
}
