//! Transaction identity.
//!
//! A transaction here is only a name: locks, dirty flags, and the
//! commit/abort paths in the buffer pool are all keyed by it. There is
//! no status tracking; a transaction ends when
//! `BufferPool::transaction_complete` runs for it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Vends monotonically increasing transaction ids.
#[derive(Debug, Default)]
pub struct TransactionManager {
    next: AtomicU64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> TransactionId {
        TransactionId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}
