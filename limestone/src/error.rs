use std::fmt;
use std::io;

use crate::lock_manager::LockError;
use crate::PageId;

/// Errors surfaced by the storage layer.
#[derive(Debug)]
pub enum DbError {
    Io(io::Error),
    /// The page has no empty slot left.
    PageFull,
    /// A tuple's schema does not match the page or table it is headed for.
    SchemaMismatch,
    /// The tuple is not stored on the page it was addressed to.
    NotOnPage,
    /// The page id does not belong to the file, or is out of bounds.
    InvalidPageId(PageId),
    NoSuchField(String),
    NoSuchTable(String),
    /// Every resident page is dirty; nothing can be evicted without
    /// writing uncommitted data.
    NoCleanPage,
    /// The transaction was chosen as a deadlock victim and has been
    /// aborted; the caller must stop issuing work on its behalf.
    TransactionAborted,
    /// The iterator was used before `open` or after `close`.
    IteratorClosed,
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Io(e) => write!(f, "io error: {}", e),
            DbError::PageFull => write!(f, "page has no empty slots"),
            DbError::SchemaMismatch => write!(f, "tuple schema does not match"),
            DbError::NotOnPage => write!(f, "tuple is not on this page"),
            DbError::InvalidPageId(pid) => {
                write!(f, "invalid page id (table {}, page {})", pid.table, pid.page_no)
            }
            DbError::NoSuchField(name) => write!(f, "no such field: {}", name),
            DbError::NoSuchTable(name) => write!(f, "no such table: {}", name),
            DbError::NoCleanPage => write!(f, "no clean page to evict"),
            DbError::TransactionAborted => write!(f, "transaction aborted"),
            DbError::IteratorClosed => write!(f, "iterator is not open"),
        }
    }
}

impl std::error::Error for DbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DbError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for DbError {
    fn from(err: io::Error) -> Self {
        DbError::Io(err)
    }
}

impl From<LockError> for DbError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Deadlock | LockError::Cancelled => DbError::TransactionAborted,
        }
    }
}
