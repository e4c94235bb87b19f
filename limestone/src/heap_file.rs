//! Heap files: a table stored as a dense array of fixed-size pages.
//!
//! The file itself is read-through: it never caches pages. Every tuple
//! operation and every scan goes through the buffer pool, which is the
//! only cache and the place locks are taken.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::buffer_pool::{BufferPool, Permissions};
use crate::error::DbError;
use crate::lock_recover;
use crate::page::{empty_page_data, HeapPage};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{PageId, PAGE_SIZE};

/// A table on disk. The table id is a crc32 of the file's absolute
/// path, so it is stable across runs as long as the path is.
pub struct HeapFile {
    file: Mutex<File>,
    path: PathBuf,
    id: u32,
    desc: Arc<TupleDesc>,
    /// Serializes file extension so concurrent inserters cannot append
    /// two pages where one is needed.
    append_lock: Mutex<()>,
}

impl HeapFile {
    /// Opens (creating if absent) the backing file.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<Self, DbError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let abs = std::fs::canonicalize(path_ref)?;
        let id = crc32fast::hash(abs.to_string_lossy().as_bytes());
        crate::limestone_debug_log!("[HeapFile::open] {:?} -> table id {}", abs, id);

        Ok(Self {
            file: Mutex::new(file),
            path: abs,
            id,
            desc,
            append_lock: Mutex::new(()),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Number of whole pages currently on disk, computed from the file
    /// length on every call.
    pub fn num_pages(&self) -> Result<usize, DbError> {
        let file = lock_recover(&self.file);
        Ok(file.metadata()?.len() as usize / PAGE_SIZE)
    }

    /// Reads and parses one page. The id must name this table and an
    /// existing page.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage, DbError> {
        if pid.table != self.id || (pid.page_no as usize) >= self.num_pages()? {
            return Err(DbError::InvalidPageId(pid));
        }
        let mut data = vec![0u8; PAGE_SIZE];
        {
            let mut file = lock_recover(&self.file);
            file.seek(SeekFrom::Start(pid.page_no as u64 * PAGE_SIZE as u64))?;
            file.read_exact(&mut data)?;
        }
        HeapPage::new(pid, self.desc.clone(), &data)
    }

    /// Writes one page back at its offset. Writing at `num_pages`
    /// extends the file by exactly one page.
    pub fn write_page(&self, page: &HeapPage) -> Result<(), DbError> {
        let pid = page.id();
        if pid.table != self.id || (pid.page_no as usize) > self.num_pages()? {
            return Err(DbError::InvalidPageId(pid));
        }
        let data = page.serialize();
        let mut file = lock_recover(&self.file);
        file.seek(SeekFrom::Start(pid.page_no as u64 * PAGE_SIZE as u64))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    fn append_empty_page(&self, page_no: u32) -> Result<(), DbError> {
        crate::limestone_debug_log!(
            "[HeapFile::append_empty_page] table {} extending to page {}",
            self.id,
            page_no
        );
        let mut file = lock_recover(&self.file);
        file.seek(SeekFrom::Start(page_no as u64 * PAGE_SIZE as u64))?;
        file.write_all(&empty_page_data())?;
        file.sync_all()?;
        Ok(())
    }

    /// Inserts `t` into the last page with a free slot, fetching pages
    /// write-intent through the pool. When every page is full the file
    /// grows by one zeroed page; the append is re-checked under a mutex
    /// so two inserters cannot both extend. Returns the pages touched.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        t: &Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<crate::buffer_pool::SharedPage>, DbError> {
        if **t.desc() != **self.desc() {
            return Err(DbError::SchemaMismatch);
        }
        loop {
            let n = self.num_pages()?;
            for page_no in (0..n).rev() {
                let pid = PageId::new(self.id, page_no as u32);
                let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
                let mut page = handle.write();
                if page.empty_slot_count() > 0 {
                    page.insert_tuple(t)?;
                    drop(page);
                    return Ok(vec![handle]);
                }
            }
            let _append = lock_recover(&self.append_lock);
            if self.num_pages()? == n {
                self.append_empty_page(n as u32)?;
            }
            // loop around and insert into the page that now has room
        }
    }

    /// Deletes `t` from its page, fetched write-intent through the pool.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        t: &Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<crate::buffer_pool::SharedPage>, DbError> {
        let rid = t.record_id().ok_or(DbError::NotOnPage)?;
        if rid.pid.table != self.id {
            return Err(DbError::InvalidPageId(rid.pid));
        }
        let handle = pool.get_page(tid, rid.pid, Permissions::ReadWrite)?;
        handle.write().delete_tuple(t)?;
        Ok(vec![handle])
    }

    /// A scan over every tuple in the file, in page order then slot
    /// order. Must be `open`ed before `next` is called.
    pub fn iterator(
        self: &Arc<Self>,
        tid: TransactionId,
        pool: Arc<BufferPool>,
    ) -> HeapFileIterator {
        HeapFileIterator {
            file: self.clone(),
            pool,
            tid,
            opened: false,
            next_page: 0,
            buffer: Vec::new().into_iter(),
        }
    }
}

/// Pull-style scan over a heap file. Pages are fetched `ReadOnly`
/// through the buffer pool one at a time; the current page's tuples are
/// copied out so no page lock is held between `next` calls.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    opened: bool,
    next_page: u32,
    buffer: std::vec::IntoIter<Tuple>,
}

impl HeapFileIterator {
    pub fn open(&mut self) {
        self.opened = true;
        self.next_page = 0;
        self.buffer = Vec::new().into_iter();
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, DbError> {
        if !self.opened {
            return Err(DbError::IteratorClosed);
        }
        loop {
            if let Some(t) = self.buffer.next() {
                return Ok(Some(t));
            }
            if (self.next_page as usize) >= self.file.num_pages()? {
                return Ok(None);
            }
            let pid = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;
            let handle = self
                .pool
                .get_page(self.tid, pid, Permissions::ReadOnly)?;
            let tuples: Vec<Tuple> = handle.read().iter().cloned().collect();
            self.buffer = tuples.into_iter();
        }
    }

    /// Restarts the scan from page 0.
    pub fn rewind(&mut self) -> Result<(), DbError> {
        if !self.opened {
            return Err(DbError::IteratorClosed);
        }
        self.next_page = 0;
        self.buffer = Vec::new().into_iter();
        Ok(())
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.buffer = Vec::new().into_iter();
    }
}
