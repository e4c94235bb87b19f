//! Insert and Delete: drain a child into the buffer pool once and
//! report the affected-row count as a single one-column tuple.

use std::sync::Arc;

use limestone::catalog::Catalog;
use limestone::tuple::{Field, FieldType, Tuple, TupleDesc};
use limestone::{BufferPool, DbError, TransactionId};

use super::Operator;
use crate::errors::ExecError;

fn count_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::unnamed(vec![FieldType::Int]))
}

fn count_tuple(desc: &Arc<TupleDesc>, n: i32) -> Result<Tuple, ExecError> {
    Ok(Tuple::new(desc.clone(), vec![Field::Int(n)])?)
}

/// Inserts every child tuple into a table through the buffer pool.
/// The first `next` does all the work and yields `(count)`; later
/// pulls are end of stream until `rewind` resets the latch.
pub struct Insert {
    tid: TransactionId,
    child: Box<dyn Operator>,
    table_id: u32,
    pool: Arc<BufferPool>,
    desc: Arc<TupleDesc>,
    called: bool,
    opened: bool,
}

impl Insert {
    /// Fails up front when the child's schema does not match the
    /// table's.
    pub fn new(
        tid: TransactionId,
        child: Box<dyn Operator>,
        table_id: u32,
        catalog: &Arc<Catalog>,
        pool: &Arc<BufferPool>,
    ) -> Result<Self, ExecError> {
        if *child.tuple_desc() != *catalog.tuple_desc(table_id)? {
            return Err(ExecError::Db(DbError::SchemaMismatch));
        }
        Ok(Self {
            tid,
            child,
            table_id,
            pool: pool.clone(),
            desc: count_desc(),
            called: false,
            opened: false,
        })
    }
}

impl Operator for Insert {
    fn open(&mut self) -> Result<(), ExecError> {
        self.child.open()?;
        self.called = false;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        if self.called {
            return Ok(None);
        }
        self.called = true;

        let mut count = 0;
        while let Some(t) = self.child.next()? {
            self.pool.insert_tuple(self.tid, self.table_id, &t)?;
            count += 1;
        }
        crate::karst_debug_log!(
            "[Insert] {} inserted {} tuples into table {}",
            self.tid,
            count,
            self.table_id
        );
        Ok(Some(count_tuple(&self.desc, count)?))
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        self.child.rewind()?;
        self.called = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&self) -> Vec<&dyn Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) {
        if let Some(child) = children.into_iter().next() {
            self.child = child;
        }
    }
}

/// Deletes every child tuple from the table it lives in, through the
/// buffer pool. Same drain-once protocol as `Insert`.
pub struct Delete {
    tid: TransactionId,
    child: Box<dyn Operator>,
    pool: Arc<BufferPool>,
    desc: Arc<TupleDesc>,
    called: bool,
    opened: bool,
}

impl Delete {
    pub fn new(tid: TransactionId, child: Box<dyn Operator>, pool: &Arc<BufferPool>) -> Self {
        Self {
            tid,
            child,
            pool: pool.clone(),
            desc: count_desc(),
            called: false,
            opened: false,
        }
    }
}

impl Operator for Delete {
    fn open(&mut self) -> Result<(), ExecError> {
        self.child.open()?;
        self.called = false;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        if self.called {
            return Ok(None);
        }
        self.called = true;

        let mut count = 0;
        while let Some(t) = self.child.next()? {
            self.pool.delete_tuple(self.tid, &t)?;
            count += 1;
        }
        crate::karst_debug_log!("[Delete] {} deleted {} tuples", self.tid, count);
        Ok(Some(count_tuple(&self.desc, count)?))
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        self.child.rewind()?;
        self.called = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&self) -> Vec<&dyn Operator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) {
        if let Some(child) = children.into_iter().next() {
            self.child = child;
        }
    }
}
