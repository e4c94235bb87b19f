//! Sequential scan over a heap file.

use std::sync::Arc;

use limestone::catalog::Catalog;
use limestone::heap_file::HeapFileIterator;
use limestone::tuple::{Tuple, TupleDesc};
use limestone::{BufferPool, TransactionId};

use super::Operator;
use crate::errors::ExecError;

/// Reads every tuple of a table in page/slot order, through the buffer
/// pool under the scanning transaction. Its schema carries the table
/// alias as an `alias.field` prefix on every name; a missing alias or
/// field name shows up as the literal `null`.
pub struct SeqScan {
    iter: HeapFileIterator,
    desc: Arc<TupleDesc>,
    opened: bool,
}

impl SeqScan {
    pub fn new(
        tid: TransactionId,
        table_id: u32,
        alias: Option<&str>,
        catalog: &Arc<Catalog>,
        pool: &Arc<BufferPool>,
    ) -> Result<Self, ExecError> {
        let file = catalog.file(table_id)?;
        let alias = alias.unwrap_or("null");
        let desc = Arc::new(TupleDesc::new(
            file.desc()
                .iter()
                .map(|(t, name)| {
                    (t, Some(format!("{}.{}", alias, name.unwrap_or("null"))))
                })
                .collect(),
        ));
        Ok(Self {
            iter: file.iterator(tid, pool.clone()),
            desc,
            opened: false,
        })
    }
}

impl Operator for SeqScan {
    fn open(&mut self) -> Result<(), ExecError> {
        self.iter.open();
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        Ok(self.iter.next()?)
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        self.iter.rewind()?;
        Ok(())
    }

    fn close(&mut self) {
        self.iter.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&self) -> Vec<&dyn Operator> {
        Vec::new()
    }

    fn set_children(&mut self, _children: Vec<Box<dyn Operator>>) {}
}
