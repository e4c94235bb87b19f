//! An operator over an in-memory list of tuples. The usual leaf for
//! DML pipelines and tests.

use std::sync::Arc;

use limestone::tuple::{Tuple, TupleDesc};

use super::Operator;
use crate::errors::ExecError;

pub struct TupleList {
    desc: Arc<TupleDesc>,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl TupleList {
    pub fn new(desc: Arc<TupleDesc>, tuples: Vec<Tuple>) -> Self {
        Self {
            desc,
            tuples,
            cursor: 0,
            opened: false,
        }
    }
}

impl Operator for TupleList {
    fn open(&mut self) -> Result<(), ExecError> {
        self.opened = true;
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        if self.cursor >= self.tuples.len() {
            return Ok(None);
        }
        let t = self.tuples[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(t))
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
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
