//! Nested-loop join.

use std::sync::Arc;

use limestone::tuple::{Tuple, TupleDesc};

use super::{JoinPredicate, Operator};
use crate::errors::ExecError;

/// For each left tuple the right child is scanned in full (rewinding it
/// between outer tuples) and every matching pair is emitted as the
/// concatenation of the two tuples.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    desc: Arc<TupleDesc>,
    current_left: Option<Tuple>,
    opened: bool,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn Operator>,
        right: Box<dyn Operator>,
    ) -> Self {
        let desc = Arc::new(TupleDesc::merge(&left.tuple_desc(), &right.tuple_desc()));
        Self {
            predicate,
            left,
            right,
            desc,
            current_left: None,
            opened: false,
        }
    }
}

impl Operator for Join {
    fn open(&mut self) -> Result<(), ExecError> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        loop {
            if self.current_left.is_none() {
                self.current_left = self.left.next()?;
                if self.current_left.is_none() {
                    return Ok(None);
                }
            }

            let left = self.current_left.as_ref().expect("outer tuple present");
            while let Some(right) = self.right.next()? {
                if self.predicate.eval(left, &right) {
                    let mut fields = left.fields().to_vec();
                    fields.extend(right.fields().iter().cloned());
                    return Ok(Some(Tuple::new(self.desc.clone(), fields)?));
                }
            }

            self.current_left = None;
            self.right.rewind()?;
        }
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&self) -> Vec<&dyn Operator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>) {
        let mut iter = children.into_iter();
        if let Some(left) = iter.next() {
            self.left = left;
        }
        if let Some(right) = iter.next() {
            self.right = right;
        }
    }
}
