//! Relational select: passes through tuples matching a predicate.

use std::sync::Arc;

use limestone::tuple::{Tuple, TupleDesc};

use super::{Operator, Predicate};
use crate::errors::ExecError;

pub struct Filter {
    predicate: Predicate,
    child: Box<dyn Operator>,
    opened: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn Operator>) -> Self {
        Self {
            predicate,
            child,
            opened: false,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Operator for Filter {
    fn open(&mut self) -> Result<(), ExecError> {
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        while let Some(t) = self.child.next()? {
            if self.predicate.eval(&t) {
                return Ok(Some(t));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.child.tuple_desc()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::TupleList;
    use limestone::tuple::{CompareOp, Field, FieldType};

    fn ints(desc: &Arc<TupleDesc>, vals: &[i32]) -> Vec<Tuple> {
        vals.iter()
            .map(|v| Tuple::new(desc.clone(), vec![Field::Int(*v)]).unwrap())
            .collect()
    }

    #[test]
    fn keeps_only_matching_tuples() {
        let desc = Arc::new(TupleDesc::unnamed(vec![FieldType::Int]));
        let child = TupleList::new(desc.clone(), ints(&desc, &[1, 5, 3, 8, 5]));
        let mut filter = Filter::new(
            Predicate::new(0, CompareOp::Ge, Field::Int(5)),
            Box::new(child),
        );

        filter.open().unwrap();
        let mut seen = Vec::new();
        while let Some(t) = filter.next().unwrap() {
            if let Field::Int(v) = t.field(0) {
                seen.push(*v);
            }
        }
        assert_eq!(seen, vec![5, 8, 5]);
    }

    #[test]
    fn next_before_open_is_an_error() {
        let desc = Arc::new(TupleDesc::unnamed(vec![FieldType::Int]));
        let child = TupleList::new(desc.clone(), Vec::new());
        let mut filter = Filter::new(
            Predicate::new(0, CompareOp::Eq, Field::Int(0)),
            Box::new(child),
        );
        assert!(matches!(filter.next(), Err(ExecError::Closed)));
    }
}
