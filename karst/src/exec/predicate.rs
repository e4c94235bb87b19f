//! Tuple predicates for filters and joins.

use limestone::tuple::{CompareOp, Field, Tuple};

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    pub fn eval(&self, t: &Tuple) -> bool {
        t.field(self.field).compare(self.op, &self.operand)
    }
}

/// Compares a field of a left tuple against a field of a right tuple.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    left_field: usize,
    op: CompareOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CompareOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn eval(&self, left: &Tuple, right: &Tuple) -> bool {
        left.field(self.left_field)
            .compare(self.op, right.field(self.right_field))
    }
}
