//! Grouped aggregation over a single field.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use limestone::tuple::{Field, FieldType, Tuple, TupleDesc};

use super::Operator;
use crate::errors::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
            AggOp::Count => "count",
        };
        write!(f, "{}", name)
    }
}

/// Running state for one group.
#[derive(Debug, Default, Clone)]
struct GroupState {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl GroupState {
    fn merge(&mut self, value: &Field) {
        self.count += 1;
        if let Field::Int(v) = value {
            self.sum += *v as i64;
            self.min = Some(self.min.map_or(*v, |m| m.min(*v)));
            self.max = Some(self.max.map_or(*v, |m| m.max(*v)));
        }
    }

    fn result(&self, op: AggOp) -> i32 {
        match op {
            AggOp::Count => self.count as i32,
            AggOp::Sum => self.sum as i32,
            // truncates toward zero, as integer division does
            AggOp::Avg => (self.sum / self.count) as i32,
            AggOp::Min => self.min.unwrap_or(0),
            AggOp::Max => self.max.unwrap_or(0),
        }
    }
}

/// Computes `op` over `field` of the child's tuples, keyed by the
/// optional group-by field. Output rows are `(group, aggregate)` when
/// grouped and a single `(aggregate)` otherwise; the aggregate column
/// is always an int. String fields admit only `Count`.
///
/// The child is drained on `open`; `rewind` replays the computed rows.
pub struct Aggregate {
    child: Box<dyn Operator>,
    group_by: Option<usize>,
    field: usize,
    op: AggOp,
    desc: Arc<TupleDesc>,
    results: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn Operator>,
        group_by: Option<usize>,
        field: usize,
        op: AggOp,
    ) -> Result<Self, ExecError> {
        let child_desc = child.tuple_desc();
        if child_desc.field_type(field) == FieldType::Str && op != AggOp::Count {
            return Err(ExecError::IllegalAggregate(format!(
                "{} is not defined over string fields",
                op
            )));
        }

        let agg_name = child_desc
            .field_name(field)
            .map(|n| format!("{}({})", op, n));
        let mut items = Vec::new();
        if let Some(g) = group_by {
            items.push((
                child_desc.field_type(g),
                child_desc.field_name(g).map(str::to_string),
            ));
        }
        items.push((FieldType::Int, agg_name));

        Ok(Self {
            child,
            group_by,
            field,
            op,
            desc: Arc::new(TupleDesc::new(items)),
            results: Vec::new(),
            cursor: 0,
            opened: false,
        })
    }

    fn materialize(&mut self) -> Result<(), ExecError> {
        let mut groups: HashMap<Option<Field>, GroupState> = HashMap::new();
        while let Some(t) = self.child.next()? {
            let key = self.group_by.map(|g| t.field(g).clone());
            groups.entry(key).or_default().merge(t.field(self.field));
        }

        self.results = Vec::with_capacity(groups.len());
        for (key, state) in groups {
            let mut fields = Vec::with_capacity(2);
            if let Some(group_val) = key {
                fields.push(group_val);
            }
            fields.push(Field::Int(state.result(self.op)));
            self.results.push(Tuple::new(self.desc.clone(), fields)?);
        }
        Ok(())
    }
}

impl Operator for Aggregate {
    fn open(&mut self) -> Result<(), ExecError> {
        self.child.open()?;
        self.opened = true;
        self.cursor = 0;
        self.materialize()
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.opened {
            return Err(ExecError::Closed);
        }
        if self.cursor >= self.results.len() {
            return Ok(None);
        }
        let t = self.results[self.cursor].clone();
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
        self.child.close();
        self.results.clear();
        self.cursor = 0;
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
