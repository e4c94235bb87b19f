//! The pull-based operator tree.
//!
//! Every operator exposes the same protocol: `open` it (which opens its
//! children), pull tuples with `next` until `None`, `rewind` to start
//! over, `close` when done. Pulling an operator that is not open is
//! `ExecError::Closed`. Operators compose through boxed children and
//! run single-threaded within one transaction.

mod aggregate;
mod dml;
mod filter;
mod join;
mod predicate;
mod scan;
mod tuple_list;

pub use aggregate::{AggOp, Aggregate};
pub use dml::{Delete, Insert};
pub use filter::Filter;
pub use join::Join;
pub use predicate::{JoinPredicate, Predicate};
pub use scan::SeqScan;
pub use tuple_list::TupleList;

use std::sync::Arc;

use limestone::tuple::{Tuple, TupleDesc};

use crate::errors::ExecError;

pub trait Operator {
    fn open(&mut self) -> Result<(), ExecError>;

    /// The next tuple, or `None` at end of stream.
    fn next(&mut self) -> Result<Option<Tuple>, ExecError>;

    /// Restarts the stream from the beginning.
    fn rewind(&mut self) -> Result<(), ExecError>;

    fn close(&mut self);

    /// The schema of the tuples this operator produces.
    fn tuple_desc(&self) -> Arc<TupleDesc>;

    fn children(&self) -> Vec<&dyn Operator>;

    fn set_children(&mut self, children: Vec<Box<dyn Operator>>);
}
