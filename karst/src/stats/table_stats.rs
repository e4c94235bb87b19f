//! Per-table statistics: tuple counts, page counts, and one histogram
//! per column.

use std::collections::HashMap;
use std::sync::Arc;

use limestone::catalog::Catalog;
use limestone::tuple::{CompareOp, Field, FieldType};
use limestone::{BufferPool, TransactionId};

use super::histogram::{IntHistogram, StringHistogram};
use crate::errors::ExecError;

/// Statistics over one base table, built from two full scans: the
/// first finds per-column ranges and the tuple count, the second fills
/// the histograms.
pub struct TableStats {
    total_tuples: usize,
    num_pages: usize,
    io_cost_per_page: f64,
    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
}

impl TableStats {
    pub fn new(
        table_id: u32,
        io_cost_per_page: f64,
        catalog: &Arc<Catalog>,
        pool: &Arc<BufferPool>,
        tid: TransactionId,
    ) -> Result<Self, ExecError> {
        let file = catalog.file(table_id)?;
        let desc = file.desc().clone();
        let num_fields = desc.num_fields();

        let mut iter = file.iterator(tid, pool.clone());
        iter.open();

        let mut ranges: Vec<Option<(i32, i32)>> = vec![None; num_fields];
        let mut total_tuples = 0usize;
        while let Some(t) = iter.next()? {
            total_tuples += 1;
            for i in 0..num_fields {
                if let Field::Int(v) = t.field(i) {
                    let r = ranges[i].get_or_insert((*v, *v));
                    r.0 = r.0.min(*v);
                    r.1 = r.1.max(*v);
                }
            }
        }

        let mut int_histograms = HashMap::new();
        let mut string_histograms = HashMap::new();
        for i in 0..num_fields {
            match desc.field_type(i) {
                FieldType::Int => {
                    let (min, max) = ranges[i].unwrap_or((0, 0));
                    let range = max as i64 - min as i64 + 1;
                    let buckets = (total_tuples / 20).min(range as usize).max(1);
                    int_histograms.insert(i, IntHistogram::new(buckets, min, max));
                }
                FieldType::Str => {
                    let buckets = (total_tuples / 20).min(1000).max(1);
                    string_histograms.insert(i, StringHistogram::new(buckets));
                }
            }
        }

        iter.rewind()?;
        while let Some(t) = iter.next()? {
            for i in 0..num_fields {
                match t.field(i) {
                    Field::Int(v) => {
                        if let Some(h) = int_histograms.get_mut(&i) {
                            h.add_value(*v);
                        }
                    }
                    Field::Str(s) => {
                        if let Some(h) = string_histograms.get_mut(&i) {
                            h.add_value(s);
                        }
                    }
                }
            }
        }
        iter.close();

        let num_pages = file.num_pages()?;
        crate::karst_debug_log!(
            "[TableStats] table {}: {} tuples over {} pages",
            table_id,
            total_tuples,
            num_pages
        );

        Ok(Self {
            total_tuples,
            num_pages,
            io_cost_per_page,
            int_histograms,
            string_histograms,
        })
    }

    /// Cost of reading the whole table: every page costs the same,
    /// however full it is.
    pub fn scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page
    }

    /// Expected number of tuples surviving a predicate with the given
    /// selectivity.
    pub fn cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    /// Estimated selectivity of `field op constant`, dispatched to the
    /// column's histogram. A constant of the wrong type selects
    /// nothing.
    pub fn selectivity(&self, field: usize, op: CompareOp, constant: &Field) -> f64 {
        match constant {
            Field::Int(v) => self
                .int_histograms
                .get(&field)
                .map(|h| h.estimate_selectivity(op, *v))
                .unwrap_or(0.0),
            Field::Str(s) => self
                .string_histograms
                .get(&field)
                .map(|h| h.estimate_selectivity(op, s))
                .unwrap_or(0.0),
        }
    }
}
