#![allow(dead_code)]

use std::sync::Arc;

use karst::exec::Operator;
use limestone::catalog::Catalog;
use limestone::heap_file::HeapFile;
use limestone::transaction::TransactionManager;
use limestone::tuple::{Field, FieldType, Tuple, TupleDesc};
use limestone::BufferPool;
use tempfile::TempDir;

/// A throwaway database: a catalog, a pool, and an id generator over a
/// temp directory that disappears with the test.
pub struct TestDb {
    pub dir: TempDir,
    pub catalog: Arc<Catalog>,
    pub pool: Arc<BufferPool>,
    pub tm: TransactionManager,
}

pub fn setup() -> TestDb {
    setup_with_capacity(limestone::buffer_pool::DEFAULT_PAGES)
}

pub fn setup_with_capacity(capacity: usize) -> TestDb {
    let dir = TempDir::new().unwrap();
    let catalog = Arc::new(Catalog::new());
    let pool = Arc::new(BufferPool::with_capacity(capacity, catalog.clone()));
    TestDb {
        dir,
        catalog,
        pool,
        tm: TransactionManager::new(),
    }
}

pub fn create_table(db: &TestDb, name: &str, desc: TupleDesc) -> Arc<HeapFile> {
    let file = Arc::new(
        HeapFile::open(db.dir.path().join(format!("{}.dat", name)), Arc::new(desc)).unwrap(),
    );
    db.catalog.add_table(file.clone(), name);
    file
}

/// A schema of named int columns.
pub fn int_desc(names: &[&str]) -> TupleDesc {
    TupleDesc::new(
        names
            .iter()
            .map(|n| (FieldType::Int, Some(n.to_string())))
            .collect(),
    )
}

pub fn int_tuple(desc: &Arc<TupleDesc>, vals: &[i32]) -> Tuple {
    Tuple::new(desc.clone(), vals.iter().map(|v| Field::Int(*v)).collect()).unwrap()
}

/// Inserts the rows in their own committed transaction.
pub fn populate(db: &TestDb, table_id: u32, rows: &[Vec<i32>]) {
    let desc = db.catalog.tuple_desc(table_id).unwrap();
    let tid = db.tm.begin();
    for row in rows {
        db.pool
            .insert_tuple(tid, table_id, &int_tuple(&desc, row))
            .unwrap();
    }
    db.pool.transaction_complete(tid, true).unwrap();
}

/// Drains an already-open operator into rows of ints.
pub fn collect_ints(op: &mut dyn Operator) -> Vec<Vec<i32>> {
    let mut rows = Vec::new();
    while let Some(t) = op.next().unwrap() {
        rows.push(
            t.fields()
                .iter()
                .map(|f| match f {
                    Field::Int(v) => *v,
                    Field::Str(_) => panic!("expected int field"),
                })
                .collect(),
        );
    }
    rows
}
