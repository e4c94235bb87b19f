//! The table registry: names, table ids, files, and schemas.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::DbError;
use crate::heap_file::HeapFile;
use crate::lock_recover;
use crate::tuple::TupleDesc;

#[derive(Default)]
struct CatalogInner {
    files: HashMap<u32, Arc<HeapFile>>,
    names: HashMap<u32, String>,
    ids: HashMap<String, u32>,
}

/// Maps `name <-> table id <-> (heap file, schema)`. Registering a table
/// under an existing name or id replaces the previous entry; the latest
/// registration wins.
#[derive(Default)]
pub struct Catalog {
    inner: Mutex<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let id = file.id();
        let mut inner = lock_recover(&self.inner);
        if let Some(old_id) = inner.ids.insert(name.to_string(), id) {
            if old_id != id {
                inner.files.remove(&old_id);
                inner.names.remove(&old_id);
            }
        }
        if let Some(old_name) = inner.names.insert(id, name.to_string()) {
            if old_name != name {
                inner.ids.remove(&old_name);
            }
        }
        inner.files.insert(id, file);
    }

    pub fn file(&self, table_id: u32) -> Result<Arc<HeapFile>, DbError> {
        lock_recover(&self.inner)
            .files
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::NoSuchTable(format!("table id {}", table_id)))
    }

    pub fn tuple_desc(&self, table_id: u32) -> Result<Arc<TupleDesc>, DbError> {
        Ok(self.file(table_id)?.desc().clone())
    }

    pub fn table_name(&self, table_id: u32) -> Result<String, DbError> {
        lock_recover(&self.inner)
            .names
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::NoSuchTable(format!("table id {}", table_id)))
    }

    pub fn table_id(&self, name: &str) -> Result<u32, DbError> {
        lock_recover(&self.inner)
            .ids
            .get(name)
            .copied()
            .ok_or_else(|| DbError::NoSuchTable(name.to_string()))
    }

    /// Snapshot of every registered table id.
    pub fn table_ids(&self) -> Vec<u32> {
        lock_recover(&self.inner).files.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::FieldType;
    use tempfile::tempdir;

    fn open_table(dir: &std::path::Path, file_name: &str) -> Arc<HeapFile> {
        let desc = Arc::new(TupleDesc::unnamed(vec![FieldType::Int]));
        Arc::new(HeapFile::open(dir.join(file_name), desc).unwrap())
    }

    #[test]
    fn lookups_agree_in_both_directions() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        let file = open_table(dir.path(), "t.dat");
        catalog.add_table(file.clone(), "t");

        let id = catalog.table_id("t").unwrap();
        assert_eq!(id, file.id());
        assert_eq!(catalog.table_name(id).unwrap(), "t");
        assert_eq!(catalog.file(id).unwrap().id(), id);
        assert_eq!(*catalog.tuple_desc(id).unwrap(), **file.desc());
    }

    #[test]
    fn missing_tables_error() {
        let catalog = Catalog::new();
        assert!(matches!(catalog.file(9), Err(DbError::NoSuchTable(_))));
        assert!(matches!(
            catalog.table_id("ghost"),
            Err(DbError::NoSuchTable(_))
        ));
    }

    #[test]
    fn reregistering_a_name_replaces_the_table() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::new();
        let first = open_table(dir.path(), "a.dat");
        let second = open_table(dir.path(), "b.dat");
        catalog.add_table(first.clone(), "t");
        catalog.add_table(second.clone(), "t");

        assert_eq!(catalog.table_id("t").unwrap(), second.id());
        assert!(catalog.file(first.id()).is_err());
        assert_eq!(catalog.table_ids(), vec![second.id()]);
    }
}
