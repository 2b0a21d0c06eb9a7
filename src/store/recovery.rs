use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::sstable::{self, Segment};
use super::table::{Table, TableId};
use crate::error::{Error, Result};
use crate::schema::{Schema, SCHEMA_FILE};

/// Creates the table directory and its schema document.
pub(crate) fn create_table(
    dir: &Path,
    id: TableId,
    schema: Schema,
    memtable_limit: usize,
) -> Result<Table> {
    let schema_path = dir.join(SCHEMA_FILE);
    if schema_path.exists() {
        return Err(Error::TableExists(id.to_string()));
    }
    fs::create_dir_all(dir)?;
    schema.save(&schema_path)?;

    tracing::info!(
        table = %id,
        columns = schema.columns().len(),
        primary_key = ?schema.primary_key(),
        "Created table"
    );
    Ok(Table::new(id, dir.to_path_buf(), Arc::new(schema), memtable_limit, Vec::new()))
}

/// Loads the schema and every published segment of an existing table.
///
/// Staged `.tmp` files and segment files without a `.meta`, left behind by an
/// interrupted flush, are removed.
pub(crate) fn open_table(dir: &Path, id: TableId, memtable_limit: usize) -> Result<Table> {
    let schema_path = dir.join(SCHEMA_FILE);
    if !schema_path.exists() {
        return Err(Error::TableMissing(id.to_string()));
    }
    let schema = Arc::new(Schema::load(&schema_path)?);

    let mut generations = BTreeSet::new();
    let mut family_files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(&format!(".{}", sstable::TMP_EXTENSION)) {
            tracing::warn!(table = %id, file = name, "Removing unpublished segment file");
            fs::remove_file(entry.path())?;
        } else if let Some(generation) = sstable::parse_generation(name) {
            generations.insert(generation);
        } else if let Some(generation) = sstable::file_generation(name) {
            family_files.push((generation, entry.path()));
        }
    }

    // A family without `.meta` was never published.
    for (generation, path) in family_files {
        if !generations.contains(&generation) {
            tracing::warn!(
                table = %id,
                file = %path.display(),
                "Removing unpublished segment file"
            );
            fs::remove_file(&path)?;
        }
    }

    let segments = generations
        .iter()
        .map(|generation| Segment::open(dir, &schema, *generation))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(
        table = %id,
        segments = segments.len(),
        rows = segments.iter().map(Segment::len).sum::<usize>(),
        "Opened table"
    );
    Ok(Table::new(id, dir.to_path_buf(), schema, memtable_limit, segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::schema::Column;
    use crate::value::Value;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(vec![Column::int("id"), Column::text("v")], vec!["id".to_string()]).unwrap()
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempdir().expect("Failed to create temp dir");
        let table_dir = dir.path().join("db").join("t");
        let id = TableId::new("db", "t");

        let table = create_table(&table_dir, id.clone(), schema(), 100).unwrap();
        assert!(matches!(
            create_table(&table_dir, id.clone(), schema(), 100),
            Err(Error::TableExists(_))
        ));

        table.apply_insert(row!("id" => 1, "v" => "one")).unwrap();
        table.flush().unwrap();
        table.apply_insert(row!("id" => 2, "v" => "two")).unwrap();
        table.flush().unwrap();
        let last = table.stats().last_generation;
        drop(table);

        let reopened = open_table(&table_dir, id, 100).unwrap();
        let stats = reopened.stats();
        assert_eq!(stats.segments, 2);
        assert_eq!(stats.last_generation, last);
        let row = reopened.lookup_key(&[Value::Int(2)]).unwrap().unwrap();
        assert_eq!(row["v"], Value::from("two"));
    }

    #[test]
    fn test_open_removes_staged_files() {
        let dir = tempdir().expect("Failed to create temp dir");
        let id = TableId::new("db", "t");
        create_table(dir.path(), id.clone(), schema(), 100).unwrap();

        let orphan = dir.path().join("segment-00000000000000000009.data.tmp");
        fs::write(&orphan, b"partial").unwrap();
        let unpublished = dir.path().join("segment-00000000000000000009.data");
        fs::write(&unpublished, b"no metadata").unwrap();

        let table = open_table(dir.path(), id, 100).unwrap();
        assert!(!orphan.exists());
        assert!(!unpublished.exists());
        assert_eq!(table.stats().segments, 0);
    }

    #[test]
    fn test_open_missing_table() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = open_table(&dir.path().join("nope"), TableId::new("db", "nope"), 100);
        assert!(matches!(result, Err(Error::TableMissing(_))));
    }
}
