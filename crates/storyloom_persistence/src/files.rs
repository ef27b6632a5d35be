// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content-deduplicated asset storage.

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use storyloom_graph::Asset;

use crate::error::PersistenceError;

/// Per-save map from asset content to `files` row id
///
/// Identical assets written during one save share a row. The cache only
/// spares lookups; the `files` table is checked before inserting, so a cache
/// that starts empty still never duplicates a row.
#[derive(Debug, Default)]
pub struct FileCache {
    ids: HashMap<String, i64>,
}

impl FileCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Row id for an asset, inserting it when the content is new
    pub fn intern(&mut self, conn: &Connection, asset: &Asset) -> Result<i64, PersistenceError> {
        if let Some(id) = self.ids.get(asset.as_str()) {
            return Ok(*id);
        }

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM files WHERE base64_data = ?1",
                params![asset.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute("INSERT INTO files (base64_data) VALUES (?1)", params![asset.as_str()])?;
                conn.last_insert_rowid()
            }
        };

        self.ids.insert(asset.0.clone(), id);
        Ok(id)
    }

    /// Row id for an optional asset
    pub fn intern_opt(&mut self, conn: &Connection, asset: Option<&Asset>) -> Result<Option<i64>, PersistenceError> {
        asset.map(|asset| self.intern(conn, asset)).transpose()
    }

    /// Number of distinct assets seen
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no asset was seen
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Every stored asset by row id
pub fn load_files(conn: &Connection) -> Result<HashMap<i64, Asset>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, base64_data FROM files WHERE base64_data IS NOT NULL")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, Asset(row.get(1)?))))?;
    let mut files = HashMap::new();
    for row in rows {
        let (id, asset) = row?;
        files.insert(id, asset);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn test_same_content_same_row() {
        let conn = Connection::open_in_memory().unwrap();
        schema::initialize(&conn).unwrap();

        let mut cache = FileCache::new();
        let a = cache.intern(&conn, &Asset::from_bytes("image/png", b"sprite")).unwrap();
        let b = cache.intern(&conn, &Asset::from_bytes("image/png", b"sprite")).unwrap();
        let c = cache.intern(&conn, &Asset::from_bytes("image/png", b"other")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut fresh = FileCache::new();
        assert_eq!(fresh.intern(&conn, &Asset::from_bytes("image/png", b"sprite")).unwrap(), a);

        let files = load_files(&conn).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[&a].decode().unwrap(), b"sprite");
    }
}
