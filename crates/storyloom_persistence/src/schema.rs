// SPDX-License-Identifier: MIT OR Apache-2.0
//! Schema creation and migrations.
//!
//! Ids of `files`, `conditions`, `flags`, `connections`, `sprites` and
//! `sprite_sfx` are plain `INTEGER PRIMARY KEY` rowids. After a full clear
//! SQLite hands out the same ids again, so saving an unchanged story twice
//! produces identical tables.
//!
//! The schema version lives in `PRAGMA user_version`. Databases below
//! [`SCHEMA_VERSION`] have every existing table rebuilt once to the current
//! definition, which drops `AUTOINCREMENT`, foreign keys and the old column
//! types.

use rusqlite::Connection;

use crate::error::PersistenceError;

/// Version written to `PRAGMA user_version` after migration
pub const SCHEMA_VERSION: i64 = 1;

/// Tables in the order a full save clears them
pub const TABLES: &[&str] = &[
    "sprite_sfx",
    "sprites",
    "scenes",
    "sounds",
    "changes",
    "connections",
    "flags",
    "conditions",
    "items",
    "nodes",
    "variables",
    "entities",
    "files",
];

/// Column definitions of each table
const DEFINITIONS: &[(&str, &str)] = &[
    ("entities", "
    id TEXT PRIMARY KEY,
    title TEXT,
    thumbnail TEXT"),
    ("files", "
    id INTEGER PRIMARY KEY,
    base64_data TEXT UNIQUE"),
    ("sounds", "
    id TEXT PRIMARY KEY,
    file_id INTEGER,
    start_at REAL,
    start_stop BOOLEAN,
    continuity_id TEXT,
    volume INTEGER"),
    ("changes", "
    id TEXT PRIMARY KEY,
    key TEXT,
    value TEXT,
    operator TEXT,
    type TEXT"),
    ("variables", "
    id TEXT PRIMARY KEY,
    key TEXT UNIQUE,
    type TEXT,
    default_value TEXT"),
    ("nodes", "
    id TEXT PRIMARY KEY,
    trigger_id TEXT,
    x REAL NOT NULL,
    y REAL NOT NULL,
    title TEXT"),
    ("items", "
    id TEXT PRIMARY KEY,
    node_id TEXT NOT NULL,
    title TEXT,
    connection_target_node_id TEXT,
    is_default BOOLEAN NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0"),
    ("conditions", "
    id INTEGER PRIMARY KEY,
    item_id TEXT NOT NULL,
    variable TEXT NOT NULL,
    operator TEXT NOT NULL,
    value TEXT NOT NULL"),
    ("flags", "
    id INTEGER PRIMARY KEY,
    item_id TEXT NOT NULL,
    flag_name TEXT NOT NULL,
    value BOOLEAN NOT NULL"),
    ("connections", "
    id INTEGER PRIMARY KEY,
    from_node_id TEXT NOT NULL,
    from_item_id TEXT NOT NULL,
    to_node_id TEXT NOT NULL"),
    ("scenes", "
    node_id TEXT PRIMARY KEY,
    background_file_id INTEGER,
    dialogue TEXT,
    speaker_color TEXT,
    speaker TEXT"),
    ("sprites", "
    id INTEGER PRIMARY KEY,
    scene_node_id TEXT NOT NULL,
    file_id INTEGER,
    x REAL NOT NULL,
    y REAL NOT NULL,
    width REAL NOT NULL,
    height REAL NOT NULL,
    zIndex INTEGER NOT NULL,
    flip BOOLEAN NOT NULL,
    focus BOOLEAN NOT NULL,
    animation_class TEXT,
    continuity_id TEXT"),
    ("sprite_sfx", "
    id INTEGER PRIMARY KEY,
    sprite_id INTEGER NOT NULL,
    file_name TEXT,
    file_id INTEGER,
    loop BOOLEAN NOT NULL DEFAULT 0,
    auto BOOLEAN NOT NULL DEFAULT 0,
    volume INTEGER NOT NULL DEFAULT 100"),
];

const INDEXES: &str = "
CREATE INDEX IF NOT EXISTS idx_items_node ON items(node_id, position);
CREATE INDEX IF NOT EXISTS idx_conditions_item ON conditions(item_id);
CREATE INDEX IF NOT EXISTS idx_flags_item ON flags(item_id);
CREATE INDEX IF NOT EXISTS idx_sprites_scene ON sprites(scene_node_id);
CREATE INDEX IF NOT EXISTS idx_sprite_sfx_sprite ON sprite_sfx(sprite_id);
";

/// Columns added after the first schema, with their definitions
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("items", "position", "INTEGER NOT NULL DEFAULT 0"),
    ("items", "is_default", "BOOLEAN NOT NULL DEFAULT 0"),
    ("variables", "default_value", "TEXT"),
    ("scenes", "speaker_color", "TEXT"),
];

/// Create missing tables and bring older ones up to date
pub fn initialize(conn: &Connection) -> Result<(), PersistenceError> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let mut existing = Vec::new();
    for (table, _) in DEFINITIONS {
        if has_table(conn, table)? {
            existing.push(*table);
        }
    }

    for (table, columns) in DEFINITIONS {
        conn.execute_batch(&format!("CREATE TABLE IF NOT EXISTS {table} ({columns}\n);"))?;
    }
    migrate(conn)?;
    if version < SCHEMA_VERSION && !existing.is_empty() {
        rebuild(conn, &existing)?;
    }
    conn.execute_batch(INDEXES)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Rename and add columns written by older versions
fn migrate(conn: &Connection) -> Result<(), PersistenceError> {
    // Early databases misspelled this column
    if has_column(conn, "sounds", "coninuity_id")? && !has_column(conn, "sounds", "continuity_id")? {
        conn.execute_batch("ALTER TABLE sounds RENAME COLUMN coninuity_id TO continuity_id;")?;
        tracing::info!("Migration: renamed sounds.coninuity_id");
    }

    for (table, column, definition) in ADDED_COLUMNS {
        if !has_column(conn, table, column)? {
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {definition};"))?;
            tracing::info!("Migration: added {}.{}", table, column);
        }
    }
    Ok(())
}

/// Recreate tables with their current definitions, keeping shared columns
///
/// Foreign key enforcement is off while tables are swapped and restored
/// afterwards.
fn rebuild(conn: &Connection, tables: &[&str]) -> Result<(), PersistenceError> {
    let foreign_keys: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", false)?;
    let result = rebuild_tables(conn, tables);
    conn.pragma_update(None, "foreign_keys", foreign_keys)?;
    result
}

/// Values are copied through the new column affinities, so numbers stored
/// as text in `INTEGER` or `REAL` columns come back as numbers.
fn rebuild_tables(conn: &Connection, tables: &[&str]) -> Result<(), PersistenceError> {
    let tx = conn.unchecked_transaction()?;
    for (table, columns) in DEFINITIONS {
        if !tables.contains(table) {
            continue;
        }
        let rebuilt = format!("{table}_rebuilt");
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {rebuilt}; CREATE TABLE {rebuilt} ({columns}\n);"))?;

        let old = column_names(&tx, table)?;
        let shared = column_names(&tx, &rebuilt)?
            .into_iter()
            .filter(|column| old.contains(column))
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let before: usize = tx.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        let copied = tx.execute(
            &format!("INSERT OR IGNORE INTO {rebuilt} ({shared}) SELECT {shared} FROM {table} ORDER BY rowid"),
            [],
        )?;
        if copied < before {
            tracing::warn!("Migration: dropped {} conflicting {} rows", before - copied, table);
        }

        tx.execute_batch(&format!("DROP TABLE {table}; ALTER TABLE {rebuilt} RENAME TO {table};"))?;
        tracing::info!("Migration: rebuilt {}", table);
    }
    tx.commit()?;
    Ok(())
}

/// Whether a table exists
pub fn has_table(conn: &Connection, table: &str) -> Result<bool, PersistenceError> {
    let found: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Whether a table has a column
pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, PersistenceError> {
    let found: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info(?1) WHERE name = ?2",
        [table, column],
        |row| row.get(0),
    )?;
    Ok(found)
}

fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt.query_map([table], |row| row.get(0))?;
    Ok(names.collect::<Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();

        for table in TABLES {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_migrates_legacy_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE items (id TEXT PRIMARY KEY, node_id TEXT NOT NULL, title TEXT, connection_target_node_id TEXT);
             CREATE TABLE variables (id TEXT PRIMARY KEY, key TEXT, type TEXT);
             CREATE TABLE scenes (node_id TEXT PRIMARY KEY, background_file_id INTEGER, dialogue TEXT, speaker TEXT);
             CREATE TABLE sounds (id TEXT PRIMARY KEY, file_id TEXT, start_at TEXT, start_stop BOOLEAN, coninuity_id TEXT, volume INTEGER);",
        )
        .unwrap();

        initialize(&conn).unwrap();

        assert!(has_column(&conn, "items", "position").unwrap());
        assert!(has_column(&conn, "items", "is_default").unwrap());
        assert!(has_column(&conn, "variables", "default_value").unwrap());
        assert!(has_column(&conn, "scenes", "speaker_color").unwrap());
        assert!(has_column(&conn, "sounds", "continuity_id").unwrap());
        assert!(!has_column(&conn, "sounds", "coninuity_id").unwrap());
        assert!(has_column(&conn, "sprite_sfx", "volume").unwrap());
        assert_eq!(column_type(&conn, "sounds", "file_id"), "INTEGER");
        assert_eq!(column_type(&conn, "sounds", "start_at"), "REAL");
    }

    fn column_type(conn: &Connection, table: &str, column: &str) -> String {
        conn.query_row(
            "SELECT type FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_rebuild_keeps_rows_and_drops_autoincrement() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE files (id INTEGER PRIMARY KEY AUTOINCREMENT, base64_data TEXT UNIQUE);
             CREATE TABLE sounds (id TEXT PRIMARY KEY, file_id TEXT, start_at TEXT, start_stop BOOLEAN,
                                  coninuity_id TEXT, volume INTEGER, FOREIGN KEY (file_id) REFERENCES files(id));
             INSERT INTO files (base64_data) VALUES ('data:audio/ogg;base64,AA==');
             INSERT INTO sounds VALUES ('n_sound_0', '1', '2.5', 1, 'rain', 60);",
        )
        .unwrap();

        initialize(&conn).unwrap();

        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let files_sql: String = conn
            .query_row("SELECT sql FROM sqlite_master WHERE name = 'files'", [], |row| row.get(0))
            .unwrap();
        assert!(!files_sql.contains("AUTOINCREMENT"));

        let (file_id, start_at, continuity): (i64, f64, String) = conn
            .query_row("SELECT file_id, start_at, continuity_id FROM sounds", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!((file_id, start_at, continuity.as_str()), (1, 2.5, "rain"));

        // A second open leaves the current schema alone
        initialize(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }
}
