// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saving and loading whole stories.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, DatabaseName, Transaction};
use storyloom_graph::{
    Asset, Condition, Entities, Entity, EntityId, Flag, GlobalVariable, Graph, ItemDetails, ItemId, Node,
    NodeDetails, NodeId, Scene, Sound, Sprite, SpriteSfx, Story, Value, VariableChange, VariableType, Variables,
};

use crate::error::PersistenceError;
use crate::files::{load_files, FileCache};
use crate::schema;

/// Counts written by a full save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    /// Nodes written
    pub nodes: usize,
    /// Items written
    pub items: usize,
    /// Connections written
    pub connections: usize,
    /// Distinct file blobs written
    pub files: usize,
}

/// A row that could not be placed in the loaded story
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Item whose owning node does not exist; skipped
    OrphanItem {
        /// The item
        item: ItemId,
        /// The missing owner
        node: NodeId,
    },
    /// Item target that does not exist or is the owner itself; cleared
    DanglingTarget {
        /// The item
        item: ItemId,
        /// The missing target
        target: NodeId,
    },
    /// Row with a value that does not parse; skipped or defaulted
    InvalidRow {
        /// Table name
        table: &'static str,
        /// Row id
        id: String,
        /// What was wrong
        reason: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrphanItem { item, node } => write!(f, "item {item} skipped: node {node} does not exist"),
            Self::DanglingTarget { item, target } => {
                write!(f, "item {item} target cleared: node {target} does not exist")
            }
            Self::InvalidRow { table, id, reason } => write!(f, "{table} row {id}: {reason}"),
        }
    }
}

/// A loaded story and what had to be repaired on the way
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// The story
    pub story: Story,
    /// Rows skipped or repaired
    pub warnings: Vec<LoadWarning>,
}

/// A story database
pub struct StoryDatabase {
    conn: Connection,
    path: Option<PathBuf>,
}

impl StoryDatabase {
    /// Open or create a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!("Opened story database {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an empty in-memory database
    pub fn in_memory() -> Result<Self, PersistenceError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating or migrating the schema
    pub fn from_connection(conn: Connection) -> Result<Self, PersistenceError> {
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// File backing the database, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying connection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replace the stored story
    ///
    /// Every table is cleared and rewritten in one transaction; on error
    /// nothing is committed.
    pub fn save(&mut self, story: &Story) -> Result<SaveStats, PersistenceError> {
        let tx = self.conn.transaction()?;
        for table in schema::TABLES {
            tx.execute_batch(&format!("DELETE FROM {table};"))?;
        }

        let mut files = FileCache::new();
        let mut stats = SaveStats::default();

        write_entities(&tx, &story.entities)?;
        write_variables(&tx, &story.variables)?;

        for node in story.graph.nodes() {
            write_node(&tx, &mut files, node, &story.variables)?;
            stats.nodes += 1;
            stats.items += node.item_count();
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO connections (from_node_id, from_item_id, to_node_id) VALUES (?1, ?2, ?3)",
            )?;
            for node_id in story.graph.node_ids() {
                for connection in story.graph.connections_from(node_id) {
                    stmt.execute(params![
                        connection.from_node.as_str(),
                        connection.from_item.as_str(),
                        connection.to_node.as_str(),
                    ])?;
                    stats.connections += 1;
                }
            }
        }

        stats.files = files.len();
        tx.commit()?;

        tracing::info!(
            "Saved story: {} nodes, {} items, {} connections, {} files",
            stats.nodes,
            stats.items,
            stats.connections,
            stats.files
        );
        Ok(stats)
    }

    /// Load the stored story
    ///
    /// Items whose node is gone are skipped and targets that point nowhere
    /// are cleared; both are reported in [`LoadReport::warnings`].
    pub fn load(&self) -> Result<LoadReport, PersistenceError> {
        let mut warnings = Vec::new();
        let files = load_files(&self.conn)?;

        let entities = read_entities(&self.conn)?;
        let variables = read_variables(&self.conn, &mut warnings)?;
        let mut graph = Graph::default();

        let mut scenes = read_scenes(&self.conn, &files)?;
        let mut sprites = read_sprites(&self.conn, &files)?;
        let mut changes = read_changes(&self.conn, &mut warnings)?;
        let mut sounds = read_sounds(&self.conn, &files, &mut warnings)?;

        let node_rows: Vec<(String, Option<String>, f64, f64, Option<String>)> = {
            let mut stmt = self.conn.prepare("SELECT id, trigger_id, x, y, title FROM nodes ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            rows.collect::<Result<_, _>>()?
        };

        for (id, trigger, x, y, title) in node_rows {
            let scene_row = scenes.remove(&id).unwrap_or_default();
            let details = NodeDetails {
                id: Some(NodeId::from(id.as_str())),
                title: None,
                trigger: trigger.filter(|t| !t.is_empty()).map(EntityId::from),
                dialogue: scene_row.dialogue,
                speaker: scene_row.speaker,
                speaker_color: scene_row.speaker_color,
                scene: Scene {
                    background: scene_row.background,
                    sprites: sprites.remove(&id).unwrap_or_default(),
                },
                sounds: sounds.remove(&id).unwrap_or_default(),
                variable_changes: changes.remove(&id).unwrap_or_default(),
            };
            let mut node = Node::new([x as f32, y as f32], details);
            // Stored titles are kept verbatim, blank ones included
            if let Some(title) = title {
                node.title = title;
            }
            graph.insert_node(node);
        }

        load_items(&self.conn, &mut graph, &mut warnings)?;

        for warning in &warnings {
            tracing::warn!("Load: {}", warning);
        }
        tracing::info!(
            "Loaded story: {} nodes, {} items, {} connections, {} variables",
            graph.node_count(),
            graph.item_count(),
            graph.connection_count(),
            variables.len()
        );

        Ok(LoadReport {
            story: Story {
                graph,
                variables,
                entities,
            },
            warnings,
        })
    }

    /// Rewrite only the authored variables
    pub fn save_variables(&mut self, variables: &Variables) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM variables", [])?;
        write_variables(&tx, variables)?;
        tx.commit()?;
        tracing::info!("Saved {} variables", variables.len());
        Ok(())
    }

    /// Read only the authored variables
    pub fn load_variables(&self) -> Result<(Variables, Vec<LoadWarning>), PersistenceError> {
        let mut warnings = Vec::new();
        let variables = read_variables(&self.conn, &mut warnings)?;
        Ok((variables, warnings))
    }

    /// Insert or replace one entity
    pub fn save_entity(&self, entity: &Entity) -> Result<(), PersistenceError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entities (id, title, thumbnail) VALUES (?1, ?2, ?3)",
            params![entity.id.as_str(), entity.title, entity.thumbnail.as_ref().map(Asset::as_str)],
        )?;
        Ok(())
    }

    /// Delete one entity and clear node triggers pointing at it
    ///
    /// Returns whether the entity existed.
    pub fn delete_entity(&mut self, id: &EntityId) -> Result<bool, PersistenceError> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM entities WHERE id = ?1", params![id.as_str()])?;
        tx.execute("UPDATE nodes SET trigger_id = NULL WHERE trigger_id = ?1", params![id.as_str()])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    /// Write a standalone copy of the database to a new file
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(PersistenceError::ExportTargetExists(path.to_path_buf()));
        }
        self.conn.backup(DatabaseName::Main, path, None)?;
        tracing::info!("Exported story database to {}", path.display());
        Ok(())
    }
}

fn write_entities(tx: &Transaction<'_>, entities: &Entities) -> Result<(), PersistenceError> {
    let mut stmt = tx.prepare_cached("INSERT INTO entities (id, title, thumbnail) VALUES (?1, ?2, ?3)")?;
    for entity in entities.iter() {
        stmt.execute(params![
            entity.id.as_str(),
            entity.title,
            entity.thumbnail.as_ref().map(Asset::as_str)
        ])?;
    }
    Ok(())
}

fn write_variables(tx: &Transaction<'_>, variables: &Variables) -> Result<(), PersistenceError> {
    let mut stmt =
        tx.prepare_cached("INSERT INTO variables (id, key, type, default_value) VALUES (?1, ?2, ?3, ?4)")?;
    for variable in variables.iter() {
        let default_value = serde_json::to_string(&variable.default_value.to_json())?;
        stmt.execute(params![
            variable.id,
            variable.key,
            variable.var_type.as_str(),
            default_value
        ])?;
    }
    Ok(())
}

fn write_node(
    tx: &Transaction<'_>,
    files: &mut FileCache,
    node: &Node,
    variables: &Variables,
) -> Result<(), PersistenceError> {
    tx.prepare_cached("INSERT INTO nodes (id, trigger_id, x, y, title) VALUES (?1, ?2, ?3, ?4, ?5)")?
        .execute(params![
            node.id.as_str(),
            node.trigger.as_ref().map(EntityId::as_str),
            f64::from(node.position[0]),
            f64::from(node.position[1]),
            node.title,
        ])?;

    let background = files.intern_opt(tx, node.scene.background.as_ref())?;
    tx.prepare_cached(
        "INSERT INTO scenes (node_id, background_file_id, dialogue, speaker, speaker_color) VALUES (?1, ?2, ?3, ?4, ?5)",
    )?
    .execute(params![
        node.id.as_str(),
        background,
        node.dialogue,
        node.speaker,
        node.speaker_color
    ])?;

    for sprite in &node.scene.sprites {
        write_sprite(tx, files, &node.id, sprite)?;
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO changes (id, key, value, operator, type) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (index, change) in node.variable_changes.iter().enumerate() {
            stmt.execute(params![
                format!("{}_change_{}", node.id, index),
                change.variable,
                change.value,
                change.operation.as_str(),
                variables.type_of(&change.variable).map(|t| t.as_str().to_string()),
            ])?;
        }
    }

    for (index, sound) in node.sounds.iter().enumerate() {
        let file_id = files.intern_opt(tx, sound.file.as_ref())?;
        tx.prepare_cached(
            "INSERT INTO sounds (id, file_id, start_at, start_stop, continuity_id, volume) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            format!("{}_sound_{}", node.id, index),
            file_id,
            f64::from(sound.start_at),
            sound.start_stop,
            sound.continuity_id,
            i64::from(sound.volume),
        ])?;
    }

    for (position, item) in node.items().enumerate() {
        tx.prepare_cached(
            "INSERT INTO items (id, node_id, title, connection_target_node_id, is_default, position) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            item.id.as_str(),
            node.id.as_str(),
            item.title,
            item.connection_target.as_ref().map(NodeId::as_str),
            item.is_default,
            position as i64,
        ])?;

        let mut conditions =
            tx.prepare_cached("INSERT INTO conditions (item_id, variable, operator, value) VALUES (?1, ?2, ?3, ?4)")?;
        for condition in &item.conditions {
            conditions.execute(params![
                item.id.as_str(),
                condition.variable,
                condition.operator.symbol(),
                condition.value
            ])?;
        }

        let mut flags = tx.prepare_cached("INSERT INTO flags (item_id, flag_name, value) VALUES (?1, ?2, ?3)")?;
        for flag in &item.flags {
            flags.execute(params![item.id.as_str(), flag.name, flag.value])?;
        }
    }

    Ok(())
}

fn write_sprite(
    tx: &Transaction<'_>,
    files: &mut FileCache,
    node_id: &NodeId,
    sprite: &Sprite,
) -> Result<(), PersistenceError> {
    let file_id = files.intern_opt(tx, sprite.image.as_ref())?;
    tx.prepare_cached(
        "INSERT INTO sprites (scene_node_id, file_id, x, y, width, height, zIndex, flip, focus, animation_class, continuity_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?
    .execute(params![
        node_id.as_str(),
        file_id,
        f64::from(sprite.x),
        f64::from(sprite.y),
        f64::from(sprite.width),
        f64::from(sprite.height),
        sprite.z_index,
        sprite.flip,
        sprite.focus,
        sprite.animation_class,
        sprite.continuity_id,
    ])?;
    let sprite_id = tx.last_insert_rowid();

    for sfx in &sprite.sfx {
        let file_id = files.intern_opt(tx, sfx.file.as_ref())?;
        tx.prepare_cached(
            "INSERT INTO sprite_sfx (sprite_id, file_name, file_id, loop, auto, volume) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?
        .execute(params![
            sprite_id,
            sfx.file_name,
            file_id,
            sfx.looped,
            sfx.auto,
            i64::from(sfx.volume)
        ])?;
    }
    Ok(())
}

fn volume(raw: Option<i64>) -> u8 {
    raw.map_or(100, |v| v.clamp(0, 100) as u8)
}

/// Number from a column that older databases declared as `TEXT`
fn numeric(value: SqlValue) -> Option<f64> {
    match value {
        SqlValue::Integer(i) => Some(i as f64),
        SqlValue::Real(r) => Some(r),
        SqlValue::Text(text) => text.trim().parse().ok(),
        SqlValue::Null | SqlValue::Blob(_) => None,
    }
}

fn read_entities(conn: &Connection) -> Result<Entities, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, title, thumbnail FROM entities ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok(Entity {
            id: EntityId::from(row.get::<_, String>(0)?),
            title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            thumbnail: row.get::<_, Option<String>>(2)?.filter(|t| !t.is_empty()).map(Asset),
        })
    })?;
    Ok(rows.collect::<Result<Entities, _>>()?)
}

fn read_variables(conn: &Connection, warnings: &mut Vec<LoadWarning>) -> Result<Variables, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, key, type, default_value FROM variables ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut variables = Variables::new();
    for row in rows {
        let (id, key, type_name, default_value) = row?;
        let Some(key) = key.filter(|k| !k.trim().is_empty()) else {
            warnings.push(LoadWarning::InvalidRow {
                table: "variables",
                id,
                reason: "missing key".to_string(),
            });
            continue;
        };

        let var_type = match type_name.as_deref().unwrap_or("string").parse::<VariableType>() {
            Ok(var_type) => var_type,
            Err(reason) => {
                warnings.push(LoadWarning::InvalidRow {
                    table: "variables",
                    id: id.clone(),
                    reason,
                });
                VariableType::String
            }
        };

        let default_value = match default_value {
            None => var_type.zero(),
            Some(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(json) => Value::from_json(&json, var_type),
                Err(_) => var_type.coerce(&raw),
            },
        };

        variables.insert(GlobalVariable {
            id,
            key,
            var_type,
            default_value,
        });
    }
    Ok(variables)
}

#[derive(Default)]
struct SceneRow {
    background: Option<Asset>,
    dialogue: String,
    speaker: String,
    speaker_color: String,
}

fn read_scenes(conn: &Connection, files: &HashMap<i64, Asset>) -> Result<HashMap<String, SceneRow>, PersistenceError> {
    let mut stmt =
        conn.prepare("SELECT node_id, background_file_id, dialogue, speaker, speaker_color FROM scenes")?;
    let rows = stmt.query_map([], |row| {
        let background: Option<i64> = row.get(1)?;
        Ok((
            row.get::<_, String>(0)?,
            SceneRow {
                background: background.and_then(|id| files.get(&id).cloned()),
                dialogue: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                speaker: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                speaker_color: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            },
        ))
    })?;
    Ok(rows.collect::<Result<_, _>>()?)
}

fn read_sprites(conn: &Connection, files: &HashMap<i64, Asset>) -> Result<HashMap<String, Vec<Sprite>>, PersistenceError> {
    let mut sfx: HashMap<i64, Vec<SpriteSfx>> = HashMap::new();
    {
        let mut stmt =
            conn.prepare("SELECT sprite_id, file_name, file_id, loop, auto, volume FROM sprite_sfx ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let file_id: Option<i64> = row.get(2)?;
            Ok((
                row.get::<_, i64>(0)?,
                SpriteSfx {
                    file_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    file: file_id.and_then(|id| files.get(&id).cloned()),
                    looped: row.get(3)?,
                    auto: row.get(4)?,
                    volume: volume(row.get(5)?),
                },
            ))
        })?;
        for row in rows {
            let (sprite_id, effect) = row?;
            sfx.entry(sprite_id).or_default().push(effect);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, scene_node_id, file_id, x, y, width, height, zIndex, flip, focus, animation_class, continuity_id
         FROM sprites ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let file_id: Option<i64> = row.get(2)?;
        let sprite = Sprite {
            image: file_id.and_then(|id| files.get(&id).cloned()),
            x: row.get::<_, f64>(3)? as f32,
            y: row.get::<_, f64>(4)? as f32,
            width: row.get::<_, f64>(5)? as f32,
            height: row.get::<_, f64>(6)? as f32,
            z_index: row.get::<_, i64>(7)?.clamp(i32::MIN.into(), i32::MAX.into()) as i32,
            flip: row.get(8)?,
            focus: row.get(9)?,
            animation_class: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            continuity_id: row.get::<_, Option<String>>(11)?.filter(|c| !c.is_empty()),
            sfx: Vec::new(),
        };
        Ok((id, row.get::<_, String>(1)?, sprite))
    })?;

    let mut sprites: HashMap<String, Vec<Sprite>> = HashMap::new();
    for row in rows {
        let (id, node_id, mut sprite) = row?;
        sprite.sfx = sfx.remove(&id).unwrap_or_default();
        sprites.entry(node_id).or_default().push(sprite);
    }
    Ok(sprites)
}

/// Split a derived `<node>_<kind>_<index>` row id
fn split_derived_id<'a>(id: &'a str, kind: &str) -> Option<(&'a str, usize)> {
    let (node, index) = id.rsplit_once(&format!("_{kind}_"))?;
    Some((node, index.parse().ok()?))
}

fn read_changes(
    conn: &Connection,
    warnings: &mut Vec<LoadWarning>,
) -> Result<HashMap<String, Vec<VariableChange>>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, key, value, operator FROM changes")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        ))
    })?;

    let mut indexed: HashMap<String, Vec<(usize, VariableChange)>> = HashMap::new();
    for row in rows {
        let (id, key, value, operator) = row?;
        let Some((node_id, index)) = split_derived_id(&id, "change") else {
            warnings.push(LoadWarning::InvalidRow {
                table: "changes",
                id,
                reason: "id is not <node>_change_<index>".to_string(),
            });
            continue;
        };
        match operator.parse() {
            Ok(operation) => indexed
                .entry(node_id.to_string())
                .or_default()
                .push((index, VariableChange::new(key, operation, value))),
            Err(reason) => warnings.push(LoadWarning::InvalidRow {
                table: "changes",
                id: id.clone(),
                reason,
            }),
        }
    }

    Ok(indexed
        .into_iter()
        .map(|(node_id, mut changes)| {
            changes.sort_by_key(|(index, _)| *index);
            (node_id, changes.into_iter().map(|(_, change)| change).collect())
        })
        .collect())
}

fn read_sounds(
    conn: &Connection,
    files: &HashMap<i64, Asset>,
    warnings: &mut Vec<LoadWarning>,
) -> Result<HashMap<String, Vec<Sound>>, PersistenceError> {
    let mut stmt = conn.prepare("SELECT id, file_id, start_at, start_stop, continuity_id, volume FROM sounds")?;
    let rows = stmt.query_map([], |row| {
        let file_id = numeric(row.get(1)?);
        Ok((
            row.get::<_, String>(0)?,
            Sound {
                file: file_id.and_then(|id| files.get(&(id as i64)).cloned()),
                start_at: numeric(row.get(2)?).unwrap_or(0.0) as f32,
                start_stop: row.get::<_, Option<bool>>(3)?.unwrap_or(true),
                continuity_id: row.get::<_, Option<String>>(4)?.filter(|c| !c.is_empty()),
                volume: volume(row.get(5)?),
            },
        ))
    })?;

    let mut indexed: HashMap<String, Vec<(usize, Sound)>> = HashMap::new();
    for row in rows {
        let (id, sound) = row?;
        match split_derived_id(&id, "sound") {
            Some((node_id, index)) => indexed.entry(node_id.to_string()).or_default().push((index, sound)),
            None => warnings.push(LoadWarning::InvalidRow {
                table: "sounds",
                id,
                reason: "id is not <node>_sound_<index>".to_string(),
            }),
        }
    }

    Ok(indexed
        .into_iter()
        .map(|(node_id, mut sounds)| {
            sounds.sort_by_key(|(index, _)| *index);
            (node_id, sounds.into_iter().map(|(_, sound)| sound).collect())
        })
        .collect())
}

fn group_by_item<T>(
    conn: &Connection,
    sql: &str,
    mut read: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<HashMap<String, Vec<T>>, PersistenceError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let item_id: String = row.get(0)?;
        grouped.entry(item_id).or_default().push(read(row)?);
    }
    Ok(grouped)
}

fn load_items(conn: &Connection, graph: &mut Graph, warnings: &mut Vec<LoadWarning>) -> Result<(), PersistenceError> {
    let mut conditions = group_by_item(
        conn,
        "SELECT item_id, variable, operator, value FROM conditions ORDER BY id",
        |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?)),
    )?;
    let mut flags = group_by_item(conn, "SELECT item_id, flag_name, value FROM flags ORDER BY id", |row| {
        Ok(Flag::new(row.get::<_, String>(1)?, row.get::<_, bool>(2)?))
    })?;

    // Targets recorded only in `connections`, from databases that did not
    // keep them on the item row
    let mut fallback_targets: HashMap<String, String> = HashMap::new();
    {
        let mut stmt = conn.prepare("SELECT from_item_id, to_node_id FROM connections ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (item_id, target) = row?;
            fallback_targets.entry(item_id).or_insert(target);
        }
    }

    let item_rows: Vec<(String, String, Option<String>, Option<String>, bool)> = {
        let mut stmt = conn.prepare(
            "SELECT id, node_id, title, connection_target_node_id, is_default FROM items ORDER BY position, rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })?;
        rows.collect::<Result<_, _>>()?
    };

    for (id, node_id, title, target, is_default) in item_rows {
        let item = ItemId::from(id.as_str());
        let node = NodeId::from(node_id);
        if !graph.contains_node(&node) {
            warnings.push(LoadWarning::OrphanItem { item, node });
            continue;
        }

        let mut target = target
            .filter(|t| !t.is_empty())
            .or_else(|| fallback_targets.remove(&id))
            .map(NodeId::from);
        if let Some(missing) = target.take_if(|t| *t == node || !graph.contains_node(t)) {
            warnings.push(LoadWarning::DanglingTarget {
                item: item.clone(),
                target: missing,
            });
        }

        let mut item_conditions = Vec::new();
        for (variable, operator, value) in conditions.remove(&id).unwrap_or_default() {
            match operator.parse() {
                Ok(operator) => item_conditions.push(Condition::new(variable, operator, value)),
                Err(reason) => warnings.push(LoadWarning::InvalidRow {
                    table: "conditions",
                    id: id.clone(),
                    reason,
                }),
            }
        }

        let details = ItemDetails {
            id: Some(item),
            title,
            conditions: item_conditions,
            flags: flags.remove(&id).unwrap_or_default(),
            is_default,
            connection_target: target,
        };
        if let Err(err) = graph.add_item(&node, details) {
            warnings.push(LoadWarning::InvalidRow {
                table: "items",
                id,
                reason: err.to_string(),
            });
        }
    }
    Ok(())
}
