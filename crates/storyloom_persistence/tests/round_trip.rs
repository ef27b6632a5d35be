// SPDX-License-Identifier: MIT OR Apache-2.0
//! Save/load behaviour against real SQLite databases.

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use storyloom_graph::{
    Asset, Condition, ConditionOperator, Entity, Flag, ItemDetails, NodeDetails, Sound, Sprite, SpriteSfx, Story,
    Value, VariableChange, VariableOperation, VariableType,
};
use storyloom_persistence::{LoadWarning, StoryDatabase};

fn sample_story() -> Story {
    let mut story = Story::new("Sample");
    story.variables.define("gold", VariableType::Number, "10");
    story.variables.define("met_guard", VariableType::Boolean, "false");
    story.variables.define("bag", VariableType::Array, "rope, lamp");

    let guard = Entity::new("Guard").with_thumbnail(Asset::from_bytes("image/png", b"guard"));
    let guard_id = guard.id.clone();
    story.entities.upsert(guard);

    let portrait = Asset::from_bytes("image/png", b"portrait");
    let mut gate = NodeDetails::titled("Gate").with_dialogue("Guard", "Halt!");
    gate.trigger = Some(guard_id);
    gate.speaker_color = "#ff8800".into();
    gate.scene.background = Some(Asset::from_bytes("image/png", b"castle"));
    gate.scene.sprites = vec![
        Sprite::new(Some(portrait.clone()), 100.0, 50.0, 300.0, 600.0).with_continuity("guard"),
        Sprite {
            flip: true,
            z_index: 2,
            animation_class: "enter_fade".into(),
            sfx: vec![SpriteSfx {
                file_name: "clank.ogg".into(),
                file: Some(Asset::from_bytes("audio/ogg", b"clank")),
                looped: false,
                auto: true,
                volume: 80,
            }],
            ..Sprite::new(Some(portrait), 700.0, 50.0, 300.0, 600.0)
        },
    ];
    gate.sounds = vec![Sound {
        file: Some(Asset::from_bytes("audio/ogg", b"wind")),
        start_at: 1.5,
        start_stop: true,
        continuity_id: Some("ambience".into()),
        volume: 40,
    }];
    gate.variable_changes = vec![
        VariableChange::new("met_guard", VariableOperation::Set, "true"),
        VariableChange::new("gold", VariableOperation::Subtract, "2"),
    ];
    let gate = story.graph.add_node([0.0, 0.0], gate);
    let inside = story.graph.add_node([250.0, 0.0], NodeDetails::titled("Inside"));
    let away = story.graph.add_node([250.0, 150.0], NodeDetails::titled("Away"));
    let end = story.graph.add_node([500.0, 0.0], NodeDetails::titled("End"));

    story
        .graph
        .add_item(
            &gate,
            ItemDetails::choice("Bribe")
                .with_condition(Condition::new("gold", ConditionOperator::Greater, "5"))
                .with_condition(Condition::new("bag", ConditionOperator::NotEqual, ""))
                .with_target(inside.clone()),
        )
        .unwrap();
    story
        .graph
        .add_item(
            &gate,
            ItemDetails::choice("Wave").with_flag(Flag::new("met_guard", true)).with_target(inside.clone()),
        )
        .unwrap();
    story
        .graph
        .add_item(&gate, ItemDetails::choice("Leave").default_choice().with_target(away))
        .unwrap();
    story.graph.add_item(&inside, ItemDetails::continuation(end)).unwrap();

    story
}

fn table_contents(db: &StoryDatabase, table: &str) -> Vec<Vec<SqlValue>> {
    let conn = db.connection();
    let mut stmt = conn.prepare(&format!("SELECT * FROM {table} ORDER BY 1")).unwrap();
    let columns = stmt.column_count();
    let rows = stmt
        .query_map([], |row| {
            (0..columns)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap();
    rows
}

fn count(db: &StoryDatabase, table: &str) -> i64 {
    db.connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

const ALL_TABLES: &[&str] = &[
    "nodes",
    "items",
    "conditions",
    "flags",
    "connections",
    "scenes",
    "sprites",
    "sprite_sfx",
    "files",
    "variables",
    "entities",
    "sounds",
    "changes",
];

#[test]
fn round_trip_preserves_the_story() {
    let story = sample_story();
    let mut db = StoryDatabase::in_memory().unwrap();
    db.save(&story).unwrap();

    let report = db.load().unwrap();
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    let loaded = report.story;

    assert_eq!(loaded.graph.node_count(), story.graph.node_count());
    assert_eq!(loaded.graph.item_count(), story.graph.item_count());
    assert_eq!(loaded.graph.connection_count(), story.graph.connection_count());
    assert_eq!(loaded.variables, story.variables);
    assert_eq!(loaded.entities, story.entities);

    for original in story.graph.nodes() {
        let node = loaded.graph.node(&original.id).unwrap();
        assert_eq!(node, original);
    }

    let mut original_edges: Vec<_> = story.graph.connections().cloned().collect();
    let mut loaded_edges: Vec<_> = loaded.graph.connections().cloned().collect();
    original_edges.sort_by(|a, b| a.from_item.cmp(&b.from_item));
    loaded_edges.sort_by(|a, b| a.from_item.cmp(&b.from_item));
    assert_eq!(original_edges, loaded_edges);
}

#[test]
fn saving_twice_is_idempotent() {
    let story = sample_story();
    let mut db = StoryDatabase::in_memory().unwrap();

    db.save(&story).unwrap();
    let first: Vec<_> = ALL_TABLES.iter().map(|t| table_contents(&db, t)).collect();
    db.save(&story).unwrap();
    let second: Vec<_> = ALL_TABLES.iter().map(|t| table_contents(&db, t)).collect();
    assert_eq!(first, second);

    let reloaded = db.load().unwrap().story;
    db.save(&reloaded).unwrap();
    let third: Vec<_> = ALL_TABLES.iter().map(|t| table_contents(&db, t)).collect();
    assert_eq!(first, third);
}

#[test]
fn identical_images_share_one_file() {
    let mut story = Story::new("Dedup");
    let image = Asset::from_bytes("image/png", &[7; 64]);
    let mut details = NodeDetails::titled("Twins");
    details.scene.sprites = vec![
        Sprite::new(Some(image.clone()), 0.0, 0.0, 10.0, 10.0),
        Sprite::new(Some(image.clone()), 20.0, 0.0, 10.0, 10.0),
    ];
    story.graph.add_node([0.0, 0.0], details);

    let mut db = StoryDatabase::in_memory().unwrap();
    let stats = db.save(&story).unwrap();

    assert_eq!(stats.files, 1);
    assert_eq!(count(&db, "files"), 1);
    let distinct: i64 = db
        .connection()
        .query_row("SELECT COUNT(DISTINCT file_id) FROM sprites", [], |row| row.get(0))
        .unwrap();
    assert_eq!(distinct, 1);
}

#[test]
fn orphans_and_dangling_targets_are_reported() {
    let mut story = Story::new("Orphans");
    let a = story.graph.add_node([0.0, 0.0], NodeDetails::titled("A"));
    let b = story.graph.add_node([0.0, 0.0], NodeDetails::titled("B"));
    story.graph.add_item(&a, ItemDetails::continuation(b.clone())).unwrap();

    let mut db = StoryDatabase::in_memory().unwrap();
    db.save(&story).unwrap();
    let conn = db.connection();
    conn.execute(
        "INSERT INTO items (id, node_id, title, connection_target_node_id, is_default, position)
         VALUES ('lost', 'nowhere', 'Lost', NULL, 0, 0)",
        [],
    )
    .unwrap();
    conn.execute("DELETE FROM nodes WHERE id = ?1", [b.as_str()]).unwrap();

    let report = db.load().unwrap();
    assert_eq!(report.story.graph.node_count(), 1);
    assert_eq!(report.story.graph.connection_count(), 0);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, LoadWarning::OrphanItem { item, .. } if item.as_str() == "lost")));
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, LoadWarning::DanglingTarget { target, .. } if *target == b)));

    let item = report.story.graph.node(&a).unwrap().item_at(0).unwrap();
    assert_eq!(item.connection_target, None);
}

#[test]
fn missing_optional_rows_default_to_empty() {
    let db = StoryDatabase::in_memory().unwrap();
    db.connection()
        .execute("INSERT INTO nodes (id, trigger_id, x, y, title) VALUES ('bare', NULL, 5, 6, NULL)", [])
        .unwrap();

    let report = db.load().unwrap();
    let node = report.story.graph.nodes().next().unwrap();
    assert_eq!(node.title, "Untitled");
    assert_eq!(node.position, [5.0, 6.0]);
    assert!(node.dialogue.is_empty());
    assert!(node.scene.background.is_none());
    assert!(node.sounds.is_empty());
}

#[test]
fn variables_are_saved_on_their_own() {
    let mut db = StoryDatabase::in_memory().unwrap();
    db.save(&sample_story()).unwrap();
    let nodes_before = count(&db, "nodes");

    let (mut variables, warnings) = db.load_variables().unwrap();
    assert!(warnings.is_empty());
    variables.define("gold", VariableType::Number, "99");
    variables.remove("bag");
    db.save_variables(&variables).unwrap();

    let (reloaded, _) = db.load_variables().unwrap();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.get("gold").unwrap().default_value, Value::Number(99.0));
    assert_eq!(count(&db, "nodes"), nodes_before);
}

#[test]
fn deleting_an_entity_clears_triggers() {
    let story = sample_story();
    let guard = story.entities.iter().next().unwrap().id.clone();
    let mut db = StoryDatabase::in_memory().unwrap();
    db.save(&story).unwrap();

    db.save_entity(&Entity::new("Merchant")).unwrap();
    assert_eq!(count(&db, "entities"), 2);

    assert!(db.delete_entity(&guard).unwrap());
    assert!(!db.delete_entity(&guard).unwrap());
    let loaded = db.load().unwrap().story;
    assert_eq!(loaded.entities.len(), 1);
    assert!(loaded.graph.nodes().all(|node| node.trigger.is_none()));
}

#[test]
fn export_and_reopen_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("story.db");
    let copy = dir.path().join("copy.db");

    {
        let mut db = StoryDatabase::open(&path).unwrap();
        db.save(&sample_story()).unwrap();
        db.export_to(&copy).unwrap();
        assert!(db.export_to(&copy).is_err());
    }

    let reopened = StoryDatabase::open(&path).unwrap();
    assert_eq!(reopened.path(), Some(path.as_path()));
    assert_eq!(reopened.load().unwrap().story.graph.node_count(), 4);

    let exported = StoryDatabase::open(&copy).unwrap();
    assert_eq!(exported.load().unwrap().story.graph.item_count(), 4);
}

#[test]
fn legacy_database_is_migrated_and_loaded() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE nodes (id TEXT PRIMARY KEY, trigger_id TEXT, x INTEGER NOT NULL, y INTEGER NOT NULL, title TEXT);
         CREATE TABLE items (id TEXT PRIMARY KEY, node_id TEXT NOT NULL, title TEXT, connection_target_node_id TEXT);
         CREATE TABLE connections (id INTEGER PRIMARY KEY AUTOINCREMENT, from_node_id TEXT NOT NULL,
                                   from_item_id TEXT NOT NULL, to_node_id TEXT NOT NULL);
         CREATE TABLE variables (id TEXT PRIMARY KEY, key TEXT, type TEXT);
         INSERT INTO nodes VALUES ('a', NULL, 10, 20, 'Start');
         INSERT INTO nodes VALUES ('b', NULL, 30, 20, 'Next');
         INSERT INTO items VALUES ('i1', 'a', 'PRE_CONT', NULL);
         INSERT INTO connections (from_node_id, from_item_id, to_node_id) VALUES ('a', 'i1', 'b');
         INSERT INTO variables VALUES ('v1', 'gold', 'number');",
    )
    .unwrap();

    let db = StoryDatabase::from_connection(conn).unwrap();
    let report = db.load().unwrap();
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let story = report.story;
    assert_eq!(story.graph.connection_count(), 1);
    assert_eq!(story.variables.get("gold").unwrap().default_value, Value::Number(0.0));
}

/// Tables as the first release of the format created them
const FIRST_RELEASE_SCHEMA: &str = "
CREATE TABLE entities (id TEXT PRIMARY KEY, title TEXT, thumbnail TEXT);
CREATE TABLE sounds (id TEXT PRIMARY KEY, file_id TEXT, start_at TEXT, start_stop BOOLEAN, coninuity_id TEXT,
                     volume INTEGER, FOREIGN KEY (file_id) REFERENCES files(id));
CREATE TABLE changes (id TEXT PRIMARY KEY, key TEXT, value TEXT, operator TEXT, type TEXT);
CREATE TABLE variables (id TEXT PRIMARY KEY, key TEXT, type TEXT);
CREATE TABLE nodes (id TEXT PRIMARY KEY, trigger_id TEXT, x INTEGER NOT NULL, y INTEGER NOT NULL, title TEXT,
                    FOREIGN KEY (trigger_id) REFERENCES entities(id));
CREATE TABLE items (id TEXT PRIMARY KEY, node_id TEXT NOT NULL, title TEXT, connection_target_node_id TEXT,
                    FOREIGN KEY (node_id) REFERENCES nodes(id),
                    FOREIGN KEY (connection_target_node_id) REFERENCES nodes(id));
CREATE TABLE conditions (id INTEGER PRIMARY KEY AUTOINCREMENT, item_id TEXT NOT NULL, variable TEXT NOT NULL,
                         operator TEXT NOT NULL, value TEXT NOT NULL, FOREIGN KEY (item_id) REFERENCES items(id));
CREATE TABLE flags (id INTEGER PRIMARY KEY AUTOINCREMENT, item_id TEXT NOT NULL, flag_name TEXT NOT NULL,
                    value BOOLEAN NOT NULL, FOREIGN KEY (item_id) REFERENCES items(id));
CREATE TABLE connections (id INTEGER PRIMARY KEY AUTOINCREMENT, from_node_id TEXT NOT NULL,
                          from_item_id TEXT NOT NULL, to_node_id TEXT NOT NULL);
CREATE TABLE files (id INTEGER PRIMARY KEY AUTOINCREMENT, base64_data TEXT UNIQUE);
CREATE TABLE scenes (node_id TEXT PRIMARY KEY, background_file_id INTEGER, dialogue TEXT, speaker_color TEXT,
                     speaker TEXT, FOREIGN KEY (node_id) REFERENCES nodes(id));
CREATE TABLE sprites (id INTEGER PRIMARY KEY AUTOINCREMENT, scene_node_id TEXT NOT NULL, file_id INTEGER NOT NULL,
                      x INTEGER NOT NULL, y INTEGER NOT NULL, width INTEGER NOT NULL, height INTEGER NOT NULL,
                      zIndex INTEGER NOT NULL, flip BOOLEAN NOT NULL, focus BOOLEAN NOT NULL,
                      animation_class TEXT, continuity_id TEXT, FOREIGN KEY (scene_node_id) REFERENCES nodes(id));
";

fn first_release_database() -> StoryDatabase {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(FIRST_RELEASE_SCHEMA).unwrap();
    StoryDatabase::from_connection(conn).unwrap()
}

#[test]
fn first_release_database_round_trips_sounds() {
    let mut db = first_release_database();
    let story = sample_story();
    db.save(&story).unwrap();

    let report = db.load().unwrap();
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    let gate = story.graph.nodes().next().unwrap();
    let loaded = report.story.graph.node(&gate.id).unwrap();
    assert_eq!(loaded.sounds, gate.sounds);
    assert_eq!(loaded, gate);
}

#[test]
fn first_release_database_saves_are_idempotent() {
    let mut db = first_release_database();
    let story = sample_story();

    db.save(&story).unwrap();
    let first: Vec<_> = ALL_TABLES.iter().map(|t| table_contents(&db, t)).collect();
    db.save(&story).unwrap();
    let second: Vec<_> = ALL_TABLES.iter().map(|t| table_contents(&db, t)).collect();
    assert_eq!(first, second);
}

#[test]
fn first_release_database_accepts_sprites_without_images() {
    let mut db = first_release_database();
    let mut story = Story::new("Blank");
    let mut details = NodeDetails::titled("Empty stage");
    details.scene.sprites = vec![Sprite::new(None, 0.0, 0.0, 10.0, 10.0)];
    let node = story.graph.add_node([0.0, 0.0], details);

    db.save(&story).unwrap();
    let loaded = db.load().unwrap().story;
    let sprites = &loaded.graph.node(&node).unwrap().scene.sprites;
    assert_eq!(sprites.len(), 1);
    assert!(sprites[0].image.is_none());
}

#[test]
fn sounds_stored_as_text_are_read_as_numbers() {
    let db = StoryDatabase::in_memory().unwrap();
    let conn = db.connection();
    conn.execute_batch(
        "INSERT INTO nodes (id, trigger_id, x, y, title) VALUES ('n', NULL, 0, 0, 'Rain');
         INSERT INTO files (id, base64_data) VALUES (3, 'data:audio/ogg;base64,AA==');
         DROP TABLE sounds;
         CREATE TABLE sounds (id TEXT PRIMARY KEY, file_id TEXT, start_at TEXT, start_stop BOOLEAN,
                              continuity_id TEXT, volume INTEGER);
         INSERT INTO sounds VALUES ('n_sound_0', '3', '0.5', 1, 'rain', 70);",
    )
    .unwrap();

    let story = db.load().unwrap().story;
    let sound = &story.graph.nodes().next().unwrap().sounds[0];
    assert!(sound.file.is_some());
    assert_eq!(sound.start_at, 0.5);
}

#[test]
fn blank_titles_survive_a_round_trip() {
    let mut story = Story::new("Blank titles");
    let node = story.graph.add_node([0.0, 0.0], NodeDetails::titled("Draft"));
    story.graph.node_mut(&node).unwrap().title = String::new();

    let mut db = StoryDatabase::in_memory().unwrap();
    db.save(&story).unwrap();
    let loaded = db.load().unwrap().story;
    assert_eq!(loaded.graph.node(&node).unwrap().title, "");
    assert!(storyloom_graph::validate(&loaded)
        .iter()
        .any(|issue| matches!(issue, storyloom_graph::ValidationIssue::EmptyTitle { .. })));
}

#[test]
fn out_of_range_z_index_is_clamped() {
    let db = StoryDatabase::in_memory().unwrap();
    db.connection()
        .execute_batch(
            "INSERT INTO nodes (id, trigger_id, x, y, title) VALUES ('n', NULL, 0, 0, 'Tall');
             INSERT INTO sprites (scene_node_id, file_id, x, y, width, height, zIndex, flip, focus)
             VALUES ('n', NULL, 0, 0, 1, 1, 9999999999, 0, 0);",
        )
        .unwrap();

    let story = db.load().unwrap().story;
    assert_eq!(story.graph.nodes().next().unwrap().scene.sprites[0].z_index, i32::MAX);
}
