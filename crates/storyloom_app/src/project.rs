// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project settings and lifecycle.
//!
//! A project is a story database plus a RON settings file with the same
//! stem next to it (`castle.db` and `castle.ron`). The settings hold:
//! - Project metadata (name, description, timestamps)
//! - Script import layout
//! - Playback options

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use storyloom_graph::{Entity, EntityId, ImportLayout, Story};
use storyloom_persistence::{LoadWarning, PersistenceError, SaveStats, StoryDatabase};
use storyloom_player::{PlayerOptions, DEFAULT_MAX_AUTO_STEPS};

/// Current project settings format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Extension of the settings file
pub const SETTINGS_EXTENSION: &str = "ron";

/// Project errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Settings or database file could not be read or written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid RON
    #[error("Invalid settings file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Failed to write settings: {0}")]
    Serialize(#[from] ron::Error),

    /// Settings written by a newer version
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version understood
        supported: u32,
    },

    /// `create` on an existing database
    #[error("Project already exists at {0}")]
    AlreadyExists(PathBuf),

    /// `open` on a missing database
    #[error("No project at {0}")]
    NotFound(PathBuf),

    /// Database error
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Project metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    /// Story name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Creation time, seconds since the Unix epoch
    pub created: u64,
    /// Last save, seconds since the Unix epoch
    pub last_modified: u64,
}

impl Default for ProjectMetadata {
    fn default() -> Self {
        Self {
            name: "Untitled Story".to_string(),
            description: String::new(),
            created: 0,
            last_modified: 0,
        }
    }
}

/// Placement of nodes created by script import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Position of the first node of the first block
    pub origin: [f32; 2],
    /// Horizontal distance between nodes of a block
    pub column_spacing: f32,
    /// Vertical distance between blocks
    pub row_spacing: f32,
}

impl Default for ImportSettings {
    fn default() -> Self {
        let layout = ImportLayout::default();
        Self {
            origin: layout.origin,
            column_spacing: layout.column_spacing,
            row_spacing: layout.row_spacing,
        }
    }
}

impl From<&ImportSettings> for ImportLayout {
    fn from(settings: &ImportSettings) -> Self {
        ImportLayout {
            origin: settings.origin,
            column_spacing: settings.column_spacing,
            row_spacing: settings.row_spacing,
        }
    }
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Nodes played without a choice before giving up
    pub max_auto_steps: usize,
    /// Delay per character when printing dialogue, 0 prints at once
    pub typing_speed_ms: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_auto_steps: DEFAULT_MAX_AUTO_STEPS,
            typing_speed_ms: 0,
        }
    }
}

impl From<&PlayerSettings> for PlayerOptions {
    fn from(settings: &PlayerSettings) -> Self {
        PlayerOptions {
            max_auto_steps: settings.max_auto_steps,
        }
    }
}

/// Complete project settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Settings format version
    pub version: u32,
    /// Project metadata
    pub metadata: ProjectMetadata,
    /// Script import
    pub import: ImportSettings,
    /// Playback
    pub player: PlayerSettings,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            version: PROJECT_FORMAT_VERSION,
            metadata: ProjectMetadata::default(),
            import: ImportSettings::default(),
            player: PlayerSettings::default(),
        }
    }
}

impl ProjectSettings {
    /// Create new project settings with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let mut settings = Self::default();
        settings.metadata.name = name.into();
        settings.metadata.created = now();
        settings.metadata.last_modified = settings.metadata.created;
        settings
    }

    /// Load project settings from a file
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        let content = std::fs::read_to_string(path)?;
        let settings: ProjectSettings = ron::from_str(&content)?;

        if settings.version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: settings.version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }

        Ok(settings)
    }

    /// Save project settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Settings file belonging to a database
    pub fn path_for(database: &Path) -> PathBuf {
        database.with_extension(SETTINGS_EXTENSION)
    }

    /// Import layout
    pub fn import_layout(&self) -> ImportLayout {
        ImportLayout::from(&self.import)
    }

    /// Player options
    pub fn player_options(&self) -> PlayerOptions {
        PlayerOptions::from(&self.player)
    }
}

/// An open project
pub struct ProjectManager {
    database: StoryDatabase,
    database_path: PathBuf,
    story: Story,
    /// Current project settings
    pub settings: ProjectSettings,
    load_warnings: Vec<LoadWarning>,
    dirty: bool,
}

impl ProjectManager {
    /// Create a new project with an empty story
    pub fn create(database_path: &Path, name: &str) -> Result<Self, ProjectError> {
        if database_path.exists() {
            return Err(ProjectError::AlreadyExists(database_path.to_path_buf()));
        }
        if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut database = StoryDatabase::open(database_path)?;
        let story = Story::new(name);
        database.save(&story)?;

        let settings = ProjectSettings::new(name);
        settings.save(&ProjectSettings::path_for(database_path))?;

        tracing::info!("Created new project: {} at {:?}", name, database_path);
        Ok(Self {
            database,
            database_path: database_path.to_path_buf(),
            story,
            settings,
            load_warnings: Vec::new(),
            dirty: false,
        })
    }

    /// Open an existing project
    ///
    /// A database without a settings file gets default settings named after
    /// the file stem.
    pub fn open(database_path: &Path) -> Result<Self, ProjectError> {
        if !database_path.is_file() {
            return Err(ProjectError::NotFound(database_path.to_path_buf()));
        }

        let database = StoryDatabase::open(database_path)?;
        let report = database.load()?;

        let settings_path = ProjectSettings::path_for(database_path);
        let settings = if settings_path.is_file() {
            ProjectSettings::load(&settings_path)?
        } else {
            let stem = database_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::debug!("No settings file for {:?}, using defaults", database_path);
            ProjectSettings::new(stem)
        };

        let mut story = report.story;
        story.graph.name = settings.metadata.name.clone();

        tracing::info!("Opened project: {} at {:?}", settings.metadata.name, database_path);
        Ok(Self {
            database,
            database_path: database_path.to_path_buf(),
            story,
            settings,
            load_warnings: report.warnings,
            dirty: false,
        })
    }

    /// Write the story and settings
    pub fn save(&mut self) -> Result<SaveStats, ProjectError> {
        let stats = self.database.save(&self.story)?;
        self.save_settings()?;
        self.dirty = false;
        Ok(stats)
    }

    /// Write only the authored variables and settings
    pub fn save_variables(&mut self) -> Result<(), ProjectError> {
        self.database.save_variables(&self.story.variables)?;
        self.save_settings()?;
        Ok(())
    }

    /// Add or replace an entity, writing it immediately
    pub fn upsert_entity(&mut self, entity: Entity) -> Result<(), ProjectError> {
        self.database.save_entity(&entity)?;
        self.story.entities.upsert(entity);
        Ok(())
    }

    /// Remove an entity and clear triggers pointing at it, writing immediately
    ///
    /// Returns whether the entity existed.
    pub fn remove_entity(&mut self, id: &EntityId) -> Result<bool, ProjectError> {
        let removed = self.story.remove_entity(id).is_some();
        let deleted = self.database.delete_entity(id)?;
        Ok(removed || deleted)
    }

    /// Copy the database to a new file
    pub fn export(&self, target: &Path) -> Result<(), ProjectError> {
        self.database.export_to(target)?;
        tracing::info!("Exported project to {:?}", target);
        Ok(())
    }

    fn save_settings(&mut self) -> Result<(), ProjectError> {
        self.settings.metadata.last_modified = now();
        self.settings.save(&ProjectSettings::path_for(&self.database_path))?;
        tracing::info!("Saved project {}", self.settings.metadata.name);
        Ok(())
    }

    /// The story
    pub fn story(&self) -> &Story {
        &self.story
    }

    /// The story, for editing; marks the project dirty
    pub fn story_mut(&mut self) -> &mut Story {
        self.dirty = true;
        &mut self.story
    }

    /// Get the project name
    pub fn project_name(&self) -> &str {
        &self.settings.metadata.name
    }

    /// Database file
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Rows repaired when the project was opened
    pub fn load_warnings(&self) -> &[LoadWarning] {
        &self.load_warnings
    }

    /// Check if there are unsaved changes
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
