// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the story graph.

use crate::entity::EntityId;
use crate::item::{Item, ItemId};
use crate::scene::{Scene, Sound};
use crate::variable::VariableChange;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Title given to nodes created without one
pub const DEFAULT_NODE_TITLE: &str = "Untitled";

/// Unique identifier for a node
///
/// Ids are opaque strings so that databases written by other tools load
/// unchanged; fresh ids are random UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new random node ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Initial field values for a new node
#[derive(Debug, Clone, Default)]
pub struct NodeDetails {
    /// Explicit id (generated when `None`)
    pub id: Option<NodeId>,
    /// Display title (defaults to [`DEFAULT_NODE_TITLE`])
    pub title: Option<String>,
    /// Trigger entity
    pub trigger: Option<EntityId>,
    /// Dialogue text
    pub dialogue: String,
    /// Speaker name
    pub speaker: String,
    /// Speaker name color
    pub speaker_color: String,
    /// Scene composition
    pub scene: Scene,
    /// Sounds played on entry
    pub sounds: Vec<Sound>,
    /// Variable changes applied on entry
    pub variable_changes: Vec<VariableChange>,
}

impl NodeDetails {
    /// Details with a title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Set an explicit id
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the dialogue line and speaker
    pub fn with_dialogue(mut self, speaker: impl Into<String>, dialogue: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self.dialogue = dialogue.into();
        self
    }
}

/// A dialogue/scene beat in the story graph
///
/// Items are owned by the node and kept in authoring order. They are only
/// reachable read-only from here; mutation goes through [`crate::Graph`] so
/// that the connection index stays in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Position on the editor canvas
    pub position: [f32; 2],
    /// Display title
    pub title: String,
    /// Trigger/actor entity this node belongs to
    pub trigger: Option<EntityId>,
    /// Dialogue text
    pub dialogue: String,
    /// Speaker name
    pub speaker: String,
    /// Speaker name color (CSS color string)
    pub speaker_color: String,
    /// Changes applied to variables when the node plays
    pub variable_changes: Vec<VariableChange>,
    /// Sounds started or stopped when the node plays
    pub sounds: Vec<Sound>,
    /// Background and sprites
    pub scene: Scene,
    /// Outgoing choices, in authoring order
    pub(crate) items: IndexMap<ItemId, Item>,
}

impl Node {
    /// Create a node at a position from initial details
    pub fn new(position: [f32; 2], details: NodeDetails) -> Self {
        let title = details
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NODE_TITLE.to_string());
        Self {
            id: details.id.unwrap_or_default(),
            position,
            title,
            trigger: details.trigger,
            dialogue: details.dialogue,
            speaker: details.speaker,
            speaker_color: details.speaker_color,
            variable_changes: details.variable_changes,
            sounds: details.sounds,
            scene: details.scene,
            items: IndexMap::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Get an item by ID
    pub fn item(&self, item_id: &ItemId) -> Option<&Item> {
        self.items.get(item_id)
    }

    /// Items in authoring order
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Item at a position in authoring order
    pub fn item_at(&self, index: usize) -> Option<&Item> {
        self.items.get_index(index).map(|(_, item)| item)
    }

    /// Number of items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// The single `PRE_CONT` item, if this node is an automatic continuation
    pub fn continuation(&self) -> Option<&Item> {
        match self.items.len() {
            1 => self.items.values().next().filter(|item| item.is_continuation()),
            _ => None,
        }
    }
}
