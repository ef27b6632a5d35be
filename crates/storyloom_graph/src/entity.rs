// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reusable trigger/actor entities that nodes can point at.

use crate::scene::Asset;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new unique entity ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A trigger or actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique id
    pub id: EntityId,
    /// Display title
    pub title: String,
    /// Thumbnail image
    pub thumbnail: Option<Asset>,
}

impl Entity {
    /// Create an entity with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            title: title.into(),
            thumbnail: None,
        }
    }

    /// Set the thumbnail
    pub fn with_thumbnail(mut self, thumbnail: Asset) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }
}

/// Entity registry of a story
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    entities: IndexMap<EntityId, Entity>,
}

impl Entities {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity, returning the previous version
    pub fn upsert(&mut self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.id.clone(), entity)
    }

    /// Remove an entity
    ///
    /// Node triggers are not touched here; [`crate::Story::remove_entity`]
    /// clears them.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        self.entities.shift_remove(id)
    }

    /// Get an entity
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Check whether an entity exists
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Entity> for Entities {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        let mut entities = Self::new();
        for entity in iter {
            entities.upsert(entity);
        }
        entities
    }
}
