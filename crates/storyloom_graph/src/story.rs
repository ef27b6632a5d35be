// SPDX-License-Identifier: MIT OR Apache-2.0
//! A complete story: graph, variables and entities.

use crate::entity::{Entities, Entity, EntityId};
use crate::graph::{Graph, GraphError};
use crate::node::NodeId;
use crate::variable::{VariableState, Variables};

/// Everything saved to and loaded from a story database
#[derive(Debug, Clone, Default)]
pub struct Story {
    /// Nodes, items and connections
    pub graph: Graph,
    /// Authored variable definitions and defaults
    pub variables: Variables,
    /// Trigger/actor entities
    pub entities: Entities,
}

impl Story {
    /// Create an empty story
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(name),
            variables: Variables::new(),
            entities: Entities::new(),
        }
    }

    /// Start a play session from the authored variable defaults
    pub fn session(&self) -> VariableState {
        self.variables.session()
    }

    /// Point a node at an entity, or clear its trigger
    pub fn set_trigger(&mut self, node_id: &NodeId, entity: Option<EntityId>) -> Result<(), GraphError> {
        let node = self
            .graph
            .node_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        node.trigger = entity;
        Ok(())
    }

    /// Remove an entity and clear every trigger pointing at it
    pub fn remove_entity(&mut self, id: &EntityId) -> Option<Entity> {
        let removed = self.entities.remove(id)?;
        let affected: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|node| node.trigger.as_ref() == Some(id))
            .map(|node| node.id.clone())
            .collect();
        for node_id in &affected {
            if let Some(node) = self.graph.node_mut(node_id) {
                node.trigger = None;
            }
        }
        tracing::debug!("Removed entity {} ({} triggers cleared)", id, affected.len());
        Some(removed)
    }

    /// Nodes triggered by an entity
    pub fn nodes_triggered_by<'a>(&'a self, id: &'a EntityId) -> impl Iterator<Item = &'a NodeId> + 'a {
        self.graph
            .nodes()
            .filter(move |node| node.trigger.as_ref() == Some(id))
            .map(|node| &node.id)
    }
}
