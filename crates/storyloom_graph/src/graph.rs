// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, items and connections.

use crate::connection::Connection;
use crate::item::{Item, ItemDetails, ItemId};
use crate::node::{Node, NodeDetails, NodeId};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// A story graph
///
/// Nodes are kept in insertion order and indexed by id. Items are indexed
/// by id to their owning node, and the connection set is an index over item
/// targets keyed by the source item, so every item has at most one
/// connection.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Graph name
    pub name: String,
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Owning node of every item
    item_owners: HashMap<ItemId, NodeId>,
    /// Connections by source item
    connections: IndexMap<ItemId, Connection>,
    /// Source items of the connections entering each node
    incoming: HashMap<NodeId, IndexSet<ItemId>>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
            item_owners: HashMap::new(),
            connections: IndexMap::new(),
            incoming: HashMap::new(),
        }
    }

    /// Create a node at a position and add it to the graph
    pub fn add_node(&mut self, position: [f32; 2], details: NodeDetails) -> NodeId {
        self.insert_node(Node::new(position, details))
    }

    /// Add a fully built node
    ///
    /// A node with the same id is removed first. Items carried by `node`
    /// are indexed; targets pointing at missing nodes are cleared.
    pub fn insert_node(&mut self, mut node: Node) -> NodeId {
        let id = node.id.clone();
        if self.nodes.contains_key(&id) {
            self.remove_node(&id);
        }

        let items = std::mem::take(&mut node.items);
        self.nodes.insert(id.clone(), node);

        for (_, mut item) in items {
            if let Some(target) = &item.connection_target {
                if *target == id || !self.nodes.contains_key(target) {
                    tracing::warn!("Dropping target {} of item {} on node {}", target, item.id, id);
                    item.connection_target = None;
                }
            }
            self.attach_item(&id, item);
        }

        id
    }

    /// Remove a node, its items and every connection touching it
    ///
    /// Items on other nodes that pointed at the removed node survive with
    /// their target cleared.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<Node> {
        let mut node = self.nodes.shift_remove(node_id)?;

        for item_id in node.items.keys() {
            self.item_owners.remove(item_id);
            self.unlink(item_id);
        }

        if let Some(sources) = self.incoming.remove(node_id) {
            for item_id in sources {
                self.connections.shift_remove(&item_id);
                let Some(owner) = self.item_owners.get(&item_id) else {
                    continue;
                };
                if let Some(item) = self
                    .nodes
                    .get_mut(owner)
                    .and_then(|n| n.items.get_mut(&item_id))
                {
                    item.connection_target = None;
                }
            }
        }

        for item in node.items.values_mut() {
            if item.connection_target.as_ref() == Some(node_id) {
                item.connection_target = None;
            }
        }

        tracing::debug!("Removed node {} ({})", node.id, node.title);
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Check whether a node exists
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Get all nodes
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Create an item on a node, or replace the item with the same id
    ///
    /// A replaced item keeps its position and loses its previous connection
    /// before the new target is linked.
    pub fn add_item(&mut self, node_id: &NodeId, details: ItemDetails) -> Result<ItemId, GraphError> {
        if !self.nodes.contains_key(node_id) {
            return Err(GraphError::NodeNotFound(node_id.clone()));
        }
        if let Some(target) = &details.connection_target {
            self.check_target(node_id, target)?;
        }

        let item = details.into_item();
        if let Some(owner) = self.item_owners.get(&item.id) {
            if owner != node_id {
                return Err(GraphError::ItemOwnedElsewhere {
                    item: item.id,
                    owner: owner.clone(),
                });
            }
        }

        let id = item.id.clone();
        self.unlink(&id);
        self.attach_item(node_id, item);
        Ok(id)
    }

    /// Point an item at a node, or clear its target
    pub fn set_item_target(&mut self, item_id: &ItemId, target: Option<NodeId>) -> Result<(), GraphError> {
        let owner = self
            .item_owners
            .get(item_id)
            .cloned()
            .ok_or_else(|| GraphError::ItemNotFound(item_id.clone()))?;
        if let Some(target) = &target {
            self.check_target(&owner, target)?;
        }

        self.unlink(item_id);
        if let Some(item) = self.nodes.get_mut(&owner).and_then(|n| n.items.get_mut(item_id)) {
            item.connection_target = target.clone();
        }
        if let Some(target) = target {
            self.link(&owner, item_id, target);
        }
        Ok(())
    }

    /// Remove an item and its connection
    pub fn remove_item(&mut self, node_id: &NodeId, item_id: &ItemId) -> Result<Item, GraphError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;
        let item = node
            .items
            .shift_remove(item_id)
            .ok_or_else(|| GraphError::ItemNotFound(item_id.clone()))?;

        self.item_owners.remove(item_id);
        self.unlink(item_id);
        Ok(item)
    }

    /// Look up an item and its owning node
    pub fn item(&self, item_id: &ItemId) -> Option<(&Node, &Item)> {
        let node = self.nodes.get(self.item_owners.get(item_id)?)?;
        Some((node, node.items.get(item_id)?))
    }

    /// Total number of items across all nodes
    pub fn item_count(&self) -> usize {
        self.item_owners.len()
    }

    /// Get the connection leaving an item
    pub fn connection(&self, item_id: &ItemId) -> Option<&Connection> {
        self.connections.get(item_id)
    }

    /// Get all connections
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Get the connections leaving a node, in item order
    pub fn connections_from<'a>(&'a self, node_id: &NodeId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.nodes
            .get(node_id)
            .into_iter()
            .flat_map(|node| node.items.keys())
            .filter_map(|item_id| self.connections.get(item_id))
    }

    /// Get the connections entering a node
    pub fn connections_to<'a>(&'a self, node_id: &NodeId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.incoming
            .get(node_id)
            .into_iter()
            .flat_map(|sources| sources.iter())
            .filter_map(|item_id| self.connections.get(item_id))
    }

    /// Get connections involving a node
    pub fn connections_for_node<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.values().filter(move |c| c.involves_node(node_id))
    }

    /// Get the number of connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Copy a node with fresh node and item ids, offset on the canvas
    pub fn duplicate_node(&mut self, node_id: &NodeId, offset: [f32; 2]) -> Result<NodeId, GraphError> {
        let source = self
            .nodes
            .get(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?;

        let mut copy = source.clone();
        copy.id = NodeId::new();
        copy.position = [source.position[0] + offset[0], source.position[1] + offset[1]];
        copy.items = source
            .items
            .values()
            .map(|item| {
                let mut item = item.clone();
                item.id = ItemId::new();
                (item.id.clone(), item)
            })
            .collect();

        Ok(self.insert_node(copy))
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.item_owners.clear();
        self.connections.clear();
        self.incoming.clear();
    }

    fn check_target(&self, node_id: &NodeId, target: &NodeId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(target) {
            return Err(GraphError::NodeNotFound(target.clone()));
        }
        if target == node_id {
            return Err(GraphError::SelfLoop);
        }
        Ok(())
    }

    fn attach_item(&mut self, node_id: &NodeId, item: Item) {
        let item_id = item.id.clone();
        let target = item.connection_target.clone();
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.items.insert(item_id.clone(), item);
            self.item_owners.insert(item_id.clone(), node_id.clone());
        }
        if let Some(target) = target {
            self.link(node_id, &item_id, target);
        }
    }

    fn link(&mut self, node_id: &NodeId, item_id: &ItemId, target: NodeId) {
        self.incoming
            .entry(target.clone())
            .or_default()
            .insert(item_id.clone());
        self.connections.insert(
            item_id.clone(),
            Connection::new(node_id.clone(), item_id.clone(), target),
        );
    }

    fn unlink(&mut self, item_id: &ItemId) {
        if let Some(old) = self.connections.shift_remove(item_id) {
            if let Some(sources) = self.incoming.get_mut(&old.to_node) {
                sources.shift_remove(item_id);
                if sources.is_empty() {
                    self.incoming.remove(&old.to_node);
                }
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

/// Error when editing the graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// Item id already used by another node
    #[error("Item {item} belongs to node {owner}")]
    ItemOwnedElsewhere {
        /// The item
        item: ItemId,
        /// Its current owner
        owner: NodeId,
    },

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::default();
        let a = graph.add_node([0.0, 0.0], NodeDetails::titled("A"));
        let b = graph.add_node([200.0, 0.0], NodeDetails::titled("B"));
        (graph, a, b)
    }

    #[test]
    fn test_default_title() {
        let mut graph = Graph::default();
        let id = graph.add_node([1.0, 2.0], NodeDetails::default());
        let node = graph.node(&id).unwrap();
        assert_eq!(node.title, "Untitled");
        assert_eq!(node.position, [1.0, 2.0]);
    }

    #[test]
    fn test_item_creates_connection() {
        let (mut graph, a, b) = two_nodes();
        let item = graph
            .add_item(&a, ItemDetails::choice("Go").with_target(b.clone()))
            .unwrap();

        let connection = graph.connection(&item).unwrap();
        assert_eq!(connection.from_node, a);
        assert_eq!(connection.to_node, b);
        assert_eq!(graph.connections_to(&b).count(), 1);
    }

    #[test]
    fn test_retarget_replaces_connection() {
        let (mut graph, a, b) = two_nodes();
        let c = graph.add_node([400.0, 0.0], NodeDetails::titled("C"));
        let item = graph
            .add_item(&a, ItemDetails::choice("Go").with_target(b.clone()))
            .unwrap();

        graph
            .add_item(&a, ItemDetails::choice("Go").with_id(item.clone()).with_target(c.clone()))
            .unwrap();

        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.connection(&item).unwrap().to_node, c);
        assert_eq!(graph.connections_to(&b).count(), 0);
        assert_eq!(graph.node(&a).unwrap().item_count(), 1);
    }

    #[test]
    fn test_replace_keeps_order() {
        let (mut graph, a, _) = two_nodes();
        let first = graph.add_item(&a, ItemDetails::choice("One")).unwrap();
        graph.add_item(&a, ItemDetails::choice("Two")).unwrap();
        graph
            .add_item(&a, ItemDetails::choice("Uno").with_id(first.clone()))
            .unwrap();

        let titles: Vec<_> = graph.node(&a).unwrap().items().map(|i| i.title.clone()).collect();
        assert_eq!(titles, vec!["Uno", "Two"]);
    }

    #[test]
    fn test_remove_node_cleans_connections() {
        let (mut graph, a, b) = two_nodes();
        let into_b = graph
            .add_item(&a, ItemDetails::choice("To B").with_target(b.clone()))
            .unwrap();
        graph
            .add_item(&b, ItemDetails::choice("Back").with_target(a.clone()))
            .unwrap();

        graph.remove_node(&b).unwrap();

        assert_eq!(graph.connection_count(), 0);
        assert_eq!(graph.item_count(), 1);
        let (_, item) = graph.item(&into_b).unwrap();
        assert_eq!(item.connection_target, None);
        assert!(graph.connections_for_node(&a).next().is_none());
    }

    #[test]
    fn test_remove_item() {
        let (mut graph, a, b) = two_nodes();
        let item = graph
            .add_item(&a, ItemDetails::choice("Go").with_target(b.clone()))
            .unwrap();

        let removed = graph.remove_item(&a, &item).unwrap();
        assert_eq!(removed.title, "Go");
        assert_eq!(graph.connection_count(), 0);
        assert!(graph.item(&item).is_none());
        assert_eq!(
            graph.remove_item(&a, &item),
            Err(GraphError::ItemNotFound(item))
        );
    }

    #[test]
    fn test_invalid_targets() {
        let (mut graph, a, _) = two_nodes();
        assert_eq!(
            graph.add_item(&a, ItemDetails::choice("Loop").with_target(a.clone())),
            Err(GraphError::SelfLoop)
        );
        let missing = NodeId::from("missing");
        assert_eq!(
            graph.add_item(&a, ItemDetails::choice("Gone").with_target(missing.clone())),
            Err(GraphError::NodeNotFound(missing))
        );
    }

    #[test]
    fn test_item_id_owned_by_other_node() {
        let (mut graph, a, b) = two_nodes();
        let item = graph.add_item(&a, ItemDetails::choice("Mine")).unwrap();
        let result = graph.add_item(&b, ItemDetails::choice("Theirs").with_id(item.clone()));
        assert!(matches!(result, Err(GraphError::ItemOwnedElsewhere { .. })));
    }

    #[test]
    fn test_set_item_target() {
        let (mut graph, a, b) = two_nodes();
        let item = graph.add_item(&a, ItemDetails::choice("Go")).unwrap();

        graph.set_item_target(&item, Some(b.clone())).unwrap();
        assert_eq!(graph.connection(&item).unwrap().to_node, b);

        graph.set_item_target(&item, None).unwrap();
        assert!(graph.connection(&item).is_none());
        assert_eq!(graph.item(&item).unwrap().1.connection_target, None);
    }

    #[test]
    fn test_duplicate_node() {
        let (mut graph, a, b) = two_nodes();
        let item = graph
            .add_item(&a, ItemDetails::choice("Go").with_target(b.clone()))
            .unwrap();

        let copy = graph.duplicate_node(&a, [20.0, 20.0]).unwrap();
        let node = graph.node(&copy).unwrap();
        assert_eq!(node.position, [20.0, 20.0]);
        assert_eq!(node.title, "A");

        let copied = node.item_at(0).unwrap();
        assert_ne!(copied.id, item);
        assert_eq!(copied.connection_target, Some(b.clone()));
        assert_eq!(graph.connections_to(&b).count(), 2);
    }
}
