// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions for the graph.
//!
//! Connections are derived from item targets. The graph rebuilds them on
//! every item change; nothing else creates or owns one.

use crate::item::ItemId;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};

/// A realized edge from an item to a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Node owning the source item
    pub from_node: NodeId,
    /// Source item
    pub from_item: ItemId,
    /// Target node
    pub to_node: NodeId,
}

impl Connection {
    /// Create a new connection
    pub fn new(from_node: NodeId, from_item: ItemId, to_node: NodeId) -> Self {
        Self {
            from_node,
            from_item,
            to_node,
        }
    }

    /// Check if this connection involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.from_node == *node_id || self.to_node == *node_id
    }
}
