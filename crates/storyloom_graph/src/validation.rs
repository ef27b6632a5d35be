// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authoring checks over a whole story.

use crate::entity::EntityId;
use crate::item::ItemId;
use crate::node::{Node, NodeId};
use crate::story::Story;
use crate::variable::VariableOperation;
use std::fmt;

/// A problem found in a story
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Node title is blank
    EmptyTitle {
        /// The node
        node: NodeId,
    },
    /// Item points at a node that does not exist
    DanglingTarget {
        /// Owning node
        node: NodeId,
        /// The item
        item: ItemId,
        /// Missing target
        target: NodeId,
    },
    /// More than one item is marked default
    MultipleDefaults {
        /// The node
        node: NodeId,
        /// Default items in order
        items: Vec<ItemId>,
    },
    /// Every choice is conditioned and none is a default, so playback can
    /// dead-end here
    NoFallback {
        /// The node
        node: NodeId,
    },
    /// A condition or flag names a variable that is not defined
    UnknownConditionVariable {
        /// Owning node
        node: NodeId,
        /// The item
        item: ItemId,
        /// Variable name
        variable: String,
    },
    /// A node change names a variable that is not defined
    UnknownChangeVariable {
        /// The node
        node: NodeId,
        /// Variable name
        variable: String,
    },
    /// A node change uses an operation the variable's type does not support
    InvalidOperation {
        /// The node
        node: NodeId,
        /// Variable name
        variable: String,
        /// The operation
        operation: VariableOperation,
    },
    /// Node trigger names an entity that does not exist
    UnknownEntity {
        /// The node
        node: NodeId,
        /// Missing entity
        entity: EntityId,
    },
}

impl ValidationIssue {
    /// Node the issue is reported on
    pub fn node(&self) -> &NodeId {
        match self {
            Self::EmptyTitle { node }
            | Self::DanglingTarget { node, .. }
            | Self::MultipleDefaults { node, .. }
            | Self::NoFallback { node }
            | Self::UnknownConditionVariable { node, .. }
            | Self::UnknownChangeVariable { node, .. }
            | Self::InvalidOperation { node, .. }
            | Self::UnknownEntity { node, .. } => node,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle { node } => write!(f, "node {node} has an empty title"),
            Self::DanglingTarget { node, item, target } => {
                write!(f, "item {item} on node {node} targets missing node {target}")
            }
            Self::MultipleDefaults { node, items } => {
                write!(f, "node {node} has {} default items", items.len())
            }
            Self::NoFallback { node } => {
                write!(f, "node {node} has only conditioned choices and no default")
            }
            Self::UnknownConditionVariable { node, item, variable } => {
                write!(f, "item {item} on node {node} tests unknown variable `{variable}`")
            }
            Self::UnknownChangeVariable { node, variable } => {
                write!(f, "node {node} changes unknown variable `{variable}`")
            }
            Self::InvalidOperation {
                node,
                variable,
                operation,
            } => write!(f, "node {node} applies `{operation}` to `{variable}` of the wrong type"),
            Self::UnknownEntity { node, entity } => {
                write!(f, "node {node} is triggered by missing entity {entity}")
            }
        }
    }
}

/// Check a story, reporting issues in node order
pub fn validate(story: &Story) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for node in story.graph.nodes() {
        check_node(story, node, &mut issues);
    }
    tracing::debug!("Validation found {} issues", issues.len());
    issues
}

fn check_node(story: &Story, node: &Node, issues: &mut Vec<ValidationIssue>) {
    if node.title.trim().is_empty() {
        issues.push(ValidationIssue::EmptyTitle { node: node.id.clone() });
    }

    if let Some(entity) = &node.trigger {
        if !story.entities.contains(entity) {
            issues.push(ValidationIssue::UnknownEntity {
                node: node.id.clone(),
                entity: entity.clone(),
            });
        }
    }

    for change in &node.variable_changes {
        match story.variables.type_of(&change.variable) {
            None => issues.push(ValidationIssue::UnknownChangeVariable {
                node: node.id.clone(),
                variable: change.variable.clone(),
            }),
            Some(var_type) if !change.operation.applies_to(var_type) => {
                issues.push(ValidationIssue::InvalidOperation {
                    node: node.id.clone(),
                    variable: change.variable.clone(),
                    operation: change.operation,
                });
            }
            Some(_) => {}
        }
    }

    for item in node.items() {
        if let Some(target) = &item.connection_target {
            if !story.graph.contains_node(target) {
                issues.push(ValidationIssue::DanglingTarget {
                    node: node.id.clone(),
                    item: item.id.clone(),
                    target: target.clone(),
                });
            }
        }

        let names = item
            .conditions
            .iter()
            .map(|c| c.variable.as_str())
            .chain(item.flags.iter().map(|f| f.name.as_str()))
            .filter(|name| !name.trim().is_empty());
        for name in names {
            if story.variables.get(name).is_none() {
                issues.push(ValidationIssue::UnknownConditionVariable {
                    node: node.id.clone(),
                    item: item.id.clone(),
                    variable: name.to_string(),
                });
            }
        }
    }

    if node.continuation().is_some() || node.item_count() == 0 {
        return;
    }

    let defaults: Vec<ItemId> = node
        .items()
        .filter(|item| item.is_default)
        .map(|item| item.id.clone())
        .collect();
    if defaults.len() > 1 {
        issues.push(ValidationIssue::MultipleDefaults {
            node: node.id.clone(),
            items: defaults,
        });
    } else if defaults.is_empty()
        && node
            .items()
            .all(|item| !item.conditions.is_empty() || !item.flags.is_empty())
    {
        issues.push(ValidationIssue::NoFallback { node: node.id.clone() });
    }
}
