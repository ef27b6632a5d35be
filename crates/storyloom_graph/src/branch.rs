// SPDX-License-Identifier: MIT OR Apache-2.0
//! Branch resolution: which node plays after a given node.

use crate::item::{Condition, ConditionOperator, Flag, Item, ItemId};
use crate::node::{Node, NodeId};
use crate::variable::{Value, VariableState, VariableType};
use std::cmp::Ordering;
use std::fmt;

/// A choice offered to the player
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// Item behind the choice
    pub item: ItemId,
    /// Text shown to the player
    pub title: String,
    /// Node the choice leads to; `None` ends the flow
    pub target: Option<NodeId>,
}

impl From<&Item> for Choice {
    fn from(item: &Item) -> Self {
        Self {
            item: item.id.clone(),
            title: item.title.clone(),
            target: item.connection_target.clone(),
        }
    }
}

/// Outcome of resolving a node's exits
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Single `PRE_CONT` item: advance without asking
    Continue {
        /// The continuation item
        item: ItemId,
        /// Next node
        target: NodeId,
    },
    /// Eligible choices in item order
    Choices(Vec<Choice>),
    /// Nothing eligible: advance through the default item
    Fallback {
        /// The default item
        item: ItemId,
        /// Next node
        target: NodeId,
    },
    /// The flow ends here
    End,
}

impl Resolution {
    /// Next node when no player input is needed
    pub fn next_node(&self) -> Option<&NodeId> {
        match self {
            Self::Continue { target, .. } | Self::Fallback { target, .. } => Some(target),
            Self::Choices(_) | Self::End => None,
        }
    }

    /// Whether the player has to pick
    pub fn needs_choice(&self) -> bool {
        matches!(self, Self::Choices(_))
    }

    /// Whether playback stops
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Authoring problem noticed while resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchWarning {
    /// More than one item is marked default; the first one is used
    MultipleDefaults {
        /// Node owning the items
        node: NodeId,
        /// Every default item, in item order
        items: Vec<ItemId>,
    },
    /// No item is eligible and there is no default to fall back to
    NoEligibleChoice {
        /// The dead-end node
        node: NodeId,
    },
}

impl fmt::Display for BranchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleDefaults { node, items } => {
                write!(f, "node {node} has {} default items, using the first", items.len())
            }
            Self::NoEligibleChoice { node } => write!(f, "node {node} has no eligible choice and no default"),
        }
    }
}

/// Resolution with the warnings raised on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Where the flow goes
    pub resolution: Resolution,
    /// Authoring problems, empty for a well-formed node
    pub warnings: Vec<BranchWarning>,
}

/// Resolve the exits of a node against the current variables
pub fn resolve(node: &Node, vars: &VariableState) -> Branch {
    let mut warnings = Vec::new();

    if node.item_count() == 0 {
        return Branch {
            resolution: Resolution::End,
            warnings,
        };
    }

    if let Some(item) = node.continuation() {
        let resolution = match &item.connection_target {
            Some(target) => Resolution::Continue {
                item: item.id.clone(),
                target: target.clone(),
            },
            None => Resolution::End,
        };
        return Branch { resolution, warnings };
    }

    let defaults: Vec<&Item> = node.items().filter(|item| item.is_default).collect();
    if defaults.len() > 1 {
        tracing::warn!("Node {} has {} default items, using the first", node.id, defaults.len());
        warnings.push(BranchWarning::MultipleDefaults {
            node: node.id.clone(),
            items: defaults.iter().map(|item| item.id.clone()).collect(),
        });
    }

    let choices: Vec<Choice> = node
        .items()
        .filter(|item| !item.is_default && is_eligible(item, vars))
        .map(Choice::from)
        .collect();

    let resolution = if !choices.is_empty() {
        Resolution::Choices(choices)
    } else if let Some(default) = defaults.first() {
        match &default.connection_target {
            Some(target) => Resolution::Fallback {
                item: default.id.clone(),
                target: target.clone(),
            },
            None => Resolution::End,
        }
    } else {
        tracing::warn!("Node {} has no eligible item and no default", node.id);
        warnings.push(BranchWarning::NoEligibleChoice { node: node.id.clone() });
        Resolution::End
    };

    Branch { resolution, warnings }
}

/// Whether every condition and flag of an item holds
pub fn is_eligible(item: &Item, vars: &VariableState) -> bool {
    item.conditions.iter().all(|c| evaluate_condition(c, vars))
        && item.flags.iter().all(|f| evaluate_flag(f, vars))
}

/// Evaluate a condition
///
/// A condition naming no variable, or a variable that is not defined, holds
/// vacuously. The literal is coerced to the variable's type: numbers compare
/// numerically, everything else compares by text.
pub fn evaluate_condition(condition: &Condition, vars: &VariableState) -> bool {
    if condition.variable.trim().is_empty() {
        return true;
    }
    let (Some(var_type), Some(current)) = (vars.type_of(&condition.variable), vars.get(&condition.variable))
    else {
        return true;
    };

    let ordering = match var_type {
        VariableType::Number => {
            let rhs = condition.value.trim().parse::<f64>().ok();
            match (current.as_number(), rhs) {
                (Some(lhs), Some(rhs)) => lhs.partial_cmp(&rhs),
                _ => None,
            }
        }
        VariableType::Boolean => {
            let rhs = var_type.coerce(&condition.value);
            current.as_bool().zip(rhs.as_bool()).map(|(lhs, rhs)| lhs.cmp(&rhs))
        }
        VariableType::String | VariableType::Array => {
            Some(current.to_string().as_str().cmp(condition.value.as_str()))
        }
    };

    match (condition.operator, ordering) {
        (ConditionOperator::Equal, Some(o)) => o == Ordering::Equal,
        (ConditionOperator::NotEqual, Some(o)) => o != Ordering::Equal,
        (ConditionOperator::Greater, Some(o)) => o == Ordering::Greater,
        (ConditionOperator::Less, Some(o)) => o == Ordering::Less,
        (ConditionOperator::NotEqual, None) => true,
        (_, None) => false,
    }
}

/// Evaluate a flag as `name = value` on a boolean variable
///
/// Flags naming an undefined or non-boolean variable hold vacuously.
pub fn evaluate_flag(flag: &Flag, vars: &VariableState) -> bool {
    match vars.get(&flag.name).and_then(Value::as_bool) {
        Some(current) => current == flag.value,
        None => true,
    }
}
