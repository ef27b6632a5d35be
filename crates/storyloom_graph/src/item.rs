// SPDX-License-Identifier: MIT OR Apache-2.0
//! Choice items (node exits) and their conditions/flags.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reserved item title marking an automatic, invisible continuation
pub const PRE_CONT: &str = "PRE_CONT";

/// Unique identifier for an item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    /// Create a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    /// `=`
    #[serde(rename = "=")]
    Equal,
    /// `>`
    #[serde(rename = ">")]
    Greater,
    /// `<`
    #[serde(rename = "<")]
    Less,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
}

impl ConditionOperator {
    /// Operator symbol as stored
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::NotEqual => "!=",
        }
    }

    /// All operators in editor order
    pub fn all() -> &'static [ConditionOperator] {
        &[Self::Equal, Self::Greater, Self::Less, Self::NotEqual]
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ConditionOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Self::Equal),
            ">" => Ok(Self::Greater),
            "<" => Ok(Self::Less),
            "!=" => Ok(Self::NotEqual),
            other => Err(format!("unknown condition operator `{other}`")),
        }
    }
}

/// `(variable, operator, literal)` predicate on an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Variable key
    pub variable: String,
    /// Comparison operator
    pub operator: ConditionOperator,
    /// Literal right-hand side, coerced to the variable's type on evaluation
    pub value: String,
}

impl Condition {
    /// Create a condition
    pub fn new(variable: impl Into<String>, operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Legacy boolean predicate on an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Flag (boolean variable) name
    pub name: String,
    /// Required value
    pub value: bool,
}

impl Flag {
    /// Create a flag
    pub fn new(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An outgoing choice/exit owned by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique item ID
    pub id: ItemId,
    /// Choice text, or [`PRE_CONT`]
    pub title: String,
    /// All must hold for the item to be eligible
    pub conditions: Vec<Condition>,
    /// Legacy flags, evaluated alongside conditions
    pub flags: Vec<Flag>,
    /// Fallback when no other item is eligible
    pub is_default: bool,
    /// Node this item leads to
    pub connection_target: Option<NodeId>,
}

impl Item {
    /// Whether this item is an automatic continuation
    pub fn is_continuation(&self) -> bool {
        self.title == PRE_CONT
    }
}

/// Editable fields of an item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDetails {
    /// Explicit id; an existing item with this id is replaced
    pub id: Option<ItemId>,
    /// Title (an untitled item becomes a [`PRE_CONT`] continuation)
    pub title: Option<String>,
    /// Conditions
    pub conditions: Vec<Condition>,
    /// Flags
    pub flags: Vec<Flag>,
    /// Default marker
    pub is_default: bool,
    /// Target node
    pub connection_target: Option<NodeId>,
}

impl ItemDetails {
    /// A titled choice
    pub fn choice(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// A `PRE_CONT` continuation to a node
    pub fn continuation(target: NodeId) -> Self {
        Self {
            title: Some(PRE_CONT.to_string()),
            connection_target: Some(target),
            ..Self::default()
        }
    }

    /// Set the id of the item to create or replace
    pub fn with_id(mut self, id: impl Into<ItemId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the target node
    pub fn with_target(mut self, target: NodeId) -> Self {
        self.connection_target = Some(target);
        self
    }

    /// Add a condition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a flag
    pub fn with_flag(mut self, flag: Flag) -> Self {
        self.flags.push(flag);
        self
    }

    /// Mark as default
    pub fn default_choice(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub(crate) fn into_item(self) -> Item {
        let title = self
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| PRE_CONT.to_string());
        Item {
            id: self.id.unwrap_or_default(),
            title,
            conditions: self.conditions,
            flags: self.flags,
            is_default: self.is_default,
            connection_target: self.connection_target,
        }
    }
}

impl From<&Item> for ItemDetails {
    fn from(item: &Item) -> Self {
        Self {
            id: Some(item.id.clone()),
            title: Some(item.title.clone()),
            conditions: item.conditions.clone(),
            flags: item.flags.clone(),
            is_default: item.is_default,
            connection_target: item.connection_target.clone(),
        }
    }
}
