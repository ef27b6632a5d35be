// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed global variables and the operations nodes apply to them.
//!
//! [`Variables`] holds the authored definitions and defaults of a story.
//! Playback never touches it: [`Variables::session`] hands out a
//! [`VariableState`] copy that node changes mutate for one play session.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Data type of a global variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// Text
    String,
    /// 64-bit float
    Number,
    /// true/false
    Boolean,
    /// List of strings
    Array,
}

impl VariableType {
    /// Name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
        }
    }

    /// All types in editor order
    pub fn all() -> &'static [VariableType] {
        &[Self::String, Self::Number, Self::Boolean, Self::Array]
    }

    /// Zero value of this type
    pub fn zero(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Number => Value::Number(0.0),
            Self::Boolean => Value::Boolean(false),
            Self::Array => Value::Array(Vec::new()),
        }
    }

    /// Convert editor text into a value of this type
    ///
    /// Numbers that fail to parse become `0`, booleans are `true` only for
    /// the literal `"true"`, arrays are comma separated and trimmed.
    pub fn coerce(&self, raw: &str) -> Value {
        match self {
            Self::String => Value::String(raw.to_string()),
            Self::Number => Value::Number(raw.trim().parse().unwrap_or(0.0)),
            Self::Boolean => Value::Boolean(raw.trim() == "true"),
            Self::Array => Value::Array(split_list(raw)),
        }
    }

    /// Whether editor text is acceptable for this type
    pub fn validate(&self, raw: &str) -> bool {
        match self {
            Self::String | Self::Array => true,
            Self::Number => raw.trim().parse::<f64>().is_ok(),
            Self::Boolean => matches!(raw.trim(), "true" | "false"),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "array" => Ok(Self::Array),
            other => Err(format!("unknown variable type `{other}`")),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|part| part.trim().to_string()).collect()
}

/// Runtime value of a variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Text
    String(String),
    /// Number
    Number(f64),
    /// Boolean
    Boolean(bool),
    /// List of strings
    Array(Vec<String>),
}

impl Value {
    /// Numeric view, parsing strings
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Array(_) => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::String(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Self::Number(_) | Self::Array(_) => None,
        }
    }

    /// List view
    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Encode as JSON, the form stored in `variables.default_value`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().cloned().map(serde_json::Value::String).collect())
            }
        }
    }

    /// Decode JSON into a value of the given type
    ///
    /// Mismatched JSON is coerced through its text form; `null` gives the
    /// zero value.
    pub fn from_json(json: &serde_json::Value, var_type: VariableType) -> Self {
        match (var_type, json) {
            (_, serde_json::Value::Null) => var_type.zero(),
            (VariableType::String, serde_json::Value::String(s)) => Self::String(s.clone()),
            (VariableType::Number, serde_json::Value::Number(n)) => Self::Number(n.as_f64().unwrap_or(0.0)),
            (VariableType::Boolean, serde_json::Value::Bool(b)) => Self::Boolean(*b),
            (VariableType::Array, serde_json::Value::Array(items)) => Self::Array(
                items
                    .iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            (_, serde_json::Value::String(s)) => var_type.coerce(s),
            (_, other) => var_type.coerce(&other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Array(items) => f.write_str(&items.join(",")),
        }
    }
}

/// A variable definition with its authored default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    /// Stable row id
    pub id: String,
    /// Unique variable name
    pub key: String,
    /// Data type
    pub var_type: VariableType,
    /// Authored default value
    pub default_value: Value,
}

impl GlobalVariable {
    /// Create a variable with a fresh id
    pub fn new(key: impl Into<String>, var_type: VariableType, default_value: Value) -> Self {
        Self {
            id: format!("var_{}", Uuid::new_v4().simple()),
            key: key.into(),
            var_type,
            default_value,
        }
    }
}

/// Authored variables of a story, keyed by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    vars: IndexMap<String, GlobalVariable>,
}

impl Variables {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a variable from editor text, keeping the id of an existing
    /// variable with the same key
    pub fn define(&mut self, key: &str, var_type: VariableType, raw_default: &str) -> &GlobalVariable {
        let default_value = var_type.coerce(raw_default);
        let id = self
            .vars
            .get(key)
            .map(|v| v.id.clone())
            .unwrap_or_else(|| GlobalVariable::new(key, var_type, var_type.zero()).id);
        self.insert(GlobalVariable {
            id,
            key: key.to_string(),
            var_type,
            default_value,
        })
    }

    /// Insert or replace a variable by key
    pub fn insert(&mut self, variable: GlobalVariable) -> &GlobalVariable {
        let key = variable.key.clone();
        let (index, _) = self.vars.insert_full(key, variable);
        &self.vars[index]
    }

    /// Get a variable by key
    pub fn get(&self, key: &str) -> Option<&GlobalVariable> {
        self.vars.get(key)
    }

    /// Type of a variable
    pub fn type_of(&self, key: &str) -> Option<VariableType> {
        self.vars.get(key).map(|v| v.var_type)
    }

    /// Remove a variable
    pub fn remove(&mut self, key: &str) -> Option<GlobalVariable> {
        self.vars.shift_remove(key)
    }

    /// Variables in definition order
    pub fn iter(&self) -> impl Iterator<Item = &GlobalVariable> {
        self.vars.values()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variable is defined
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Start a play session from the authored defaults
    pub fn session(&self) -> VariableState {
        VariableState {
            values: self
                .vars
                .values()
                .map(|v| (v.key.clone(), (v.var_type, v.default_value.clone())))
                .collect(),
        }
    }
}

/// Operation applied by a [`VariableChange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableOperation {
    /// Replace the value (all types)
    Set,
    /// Append text (string)
    Append,
    /// Prepend text (string)
    Prepend,
    /// Add (number)
    Add,
    /// Subtract (number)
    Subtract,
    /// Multiply (number)
    Multiply,
    /// Divide, ignored for a zero divisor (number)
    Divide,
    /// Negate (boolean)
    Toggle,
    /// Push an element (array)
    Push,
    /// Drop the last element (array)
    Pop,
    /// Remove every equal element (array)
    Remove,
    /// Empty the list (array)
    Clear,
}

impl VariableOperation {
    /// Name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Append => "append",
            Self::Prepend => "prepend",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Toggle => "toggle",
            Self::Push => "push",
            Self::Pop => "pop",
            Self::Remove => "remove",
            Self::Clear => "clear",
        }
    }

    /// Operations offered for a type
    pub fn for_type(var_type: VariableType) -> &'static [VariableOperation] {
        match var_type {
            VariableType::String => &[Self::Set, Self::Append, Self::Prepend],
            VariableType::Number => &[Self::Set, Self::Add, Self::Subtract, Self::Multiply, Self::Divide],
            VariableType::Boolean => &[Self::Set, Self::Toggle],
            VariableType::Array => &[Self::Set, Self::Push, Self::Pop, Self::Remove, Self::Clear],
        }
    }

    /// Whether this operation is defined for a type
    pub fn applies_to(&self, var_type: VariableType) -> bool {
        Self::for_type(var_type).contains(self)
    }
}

impl fmt::Display for VariableOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "set" | "=" => Self::Set,
            "append" => Self::Append,
            "prepend" => Self::Prepend,
            "add" | "+" => Self::Add,
            "subtract" | "-" => Self::Subtract,
            "multiply" | "*" => Self::Multiply,
            "divide" | "/" => Self::Divide,
            "toggle" => Self::Toggle,
            "push" => Self::Push,
            "pop" => Self::Pop,
            "remove" => Self::Remove,
            "clear" => Self::Clear,
            other => return Err(format!("unknown variable operation `{other}`")),
        };
        Ok(op)
    }
}

/// A change applied to a variable when a node plays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableChange {
    /// Variable key
    pub variable: String,
    /// Operation
    pub operation: VariableOperation,
    /// Operand as editor text
    pub value: String,
}

impl VariableChange {
    /// Create a change
    pub fn new(variable: impl Into<String>, operation: VariableOperation, value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            operation,
            value: value.into(),
        }
    }
}

/// Variable values of one play session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableState {
    values: IndexMap<String, (VariableType, Value)>,
}

impl VariableState {
    /// Current value of a variable
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).map(|(_, value)| value)
    }

    /// Type of a variable
    pub fn type_of(&self, key: &str) -> Option<VariableType> {
        self.values.get(key).map(|(t, _)| *t)
    }

    /// Set a variable directly, defining it if needed
    pub fn set(&mut self, key: impl Into<String>, var_type: VariableType, value: Value) {
        self.values.insert(key.into(), (var_type, value));
    }

    /// Values in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, (_, v))| (k.as_str(), v))
    }

    /// Apply a change
    ///
    /// Returns whether a value was written. Unknown variables, operations
    /// that do not fit the variable's type, unparsable numeric operands and
    /// division by zero leave the state untouched.
    pub fn apply(&mut self, change: &VariableChange) -> bool {
        let Some((var_type, current)) = self.values.get_mut(&change.variable) else {
            tracing::debug!("Ignoring change to unknown variable `{}`", change.variable);
            return false;
        };
        if !change.operation.applies_to(*var_type) {
            tracing::debug!(
                "Ignoring `{}` on {} variable `{}`",
                change.operation,
                var_type,
                change.variable
            );
            return false;
        }

        let next = match var_type {
            VariableType::String => apply_string(current, change),
            VariableType::Number => apply_number(current, change),
            VariableType::Boolean => apply_boolean(current, change),
            VariableType::Array => apply_array(current, change),
        };

        match next {
            Some(value) => {
                *current = value;
                true
            }
            None => false,
        }
    }

    /// Apply changes in order, returning how many wrote a value
    pub fn apply_all<'a>(&mut self, changes: impl IntoIterator<Item = &'a VariableChange>) -> usize {
        changes.into_iter().filter(|change| self.apply(change)).count()
    }
}

fn apply_string(current: &Value, change: &VariableChange) -> Option<Value> {
    let current = current.to_string();
    let value = match change.operation {
        VariableOperation::Set => change.value.clone(),
        VariableOperation::Append => current + &change.value,
        VariableOperation::Prepend => format!("{}{}", change.value, current),
        _ => return None,
    };
    Some(Value::String(value))
}

fn apply_number(current: &Value, change: &VariableChange) -> Option<Value> {
    let operand = change.value.trim().parse::<f64>().ok();
    let current = current.as_number().unwrap_or(0.0);
    let value = match (change.operation, operand) {
        (VariableOperation::Set, operand) => operand.unwrap_or(0.0),
        (_, None) => return None,
        (VariableOperation::Add, Some(n)) => current + n,
        (VariableOperation::Subtract, Some(n)) => current - n,
        (VariableOperation::Multiply, Some(n)) => current * n,
        (VariableOperation::Divide, Some(n)) if n == 0.0 => return None,
        (VariableOperation::Divide, Some(n)) => current / n,
        _ => return None,
    };
    Some(Value::Number(value))
}

fn apply_boolean(current: &Value, change: &VariableChange) -> Option<Value> {
    let value = match change.operation {
        VariableOperation::Set => change.value.trim() == "true",
        VariableOperation::Toggle => !current.as_bool().unwrap_or(false),
        _ => return None,
    };
    Some(Value::Boolean(value))
}

fn apply_array(current: &Value, change: &VariableChange) -> Option<Value> {
    let mut items = current.as_array().map(<[String]>::to_vec).unwrap_or_default();
    match change.operation {
        VariableOperation::Set => items = split_list(&change.value),
        VariableOperation::Push => items.push(change.value.clone()),
        VariableOperation::Pop => {
            items.pop();
        }
        VariableOperation::Remove => items.retain(|item| *item != change.value),
        VariableOperation::Clear => items.clear(),
        _ => return None,
    }
    Some(Value::Array(items))
}
