// SPDX-License-Identifier: MIT OR Apache-2.0
//! Story graph model for Storyloom.
//!
//! This crate holds everything about a branching dialogue story that does
//! not touch a database or a renderer:
//! - Nodes (dialogue/scene beats) and their choice items
//! - Connections derived from item targets
//! - Typed global variables and node-level variable changes
//! - Branch resolution against the current variable state
//! - Script import for `actor: dialogue` text
//! - Graph validation
//!
//! ## Architecture
//!
//! [`Graph`] is the single source of truth for an editing session. Nodes and
//! items are indexed by id, and the connection set is an index maintained by
//! the graph itself, never authored directly. [`Story`] bundles the graph with
//! its [`Variables`] and [`Entities`] so that persistence and playback have
//! one value to work with.

pub mod branch;
pub mod connection;
pub mod entity;
pub mod graph;
pub mod item;
pub mod node;
pub mod scene;
pub mod script;
pub mod story;
pub mod validation;
pub mod variable;

pub use branch::{resolve, Branch, BranchWarning, Choice, Resolution};
pub use connection::Connection;
pub use entity::{Entities, Entity, EntityId};
pub use graph::{Graph, GraphError};
pub use item::{Condition, ConditionOperator, Flag, Item, ItemDetails, ItemId, PRE_CONT};
pub use node::{Node, NodeDetails, NodeId, DEFAULT_NODE_TITLE};
pub use scene::{Asset, AssetError, Scene, Sound, Sprite, SpriteSfx};
pub use script::{
    import_script, lint, ImportLayout, ScriptDiagnostic, ScriptError, ScriptImport, Severity, NARRATION_TITLE,
};
pub use story::Story;
pub use validation::{validate, ValidationIssue};
pub use variable::{
    GlobalVariable, Value, VariableChange, VariableOperation, VariableState, VariableType, Variables,
};
