// SPDX-License-Identifier: MIT OR Apache-2.0
//! SQLite persistence for Storyloom stories.
//!
//! A [`Story`](storyloom_graph::Story) maps onto a normalized schema: nodes,
//! items, conditions, flags, connections, scenes, sprites, sprite sound
//! effects, node changes, sounds, variables and entities. Binary assets live in
//! a `files` table deduplicated by content, and every other table refers to
//! them by row id.
//!
//! A full save clears and rewrites every story table inside one transaction,
//! so a failed save leaves the previous contents in place. Loading tolerates
//! rows that no longer fit the graph and reports them as [`LoadWarning`]s.

pub mod error;
pub mod files;
pub mod schema;
pub mod store;

pub use error::PersistenceError;
pub use files::FileCache;
pub use store::{LoadReport, LoadWarning, SaveStats, StoryDatabase};
