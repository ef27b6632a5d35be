// SPDX-License-Identifier: MIT OR Apache-2.0
//! Import of line-oriented dialogue scripts.
//!
//! ```text
//! John: Hello there!
//! Mary: Hi John!
//! - The wind blows gently.
//!
//! John: How are you?
//! ```
//!
//! Every non-blank line is either `actor: dialogue` or `- description`.
//! Blank lines separate blocks; the lines of a block become a chain of
//! nodes joined by `PRE_CONT` items.

use crate::graph::{Graph, GraphError};
use crate::item::{ItemDetails, ItemId};
use crate::node::{NodeDetails, NodeId};

/// Title given to nodes created from description lines
pub const NARRATION_TITLE: &str = "Narration";

/// Severity of a script diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The line is skipped on import
    Error,
    /// The line imports but is probably a mistake
    Warning,
}

/// A problem on one script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDiagnostic {
    /// Zero-based line number
    pub line: usize,
    /// Severity
    pub severity: Severity,
    /// Message for the author
    pub message: String,
}

impl ScriptDiagnostic {
    fn error(line: usize, message: &str) -> Self {
        Self {
            line,
            severity: Severity::Error,
            message: message.to_string(),
        }
    }

    fn warning(line: usize, message: &str) -> Self {
        Self {
            line,
            severity: Severity::Warning,
            message: message.to_string(),
        }
    }
}

/// Canvas placement of imported nodes
///
/// Node `i` of block `g` lands at `origin + (i * column_spacing, g * row_spacing)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportLayout {
    /// Position of the first node of the first block
    pub origin: [f32; 2],
    /// Horizontal distance between nodes of a block
    pub column_spacing: f32,
    /// Vertical distance between blocks
    pub row_spacing: f32,
}

impl Default for ImportLayout {
    fn default() -> Self {
        Self {
            origin: [100.0, 100.0],
            column_spacing: 250.0,
            row_spacing: 150.0,
        }
    }
}

impl ImportLayout {
    fn position(&self, block: usize, index: usize) -> [f32; 2] {
        [
            self.origin[0] + index as f32 * self.column_spacing,
            self.origin[1] + block as f32 * self.row_spacing,
        ]
    }
}

/// What an import added to the graph
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptImport {
    /// Created nodes, block by block in line order
    pub nodes: Vec<NodeId>,
    /// Created `PRE_CONT` items
    pub items: Vec<ItemId>,
    /// Number of blocks that produced at least one node
    pub blocks: usize,
    /// Diagnostics for the imported text; error lines were skipped
    pub diagnostics: Vec<ScriptDiagnostic>,
}

/// Error importing a script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Blank input
    #[error("Script is empty")]
    Empty,

    /// Every line was rejected
    #[error("Script has no importable lines")]
    NothingToImport(Vec<ScriptDiagnostic>),

    /// Graph rejected an edit
    #[error(transparent)]
    Graph(#[from] GraphError),
}

enum Line<'a> {
    Dialogue { actor: &'a str, text: &'a str },
    Description(&'a str),
}

fn parse_line(raw: &str) -> Result<Line<'_>, &'static str> {
    let line = raw.trim();
    if let Some(description) = line.strip_prefix('-') {
        return Ok(Line::Description(description.trim()));
    }
    match line.split_once(':') {
        Some((actor, _)) if actor.trim().is_empty() => Err("Actor name cannot be empty"),
        Some((actor, text)) => Ok(Line::Dialogue {
            actor: actor.trim(),
            text: text.trim(),
        }),
        None => Err("Line must be in 'actor: dialogue' format or start with '-' for descriptions"),
    }
}

/// Check a script without importing it
pub fn lint(text: &str) -> Vec<ScriptDiagnostic> {
    let mut diagnostics = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        match parse_line(raw) {
            Err(message) => diagnostics.push(ScriptDiagnostic::error(number, message)),
            Ok(Line::Description("")) => {
                diagnostics.push(ScriptDiagnostic::warning(number, "Description cannot be empty"));
            }
            Ok(Line::Dialogue { text: "", .. }) => {
                diagnostics.push(ScriptDiagnostic::warning(number, "Dialogue cannot be empty"));
            }
            Ok(_) => {}
        }
    }
    diagnostics
}

/// Import a script into the graph
///
/// Lines with errors are skipped and reported in
/// [`ScriptImport::diagnostics`]. The graph is untouched when nothing can be
/// imported.
pub fn import_script(graph: &mut Graph, text: &str, layout: &ImportLayout) -> Result<ScriptImport, ScriptError> {
    if text.trim().is_empty() {
        return Err(ScriptError::Empty);
    }

    let diagnostics = lint(text);
    let mut blocks: Vec<Vec<Line<'_>>> = vec![Vec::new()];
    for raw in text.lines() {
        if raw.trim().is_empty() {
            if blocks.last().is_some_and(|block| !block.is_empty()) {
                blocks.push(Vec::new());
            }
            continue;
        }
        if let (Ok(line), Some(block)) = (parse_line(raw), blocks.last_mut()) {
            block.push(line);
        }
    }
    blocks.retain(|block| !block.is_empty());

    if blocks.is_empty() {
        return Err(ScriptError::NothingToImport(diagnostics));
    }

    let mut import = ScriptImport {
        blocks: blocks.len(),
        diagnostics,
        ..ScriptImport::default()
    };

    for (block_index, block) in blocks.iter().enumerate() {
        let mut previous: Option<NodeId> = None;
        for (index, line) in block.iter().enumerate() {
            let details = match line {
                Line::Dialogue { actor, text } => NodeDetails::titled(*actor).with_dialogue(*actor, *text),
                Line::Description(text) => NodeDetails::titled(NARRATION_TITLE).with_dialogue("", *text),
            };
            let node = graph.add_node(layout.position(block_index, index), details);

            if let Some(previous) = previous.replace(node.clone()) {
                let item = graph.add_item(&previous, ItemDetails::continuation(node.clone()))?;
                import.items.push(item);
            }
            import.nodes.push(node);
        }
    }

    tracing::info!(
        "Imported {} nodes in {} blocks from script",
        import.nodes.len(),
        import.blocks
    );
    Ok(import)
}
