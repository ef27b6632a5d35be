// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "storyloom")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Branching dialogue stories: import, check and play")]
#[command(long_about = r#"
Storyloom keeps a branching dialogue story in a single SQLite file, with a
RON settings file of the same name next to it.

EXAMPLES:
  storyloom new castle.db --name "Castle"
  storyloom import castle.db intro.txt
  storyloom variables set castle.db gold number 10
  storyloom validate castle.db --strict
  storyloom play castle.db --choices 1,2

ENVIRONMENT VARIABLES:
  RUST_LOG        Log filter (default: storyloom_app=info)
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new project
    New {
        /// Database file to create
        database: PathBuf,
        /// Story name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show a summary of a project
    Info {
        /// Database file
        database: PathBuf,
    },

    /// Import a dialogue script (`Speaker: line` or `- narration` per line)
    Import {
        /// Database file
        database: PathBuf,
        /// Script file, `-` reads standard input
        script: PathBuf,
    },

    /// Check a story for authoring problems
    Validate {
        /// Database file
        database: PathBuf,
        /// Exit with an error when problems are found
        #[arg(long)]
        strict: bool,
    },

    /// Play a story in the terminal
    Play {
        /// Database file
        database: PathBuf,
        /// Start node, by id or title
        #[arg(short, long)]
        start: Option<String>,
        /// Choices to make instead of reading standard input, 1-based
        #[arg(short, long, value_delimiter = ',')]
        choices: Vec<usize>,
        /// Delay per character, overrides the project setting
        #[arg(long)]
        typing_speed_ms: Option<u32>,
    },

    /// Manage global variables
    Variables {
        #[command(subcommand)]
        command: VariableCommands,
    },

    /// Manage trigger entities
    Entities {
        #[command(subcommand)]
        command: EntityCommands,
    },

    /// Copy the database to a new file
    Export {
        /// Database file
        database: PathBuf,
        /// File to write; must not exist
        target: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum VariableCommands {
    /// List variables with their defaults
    List {
        /// Database file
        database: PathBuf,
    },
    /// Define or redefine a variable
    Set {
        /// Database file
        database: PathBuf,
        /// Variable name
        key: String,
        /// string, number, boolean or array
        var_type: String,
        /// Default value as text; arrays are comma separated
        #[arg(default_value = "")]
        default: String,
    },
    /// Remove a variable
    Remove {
        /// Database file
        database: PathBuf,
        /// Variable name
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum EntityCommands {
    /// List entities
    List {
        /// Database file
        database: PathBuf,
    },
    /// Add an entity
    Add {
        /// Database file
        database: PathBuf,
        /// Display title
        title: String,
        /// Thumbnail image file
        #[arg(long)]
        thumbnail: Option<PathBuf>,
    },
    /// Remove an entity and clear node triggers pointing at it
    Remove {
        /// Database file
        database: PathBuf,
        /// Entity id
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_play() {
        let cli = Cli::parse_from(["storyloom", "play", "castle.db", "--choices", "1,2", "-s", "Gate"]);
        match cli.command {
            Commands::Play { choices, start, .. } => {
                assert_eq!(choices, vec![1, 2]);
                assert_eq!(start.as_deref(), Some("Gate"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
