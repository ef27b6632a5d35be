// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storyloom - branching dialogue story tool
//!
//! Command line front end over the story crates:
//! - Project creation and settings
//! - Dialogue script import with lint diagnostics
//! - Authoring validation
//! - Variable and entity management
//! - Terminal playback

mod cli;
mod play;
mod project;

use std::io::{BufRead, Cursor, Read};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use storyloom_graph::{import_script, validate, Asset, Entity, EntityId, Severity, VariableType};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, EntityCommands, VariableCommands};
use project::ProjectManager;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storyloom_app=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting Storyloom v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(Cli::parse()) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::New { database, name } => {
            let name = name.unwrap_or_else(|| {
                database
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "Untitled Story".to_string())
            });
            ProjectManager::create(&database, &name)
                .with_context(|| format!("Failed to create {}", database.display()))?;
            println!("Created {} at {}", name, database.display());
        }
        Commands::Info { database } => info(&database)?,
        Commands::Import { database, script } => import(&database, &script)?,
        Commands::Validate { database, strict } => {
            let project = open(&database)?;
            let issues = validate(project.story());
            for issue in &issues {
                println!("{issue}");
            }
            if issues.is_empty() {
                println!("No problems found");
            } else if strict {
                bail!("{} problem(s) found", issues.len());
            }
        }
        Commands::Play {
            database,
            start,
            choices,
            typing_speed_ms,
        } => {
            let project = open(&database)?;
            let story = project.story();
            let start = play::find_start(story, start.as_deref())
                .ok_or_else(|| anyhow!("No start node found in {}", database.display()))?;
            let typing_speed_ms = typing_speed_ms.unwrap_or(project.settings.player.typing_speed_ms);
            let options = project.settings.player_options();

            let input: Box<dyn BufRead> = if choices.is_empty() {
                Box::new(std::io::stdin().lock())
            } else {
                let lines: Vec<String> = choices.iter().map(ToString::to_string).collect();
                Box::new(Cursor::new(lines.join("\n")))
            };
            let summary = play::run(story, &start, options, typing_speed_ms, input, &mut std::io::stdout())?;
            if summary.finished {
                tracing::info!("Visited {} nodes", summary.visited);
            } else {
                tracing::info!("Stopped after {} nodes", summary.visited);
            }
        }
        Commands::Variables { command } => variables(command)?,
        Commands::Entities { command } => entities(command)?,
        Commands::Export { database, target } => {
            let project = open(&database)?;
            project.export(&target)?;
            println!("Exported to {}", target.display());
        }
    }
    Ok(())
}

fn open(database: &Path) -> Result<ProjectManager> {
    let project =
        ProjectManager::open(database).with_context(|| format!("Failed to open {}", database.display()))?;
    for warning in project.load_warnings() {
        eprintln!("warning: {warning}");
    }
    Ok(project)
}

fn info(database: &Path) -> Result<()> {
    let project = open(database)?;
    let story = project.story();
    let metadata = &project.settings.metadata;

    println!("{} ({})", metadata.name, project.database_path().display());
    if !metadata.description.is_empty() {
        println!("{}", metadata.description);
    }
    println!("  nodes:       {}", story.graph.node_count());
    println!("  items:       {}", story.graph.item_count());
    println!("  connections: {}", story.graph.connection_count());
    println!("  variables:   {}", story.variables.len());
    println!("  entities:    {}", story.entities.len());
    Ok(())
}

fn import(database: &Path, script: &Path) -> Result<()> {
    let text = if script == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text).context("Failed to read standard input")?;
        text
    } else {
        std::fs::read_to_string(script).with_context(|| format!("Failed to read {}", script.display()))?
    };

    let mut project = open(database)?;
    let layout = project.settings.import_layout();
    let imported = import_script(&mut project.story_mut().graph, &text, &layout)?;

    for diagnostic in &imported.diagnostics {
        let level = match diagnostic.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        eprintln!("{level}: line {}: {}", diagnostic.line + 1, diagnostic.message);
    }

    if project.has_unsaved_changes() {
        project.save()?;
    }
    println!(
        "Imported {} nodes in {} block(s) into {}",
        imported.nodes.len(),
        imported.blocks,
        project.project_name()
    );
    Ok(())
}

fn variables(command: VariableCommands) -> Result<()> {
    match command {
        VariableCommands::List { database } => {
            let project = open(&database)?;
            for variable in project.story().variables.iter() {
                println!("{} ({}) = {}", variable.key, variable.var_type, variable.default_value);
            }
        }
        VariableCommands::Set {
            database,
            key,
            var_type,
            default,
        } => {
            let var_type: VariableType = var_type.parse().map_err(|e: String| anyhow!(e))?;
            if !var_type.validate(&default) {
                bail!("`{default}` is not a valid {var_type}");
            }
            let mut project = open(&database)?;
            let variable = project.story_mut().variables.define(&key, var_type, &default).clone();
            project.save_variables()?;
            println!("{} ({}) = {}", variable.key, variable.var_type, variable.default_value);
        }
        VariableCommands::Remove { database, key } => {
            let mut project = open(&database)?;
            if project.story_mut().variables.remove(&key).is_none() {
                bail!("No variable named `{key}`");
            }
            project.save_variables()?;
            println!("Removed {key}");
        }
    }
    Ok(())
}

fn entities(command: EntityCommands) -> Result<()> {
    match command {
        EntityCommands::List { database } => {
            let project = open(&database)?;
            for entity in project.story().entities.iter() {
                let triggers = project.story().nodes_triggered_by(&entity.id).count();
                println!("{}  {}  ({} node(s))", entity.id, entity.title, triggers);
            }
        }
        EntityCommands::Add {
            database,
            title,
            thumbnail,
        } => {
            let mut entity = Entity::new(title);
            if let Some(path) = thumbnail {
                let bytes = std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
                entity = entity.with_thumbnail(Asset::from_bytes(image_mime(&path), &bytes));
            }
            let mut project = open(&database)?;
            println!("{}", entity.id);
            project.upsert_entity(entity)?;
        }
        EntityCommands::Remove { database, id } => {
            let mut project = open(&database)?;
            if !project.remove_entity(&EntityId::from(id.as_str()))? {
                bail!("No entity with id {id}");
            }
            println!("Removed {id}");
        }
    }
    Ok(())
}

fn image_mime(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
