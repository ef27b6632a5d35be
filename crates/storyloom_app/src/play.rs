// SPDX-License-Identifier: MIT OR Apache-2.0
//! Terminal playback.

use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use storyloom_graph::{NodeId, Story};
use storyloom_player::{Beat, FlowPlayer, PlayerOptions, PlayerState, SoundCue};

/// How a terminal session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySummary {
    /// Nodes entered
    pub visited: usize,
    /// Whether the flow reached an end rather than running out of input
    pub finished: bool,
}

/// Node to start at
///
/// `requested` matches a node id first, then a title. Without a request the
/// first node nothing leads to is used, falling back to the first node.
pub fn find_start(story: &Story, requested: Option<&str>) -> Option<NodeId> {
    let graph = &story.graph;
    if let Some(requested) = requested {
        let by_id = NodeId::from(requested);
        if graph.contains_node(&by_id) {
            return Some(by_id);
        }
        return graph.nodes().find(|node| node.title == requested).map(|node| node.id.clone());
    }

    graph
        .node_ids()
        .find(|id| graph.connections_to(id).next().is_none())
        .or_else(|| graph.node_ids().next())
        .cloned()
}

/// Play a story in the terminal
///
/// Choices are read one per line from `input` as 1-based numbers. End of
/// input stops playback.
pub fn run<R: BufRead, W: Write>(
    story: &Story,
    start: &NodeId,
    options: PlayerOptions,
    typing_speed_ms: u32,
    mut input: R,
    out: &mut W,
) -> Result<PlaySummary> {
    let mut player = FlowPlayer::with_options(story, options);
    let first = player.start(start)?;
    show(&first, typing_speed_ms, out)?;

    loop {
        match player.state() {
            PlayerState::Showing => {
                for beat in player.run_to_choice()? {
                    show(&beat, typing_speed_ms, out)?;
                }
            }
            PlayerState::AwaitingChoice => {
                for (i, choice) in player.choices().iter().enumerate() {
                    writeln!(out, "  {}) {}", i + 1, choice.title)?;
                }
                write!(out, "> ")?;
                out.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line).context("Failed to read choice")? == 0 {
                    writeln!(out)?;
                    for cue in player.stop() {
                        log_sound(&cue);
                    }
                    return Ok(PlaySummary {
                        visited: player.history().len(),
                        finished: false,
                    });
                }

                let available = player.choices().len();
                let Some(index) = line.trim().parse::<usize>().ok().filter(|n| (1..=available).contains(n)) else {
                    writeln!(out, "Enter a number from 1 to {available}")?;
                    continue;
                };
                if let Some(beat) = player.choose(index - 1)? {
                    show(&beat, typing_speed_ms, out)?;
                }
            }
            PlayerState::Finished | PlayerState::Idle => break,
        }
    }

    writeln!(out, "[The End]")?;
    Ok(PlaySummary {
        visited: player.history().len(),
        finished: true,
    })
}

fn show<W: Write>(beat: &Beat, typing_speed_ms: u32, out: &mut W) -> Result<()> {
    tracing::debug!(
        "{}: {} entering, {} moving, {} leaving",
        beat.node,
        beat.stage.enters.len(),
        beat.stage.moves.len(),
        beat.stage.exits.len()
    );
    for cue in &beat.sounds {
        log_sound(cue);
    }

    if !beat.dialogue.is_empty() {
        write_dialogue(beat, typing_speed_ms, out)?;
    }
    for warning in &beat.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    Ok(())
}

fn write_dialogue<W: Write>(beat: &Beat, typing_speed_ms: u32, out: &mut W) -> Result<()> {
    if !beat.speaker.is_empty() {
        write!(out, "[{}] ", beat.speaker)?;
    }
    if typing_speed_ms == 0 {
        writeln!(out, "{}", beat.dialogue)?;
        return Ok(());
    }

    let delay = Duration::from_millis(u64::from(typing_speed_ms));
    for ch in beat.dialogue.chars() {
        write!(out, "{ch}")?;
        out.flush()?;
        std::thread::sleep(delay);
    }
    writeln!(out)?;
    Ok(())
}

fn log_sound(cue: &SoundCue) {
    match cue {
        SoundCue::Start(sound) => tracing::debug!(
            "Sound start {}",
            sound.continuity_id.as_deref().unwrap_or("(one-shot)")
        ),
        SoundCue::Stop { continuity_id } => tracing::debug!("Sound stop {}", continuity_id),
        SoundCue::Effect(sfx) => tracing::debug!("Sound effect {}", sfx.file_name),
    }
}
