// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sound bookkeeping across nodes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use storyloom_graph::{Sound, SpriteSfx};

/// Instruction for an audio backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SoundCue {
    /// Start playing a node sound
    Start(Sound),
    /// Stop the sound keyed by a continuity id
    Stop {
        /// Continuity id of the playing sound
        continuity_id: String,
    },
    /// Play a sprite sound effect
    Effect(SpriteSfx),
}

/// Tracks sounds that keep playing across nodes
#[derive(Debug, Clone, Default)]
pub struct SoundBoard {
    playing: IndexMap<String, Sound>,
}

impl SoundBoard {
    /// Nothing playing
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a continuity sound is playing
    pub fn is_playing(&self, continuity_id: &str) -> bool {
        self.playing.contains_key(continuity_id)
    }

    /// Continuity ids currently playing
    pub fn playing(&self) -> impl Iterator<Item = &str> {
        self.playing.keys().map(String::as_str)
    }

    /// Cues for the sounds of a node being entered
    pub fn enter(&mut self, sounds: &[Sound]) -> Vec<SoundCue> {
        let mut cues = Vec::new();
        for sound in sounds {
            match (&sound.continuity_id, sound.start_stop) {
                (None, true) => cues.push(SoundCue::Start(sound.clone())),
                (None, false) => {
                    tracing::debug!("Ignoring stop without a continuity id");
                }
                (Some(id), true) => {
                    if self.playing.contains_key(id) {
                        continue;
                    }
                    self.playing.insert(id.clone(), sound.clone());
                    cues.push(SoundCue::Start(sound.clone()));
                }
                (Some(id), false) => {
                    if self.playing.shift_remove(id).is_some() {
                        cues.push(SoundCue::Stop {
                            continuity_id: id.clone(),
                        });
                    }
                }
            }
        }
        cues
    }

    /// Stop everything in start order, returning the cues to do so
    pub fn stop_all(&mut self) -> Vec<SoundCue> {
        self.playing
            .drain(..)
            .map(|(continuity_id, _)| SoundCue::Stop { continuity_id })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(continuity: Option<&str>, start: bool) -> Sound {
        Sound {
            file: None,
            start_at: 0.0,
            start_stop: start,
            continuity_id: continuity.map(String::from),
            volume: 80,
        }
    }

    #[test]
    fn test_continuity_sound_starts_once() {
        let mut board = SoundBoard::new();
        assert_eq!(board.enter(&[sound(Some("rain"), true)]).len(), 1);
        assert!(board.enter(&[sound(Some("rain"), true)]).is_empty());
        assert!(board.is_playing("rain"));
    }

    #[test]
    fn test_stop_only_when_playing() {
        let mut board = SoundBoard::new();
        assert!(board.enter(&[sound(Some("rain"), false)]).is_empty());

        board.enter(&[sound(Some("rain"), true)]);
        let cues = board.enter(&[sound(Some("rain"), false)]);
        assert_eq!(
            cues,
            vec![SoundCue::Stop {
                continuity_id: "rain".into()
            }]
        );
        assert!(!board.is_playing("rain"));
    }

    #[test]
    fn test_one_shot_sounds() {
        let mut board = SoundBoard::new();
        assert_eq!(board.enter(&[sound(None, true)]).len(), 1);
        assert_eq!(board.enter(&[sound(None, true)]).len(), 1);
        assert!(board.enter(&[sound(None, false)]).is_empty());
        assert_eq!(board.playing().count(), 0);
    }

    #[test]
    fn test_stop_all() {
        let mut board = SoundBoard::new();
        board.enter(&[sound(Some("wind"), true), sound(Some("rain"), true)]);
        let cues = board.stop_all();
        assert_eq!(
            cues,
            vec![
                SoundCue::Stop {
                    continuity_id: "wind".into()
                },
                SoundCue::Stop {
                    continuity_id: "rain".into()
                },
            ]
        );
        assert_eq!(board.playing().count(), 0);
    }
}
