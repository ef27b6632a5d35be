// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation classes authored on sprites.

use serde::{Deserialize, Serialize};

use crate::tween::{Easing, Tween, TweenProperty};

/// Fade-in length of `enter_fade`
pub const ENTER_FADE_MS: u32 = 200;
/// Length of each half of the `fx_surprised` hop
pub const SURPRISED_HOP_MS: u32 = 100;
/// Height of the `fx_surprised` hop, in stage pixels
pub const SURPRISED_HOP_PX: f32 = 20.0;

/// A recognized animation class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationCue {
    /// `enter_fade`: opacity 0 to 1
    EnterFade,
    /// `fx_surprised`: a quick hop up and back down
    Surprised,
}

impl AnimationCue {
    /// Class name as authored
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::EnterFade => "enter_fade",
            Self::Surprised => "fx_surprised",
        }
    }

    /// Tweens that play the cue
    pub fn tweens(&self) -> Vec<Tween> {
        match self {
            Self::EnterFade => vec![Tween::new(
                TweenProperty::Opacity,
                0.0,
                1.0,
                ENTER_FADE_MS,
                Easing::EaseOutQuad,
            )],
            Self::Surprised => vec![
                Tween::new(
                    TweenProperty::OffsetY,
                    0.0,
                    SURPRISED_HOP_PX,
                    SURPRISED_HOP_MS,
                    Easing::EaseOutQuad,
                ),
                Tween::new(
                    TweenProperty::OffsetY,
                    SURPRISED_HOP_PX,
                    0.0,
                    SURPRISED_HOP_MS,
                    Easing::EaseOutQuad,
                )
                .with_delay(SURPRISED_HOP_MS),
            ],
        }
    }
}

/// Parse a space separated class list; unknown classes are ignored
pub fn parse_animation_class(classes: &str) -> Vec<AnimationCue> {
    let mut cues = Vec::new();
    for class in classes.split_whitespace() {
        let cue = match class {
            "enter_fade" => AnimationCue::EnterFade,
            "fx_surprised" => AnimationCue::Surprised,
            _ => continue,
        };
        if !cues.contains(&cue) {
            cues.push(cue);
        }
    }
    cues
}
