// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless playback of Storyloom stories.
//!
//! [`FlowPlayer`] walks a [`storyloom_graph::Story`] node by node. Each node
//! it enters yields a [`Beat`]: the dialogue to show, a [`StageTransition`]
//! describing sprite continuity, and the sound cues to play. Rendering and
//! audio are left to the caller.

pub mod animation;
pub mod player;
pub mod sound;
pub mod stage;
pub mod tween;

pub use animation::{parse_animation_class, AnimationCue};
pub use player::{Beat, FlowPlayer, PlayerError, PlayerOptions, PlayerState, DEFAULT_MAX_AUTO_STEPS};
pub use sound::{SoundBoard, SoundCue};
pub use stage::{BackgroundChange, SpriteEnter, SpriteMove, Stage, StageTransition, STAGE_HEIGHT, STAGE_WIDTH};
pub use tween::{Easing, Tween, TweenProperty};
