// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stage state and continuity transitions between scenes.
//!
//! Sprites sharing a continuity id across consecutive nodes are the same
//! sprite: they move to their new placement instead of being recreated.
//! Everything else leaves the stage when the next node plays.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use storyloom_graph::{Asset, Scene, Sprite, SpriteSfx};

use crate::animation::{parse_animation_class, AnimationCue};
use crate::tween::{Easing, Tween, TweenProperty, CONTINUITY_TWEEN_MS, CROSSFADE_MS};

/// Stage width in pixels
pub const STAGE_WIDTH: f32 = 1280.0;
/// Stage height in pixels
pub const STAGE_HEIGHT: f32 = 720.0;

/// What happens to the background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackgroundChange {
    /// Same background as before
    Keep,
    /// Swap to a new background, or clear it
    Replace(Option<Asset>),
}

/// A sprite appearing on stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteEnter {
    /// Placement
    pub sprite: Sprite,
    /// Animation classes to play
    pub cues: Vec<AnimationCue>,
    /// Tweens of those cues
    pub tweens: Vec<Tween>,
    /// Sound effects that start automatically
    pub effects: Vec<SpriteSfx>,
}

/// A continuity sprite changing placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteMove {
    /// Shared continuity id
    pub continuity_id: String,
    /// Placement in the previous node
    pub from: Sprite,
    /// Placement in the new node
    pub to: Sprite,
    /// Position and size tweens
    pub tweens: Vec<Tween>,
    /// Texture cross-fade length when the image changed
    pub crossfade_ms: Option<u32>,
    /// Animation classes to play; `enter_fade` is dropped for a sprite
    /// already on stage
    pub cues: Vec<AnimationCue>,
}

/// Everything a renderer has to do when a node plays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransition {
    /// Background change
    pub background: BackgroundChange,
    /// Sprites removed
    pub exits: Vec<Sprite>,
    /// Continuity sprites that stay and move
    pub moves: Vec<SpriteMove>,
    /// Sprites added
    pub enters: Vec<SpriteEnter>,
}

impl StageTransition {
    /// Whether nothing changes
    pub fn is_empty(&self) -> bool {
        self.background == BackgroundChange::Keep
            && self.exits.is_empty()
            && self.moves.iter().all(|m| m.tweens.is_empty() && m.crossfade_ms.is_none() && m.cues.is_empty())
            && self.enters.is_empty()
    }
}

/// What is currently shown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stage {
    background: Option<Asset>,
    sprites: Vec<Sprite>,
}

impl Stage {
    /// An empty stage
    pub fn new() -> Self {
        Self::default()
    }

    /// Current background
    pub fn background(&self) -> Option<&Asset> {
        self.background.as_ref()
    }

    /// Sprites in authoring order
    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    /// Sprites back to front
    pub fn draw_order(&self) -> Vec<&Sprite> {
        let mut sprites: Vec<&Sprite> = self.sprites.iter().collect();
        sprites.sort_by_key(|sprite| sprite.z_index);
        sprites
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.background = None;
        self.sprites.clear();
    }

    /// Show a new scene, describing how to get there from the current one
    pub fn transition(&mut self, scene: &Scene) -> StageTransition {
        let background = if scene.background == self.background {
            BackgroundChange::Keep
        } else {
            self.background = scene.background.clone();
            BackgroundChange::Replace(scene.background.clone())
        };

        let incoming: HashSet<&str> = scene
            .sprites
            .iter()
            .filter_map(|sprite| sprite.continuity_id.as_deref())
            .collect();

        let mut exits = Vec::new();
        let mut retained: HashMap<String, Sprite> = HashMap::new();
        for sprite in self.sprites.drain(..) {
            match &sprite.continuity_id {
                Some(id) if incoming.contains(id.as_str()) && !retained.contains_key(id) => {
                    retained.insert(id.clone(), sprite);
                }
                _ => exits.push(sprite),
            }
        }

        let mut moves = Vec::new();
        let mut enters = Vec::new();
        for sprite in &scene.sprites {
            let previous = sprite
                .continuity_id
                .as_ref()
                .and_then(|id| retained.remove(id).map(|from| (id.clone(), from)));
            match previous {
                Some((continuity_id, from)) => moves.push(continuity_move(continuity_id, from, sprite.clone())),
                None => enters.push(enter(sprite.clone())),
            }
        }

        self.sprites = scene.sprites.clone();

        StageTransition {
            background,
            exits,
            moves,
            enters,
        }
    }
}

fn enter(sprite: Sprite) -> SpriteEnter {
    let cues = parse_animation_class(&sprite.animation_class);
    let tweens = cues.iter().flat_map(AnimationCue::tweens).collect();
    let effects = sprite.sfx.iter().filter(|sfx| sfx.auto).cloned().collect();
    SpriteEnter {
        sprite,
        cues,
        tweens,
        effects,
    }
}

fn continuity_move(continuity_id: String, from: Sprite, to: Sprite) -> SpriteMove {
    let tweens = [
        (TweenProperty::X, from.x, to.x),
        (TweenProperty::Y, from.y, to.y),
        (TweenProperty::Width, from.width, to.width),
        (TweenProperty::Height, from.height, to.height),
    ]
    .into_iter()
    .filter(|(_, a, b)| a != b)
    .map(|(property, a, b)| Tween::new(property, a, b, CONTINUITY_TWEEN_MS, Easing::EaseOutQuad))
    .collect();

    let crossfade_ms = (from.image != to.image).then_some(CROSSFADE_MS);
    let cues = parse_animation_class(&to.animation_class)
        .into_iter()
        .filter(|cue| *cue != AnimationCue::EnterFade)
        .collect();

    SpriteMove {
        continuity_id,
        from,
        to,
        tweens,
        crossfade_ms,
        cues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(x: f32, continuity: &str) -> Sprite {
        Sprite::new(Some(Asset::from_bytes("image/png", b"amy")), x, 100.0, 200.0, 400.0).with_continuity(continuity)
    }

    fn scene(sprites: Vec<Sprite>) -> Scene {
        Scene {
            background: Some(Asset::from_bytes("image/png", b"park")),
            sprites,
        }
    }

    #[test]
    fn test_first_scene_enters_everything() {
        let mut stage = Stage::new();
        let transition = stage.transition(&scene(vec![sprite(0.0, "amy"), sprite(500.0, "")]));

        assert!(matches!(transition.background, BackgroundChange::Replace(Some(_))));
        assert_eq!(transition.enters.len(), 2);
        assert!(transition.moves.is_empty());
        assert!(transition.exits.is_empty());
    }

    #[test]
    fn test_continuity_sprite_moves() {
        let mut stage = Stage::new();
        stage.transition(&scene(vec![sprite(0.0, "amy"), sprite(500.0, "")]));

        let mut moved = sprite(300.0, "amy");
        moved.image = Some(Asset::from_bytes("image/png", b"amy-smiling"));
        moved.animation_class = "enter_fade fx_surprised".into();
        let transition = stage.transition(&scene(vec![moved, sprite(900.0, "bob")]));

        assert_eq!(transition.background, BackgroundChange::Keep);
        assert_eq!(transition.exits.len(), 1);
        assert_eq!(transition.exits[0].continuity_id, None);

        assert_eq!(transition.moves.len(), 1);
        let amy = &transition.moves[0];
        assert_eq!(amy.continuity_id, "amy");
        assert_eq!(amy.tweens.len(), 1);
        assert_eq!(amy.tweens[0].property, TweenProperty::X);
        assert_eq!(amy.tweens[0].duration_ms, CONTINUITY_TWEEN_MS);
        assert_eq!(amy.crossfade_ms, Some(CROSSFADE_MS));
        assert_eq!(amy.cues, vec![AnimationCue::Surprised]);

        assert_eq!(transition.enters.len(), 1);
        assert_eq!(transition.enters[0].sprite.continuity_id.as_deref(), Some("bob"));
    }

    #[test]
    fn test_missing_continuity_exits() {
        let mut stage = Stage::new();
        stage.transition(&scene(vec![sprite(0.0, "amy")]));
        let transition = stage.transition(&Scene::default());

        assert_eq!(transition.background, BackgroundChange::Replace(None));
        assert_eq!(transition.exits.len(), 1);
        assert!(stage.sprites().is_empty());
        assert!(stage.background().is_none());
    }

    #[test]
    fn test_unchanged_scene_is_empty_transition() {
        let mut stage = Stage::new();
        let shown = scene(vec![sprite(0.0, "amy")]);
        stage.transition(&shown);
        assert!(stage.transition(&shown).is_empty());
    }

    #[test]
    fn test_entering_sprite_cues_and_effects() {
        let mut stage = Stage::new();
        let mut entering = sprite(0.0, "");
        entering.animation_class = "enter_fade".into();
        entering.sfx = vec![
            SpriteSfx {
                file_name: "step.ogg".into(),
                file: None,
                looped: false,
                auto: true,
                volume: 100,
            },
            SpriteSfx {
                file_name: "manual.ogg".into(),
                file: None,
                looped: false,
                auto: false,
                volume: 100,
            },
        ];
        let transition = stage.transition(&scene(vec![entering]));

        let enter = &transition.enters[0];
        assert_eq!(enter.cues, vec![AnimationCue::EnterFade]);
        assert_eq!(enter.tweens.len(), 1);
        assert_eq!(enter.effects.len(), 1);
        assert_eq!(enter.effects[0].file_name, "step.ogg");
    }

    #[test]
    fn test_draw_order() {
        let mut stage = Stage::new();
        let mut front = sprite(0.0, "front");
        front.z_index = 5;
        let back = sprite(0.0, "back");
        stage.transition(&scene(vec![front, back]));

        let order: Vec<_> = stage.draw_order().iter().map(|s| s.z_index).collect();
        assert_eq!(order, vec![0, 5]);
    }
}
