// SPDX-License-Identifier: MIT OR Apache-2.0
//! Renderer-neutral tweens.
//!
//! The player never animates anything itself. It describes what should move
//! from where to where and for how long; a renderer samples
//! [`Tween::value_at`] each frame.

use serde::{Deserialize, Serialize};

/// Duration of a continuity move
pub const CONTINUITY_TWEEN_MS: u32 = 500;
/// Duration of a texture cross-fade on a continuity sprite
pub const CROSSFADE_MS: u32 = 100;

/// Easing curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    /// Constant speed
    #[default]
    Linear,
    /// Decelerating quadratic
    EaseOutQuad,
}

impl Easing {
    /// Map linear progress in `[0, 1]` onto the curve
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseOutQuad => t * (2.0 - t),
        }
    }
}

/// Linear interpolation between two floats
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Sprite property a tween drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TweenProperty {
    /// Left edge
    X,
    /// Top edge
    Y,
    /// Width
    Width,
    /// Height
    Height,
    /// Opacity, 0 to 1
    Opacity,
    /// Vertical offset from the resting position
    OffsetY,
}

/// Animation of one property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    /// Driven property
    pub property: TweenProperty,
    /// Start value
    pub from: f32,
    /// End value
    pub to: f32,
    /// Wait before starting, in milliseconds
    pub delay_ms: u32,
    /// Length, in milliseconds
    pub duration_ms: u32,
    /// Curve
    pub easing: Easing,
}

impl Tween {
    /// Create a tween starting immediately
    pub fn new(property: TweenProperty, from: f32, to: f32, duration_ms: u32, easing: Easing) -> Self {
        Self {
            property,
            from,
            to,
            delay_ms: 0,
            duration_ms,
            easing,
        }
    }

    /// Start after a delay
    pub fn with_delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Value after `elapsed_ms` since the tween was issued
    pub fn value_at(&self, elapsed_ms: f32) -> f32 {
        let local = elapsed_ms - self.delay_ms as f32;
        if local <= 0.0 {
            return self.from;
        }
        if self.duration_ms == 0 {
            return self.to;
        }
        let t = local / self.duration_ms as f32;
        lerp(self.from, self.to, self.easing.apply(t))
    }

    /// Milliseconds until the tween settles
    pub fn end_ms(&self) -> u32 {
        self.delay_ms + self.duration_ms
    }

    /// Whether the tween has settled at `elapsed_ms`
    pub fn is_finished(&self, elapsed_ms: f32) -> bool {
        elapsed_ms >= self.end_ms() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ease_out_quad() {
        assert_eq!(Easing::EaseOutQuad.apply(0.0), 0.0);
        assert_eq!(Easing::EaseOutQuad.apply(0.5), 0.75);
        assert_eq!(Easing::EaseOutQuad.apply(1.0), 1.0);
        assert_eq!(Easing::EaseOutQuad.apply(2.0), 1.0);
    }

    #[test]
    fn test_tween_sampling() {
        let tween = Tween::new(TweenProperty::X, 100.0, 200.0, 500, Easing::EaseOutQuad);
        assert_eq!(tween.value_at(0.0), 100.0);
        assert_eq!(tween.value_at(250.0), 175.0);
        assert_eq!(tween.value_at(900.0), 200.0);
        assert!(tween.is_finished(500.0));
        assert!(!tween.is_finished(499.0));
    }

    #[test]
    fn test_delayed_tween() {
        let tween = Tween::new(TweenProperty::OffsetY, 20.0, 0.0, 100, Easing::Linear).with_delay(100);
        assert_eq!(tween.value_at(50.0), 20.0);
        assert_eq!(tween.value_at(150.0), 10.0);
        assert_eq!(tween.end_ms(), 200);
    }

    #[test]
    fn test_zero_duration_jumps() {
        let tween = Tween::new(TweenProperty::Opacity, 0.0, 1.0, 0, Easing::Linear);
        assert_eq!(tween.value_at(1.0), 1.0);
    }
}
