// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene composition attached to nodes: background, sprites and sounds.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Binary asset stored as a `data:` URL
///
/// Two assets are the same file exactly when their strings are equal;
/// persistence deduplicates on that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    /// Encode raw bytes as a base64 data URL
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
    }

    /// The stored string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type of a data URL
    pub fn mime(&self) -> Option<&str> {
        let header = self.0.strip_prefix("data:")?.split_once(',')?.0;
        Some(header.split(';').next().unwrap_or(header))
    }

    /// Decode the payload of a base64 data URL
    pub fn decode(&self) -> Result<Vec<u8>, AssetError> {
        let (header, payload) = self
            .0
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or(AssetError::NotADataUrl)?;
        if !header.ends_with(";base64") {
            return Err(AssetError::NotBase64);
        }
        Ok(STANDARD.decode(payload)?)
    }
}

/// Error decoding an asset
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Missing `data:` prefix or comma
    #[error("Asset is not a data URL")]
    NotADataUrl,

    /// Data URL without `;base64`
    #[error("Asset payload is not base64 encoded")]
    NotBase64,

    /// Invalid base64
    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Sound effect attached to a sprite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSfx {
    /// Original file name
    pub file_name: String,
    /// Audio data
    pub file: Option<Asset>,
    /// Loop playback
    pub looped: bool,
    /// Start automatically when the sprite appears
    pub auto: bool,
    /// Volume, 0 to 100
    pub volume: u8,
}

/// A sprite placement in a node's scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprite {
    /// Image data
    pub image: Option<Asset>,
    /// Left edge on the 1280x720 stage
    pub x: f32,
    /// Top edge on the stage
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
    /// Stacking order
    pub z_index: i32,
    /// Mirror horizontally
    pub flip: bool,
    /// Drawn at full brightness when focused, dimmed otherwise
    pub focus: bool,
    /// Space separated animation classes
    pub animation_class: String,
    /// Identity carried across nodes during playback
    pub continuity_id: Option<String>,
    /// Attached sound effects
    pub sfx: Vec<SpriteSfx>,
}

impl Sprite {
    /// Create a focused sprite
    pub fn new(image: Option<Asset>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            image,
            x,
            y,
            width,
            height,
            z_index: 0,
            flip: false,
            focus: true,
            animation_class: String::new(),
            continuity_id: None,
            sfx: Vec::new(),
        }
    }

    /// Set the continuity identifier
    pub fn with_continuity(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.continuity_id = (!id.is_empty()).then_some(id);
        self
    }
}

/// A sound started or stopped when a node plays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sound {
    /// Audio data
    pub file: Option<Asset>,
    /// Offset into the clip, in seconds
    pub start_at: f32,
    /// `true` starts the sound, `false` stops the sound with the same continuity id
    pub start_stop: bool,
    /// Identity carried across nodes during playback
    pub continuity_id: Option<String>,
    /// Volume, 0 to 100
    pub volume: u8,
}

/// Background and sprites shown while a node plays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Background image
    pub background: Option<Asset>,
    /// Sprites in authoring order
    pub sprites: Vec<Sprite>,
}
