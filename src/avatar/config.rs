//! Avatar Configuration
//!
//! [`AvatarConfig`] gathers the knobs that tie the pipeline to a particular
//! character rig: which sub-meshes receive speech tracks, which skeletal
//! channels survive idle filtering, and how backend morph names map onto the
//! rig's morph dictionaries.
//!
//! ```rust,ignore
//! use talking_avatar::avatar::AvatarConfig;
//!
//! let config = AvatarConfig::from_json(r#"{ "body_mesh": "Wolf3D_Head" }"#)?;
//! assert_eq!(config.teeth_mesh, "HG_TeethLower");
//! ```

use std::borrow::Cow;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{AvatarError, Result};

/// How backend blend-shape names are rewritten before dictionary lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameConvention {
    /// Names are looked up as delivered.
    Verbatim,
    /// ARKit-style `...Left` / `...Right` become `..._L` / `..._R`.
    ///
    /// `eyeLook*` shapes keep their ARKit names, since rigs expose them that way.
    #[default]
    SideSuffix,
}

impl NameConvention {
    #[must_use]
    pub fn apply(self, name: &str) -> Cow<'_, str> {
        match self {
            Self::Verbatim => Cow::Borrowed(name),
            Self::SideSuffix => {
                if name.starts_with("eyeLook") {
                    return Cow::Borrowed(name);
                }
                if let Some(stem) = name.strip_suffix("Left") {
                    Cow::Owned(format!("{stem}_L"))
                } else if let Some(stem) = name.strip_suffix("Right") {
                    Cow::Owned(format!("{stem}_R"))
                } else {
                    Cow::Borrowed(name)
                }
            }
        }
    }
}

/// Keeps skeletal tracks whose node name contains `contains` and retargets
/// them to `bone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleChannelRule {
    pub contains: String,
    pub bone: String,
}

impl IdleChannelRule {
    #[must_use]
    pub fn new(contains: impl Into<String>, bone: impl Into<String>) -> Self {
        Self {
            contains: contains.into(),
            bone: bone.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Head/body mesh receiving speech and blink tracks.
    pub body_mesh: String,
    /// Lower-teeth mesh receiving the second speech clip.
    pub teeth_mesh: String,
    /// Ordered allow-list; the first matching rule wins.
    pub idle_channels: Vec<IdleChannelRule>,
    /// Additive bias per backend morph name, applied before clamping to [0, 1].
    pub weight_offsets: FxHashMap<String, f32>,
    pub name_convention: NameConvention,
    pub blink_enabled: bool,
    /// Playback speed of speech clips relative to the audio clock.
    pub speech_time_scale: f32,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        let mut weight_offsets = FxHashMap::default();
        weight_offsets.insert("mouthShrugUpper".to_string(), 0.4);

        Self {
            body_mesh: "HG_Body".to_string(),
            teeth_mesh: "HG_TeethLower".to_string(),
            idle_channels: vec![
                IdleChannelRule::new("Head", "head"),
                IdleChannelRule::new("Neck", "neck"),
                IdleChannelRule::new("Spine2", "spine2"),
            ],
            weight_offsets,
            name_convention: NameConvention::default(),
            blink_enabled: true,
            speech_time_scale: 1.0,
        }
    }
}

impl AvatarConfig {
    /// Parses and validates a JSON document; absent fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_meshes(mut self, body: impl Into<String>, teeth: impl Into<String>) -> Self {
        self.body_mesh = body.into();
        self.teeth_mesh = teeth.into();
        self
    }

    #[must_use]
    pub fn with_name_convention(mut self, convention: NameConvention) -> Self {
        self.name_convention = convention;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.body_mesh.is_empty() || self.teeth_mesh.is_empty() {
            return Err(AvatarError::Config("mesh names must not be empty".into()));
        }
        if self.body_mesh == self.teeth_mesh {
            return Err(AvatarError::Config(format!(
                "body and teeth mesh are both '{}'",
                self.body_mesh
            )));
        }
        if !(self.speech_time_scale.is_finite() && self.speech_time_scale > 0.0) {
            return Err(AvatarError::Config(format!(
                "speech_time_scale must be positive, got {}",
                self.speech_time_scale
            )));
        }
        if let Some(rule) = self
            .idle_channels
            .iter()
            .find(|r| r.contains.is_empty() || r.bone.is_empty())
        {
            return Err(AvatarError::Config(format!(
                "idle channel rule {rule:?} has an empty field"
            )));
        }
        if let Some((name, _)) = self.weight_offsets.iter().find(|(_, v)| !v.is_finite()) {
            return Err(AvatarError::Config(format!(
                "weight offset for '{name}' is not finite"
            )));
        }
        Ok(())
    }
}
