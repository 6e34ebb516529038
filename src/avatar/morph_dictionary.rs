use rustc_hash::FxHashMap;

use crate::avatar::config::NameConvention;
use crate::errors::{AvatarError, Result};

/// Morph-target name → influence channel for one mesh.
///
/// Built once when the mesh is loaded and never mutated afterwards; the
/// synthesizer borrows it for every utterance instead of walking the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphDictionary {
    mesh: String,
    channels: FxHashMap<String, usize>,
}

impl MorphDictionary {
    /// Rejects duplicate names and channels shared by two names.
    pub fn new<I, S>(mesh: impl Into<String>, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mesh = mesh.into();
        let mut channels = FxHashMap::default();
        let mut owners: FxHashMap<usize, String> = FxHashMap::default();

        for (name, channel) in entries {
            let name = name.into();
            if let Some(previous) = owners.insert(channel, name.clone()) {
                return Err(AvatarError::InvalidMorphDictionary(format!(
                    "{mesh}: channel {channel} claimed by '{previous}' and '{name}'"
                )));
            }
            if channels.insert(name.clone(), channel).is_some() {
                return Err(AvatarError::InvalidMorphDictionary(format!(
                    "{mesh}: morph '{name}' listed twice"
                )));
            }
        }

        Ok(Self { mesh, channels })
    }

    /// Channels follow the order of `names`, as in glTF `extras.targetNames`.
    pub fn from_target_names<S: AsRef<str>>(mesh: impl Into<String>, names: &[S]) -> Result<Self> {
        Self::new(
            mesh,
            names
                .iter()
                .enumerate()
                .map(|(channel, name)| (name.as_ref().to_string(), channel)),
        )
    }

    #[must_use]
    pub fn mesh(&self) -> &str {
        &self.mesh
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Highest channel index plus one.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.values().max().map_or(0, |&c| c + 1)
    }

    #[must_use]
    pub fn channel(&self, name: &str) -> Option<usize> {
        self.channels.get(name).copied()
    }

    /// Looks up a backend name after applying `convention`, falling back to
    /// the name as delivered.
    #[must_use]
    pub fn resolve(&self, name: &str, convention: NameConvention) -> Option<usize> {
        self.channel(&convention.apply(name))
            .or_else(|| self.channel(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.channels.iter().map(|(n, &c)| (n.as_str(), c))
    }
}

/// The two morph dictionaries of a talking avatar.
#[derive(Debug, Clone)]
pub struct AvatarRig {
    pub body: MorphDictionary,
    pub teeth: MorphDictionary,
}

impl AvatarRig {
    #[must_use]
    pub fn new(body: MorphDictionary, teeth: MorphDictionary) -> Self {
        Self { body, teeth }
    }
}
