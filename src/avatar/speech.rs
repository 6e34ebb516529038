use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::avatar::blend_frames::{BlendFrameSource, BlendFrames};
use crate::errors::Result;

/// Reply of the text-to-speech backend.
///
/// ```json
/// { "blendData": [{ "time": 0.0, "blendshapes": { "jawOpen": 0.1 } }], "filename": "/speech-42.mp3" }
/// ```
///
/// `blendData` is kept as raw JSON and validated separately, so a malformed
/// series does not prevent the audio from playing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechResponse {
    #[serde(rename = "blendData", default)]
    pub blend_data: Value,
    pub filename: String,
}

impl SpeechResponse {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Audio asset location: `filename` resolved against the backend `host`.
    #[must_use]
    pub fn audio_url(&self, host: &str) -> String {
        if self.filename.contains("://") {
            return self.filename.clone();
        }
        match (host.ends_with('/'), self.filename.starts_with('/')) {
            (true, true) => format!("{host}{}", &self.filename[1..]),
            (false, false) if !host.is_empty() => format!("{host}/{}", self.filename),
            _ => format!("{host}{}", self.filename),
        }
    }

    pub fn blend_frames(&self) -> Result<BlendFrames> {
        BlendFrameSource::parse(&self.blend_data)
    }
}
