//! Background audio catalog.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Seconds of fade-out applied to the end of every fitted track.
pub const AUDIO_FADE_OUT_SECS: f64 = 4.0;

/// How a catalog entry may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioKind {
    /// A complete piece; only eligible when it fits inside the target.
    Track,
    /// A seamless loop; always eligible.
    Loop,
}

/// One entry of the audio catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioTrack {
    pub url: String,
    /// Native length in seconds
    pub length: f64,
    #[serde(rename = "type")]
    pub kind: AudioKind,
}

impl AudioTrack {
    pub fn new(url: impl Into<String>, length: f64, kind: AudioKind) -> Self {
        Self {
            url: url.into(),
            length,
            kind,
        }
    }

    /// Whether this entry may back a video of `target` seconds.
    pub fn is_eligible(&self, target: f64) -> bool {
        if self.length <= 0.0 {
            return false;
        }
        match self.kind {
            AudioKind::Loop => true,
            AudioKind::Track => self.length <= target,
        }
    }
}

/// The catalog document: `{"tracks": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioCatalog {
    #[serde(default)]
    pub tracks: Vec<AudioTrack>,
}

impl AudioCatalog {
    pub fn new(tracks: Vec<AudioTrack>) -> Self {
        Self { tracks }
    }

    /// Entries usable for a video of `target` seconds.
    pub fn eligible(&self, target: f64) -> Vec<&AudioTrack> {
        self.tracks.iter().filter(|t| t.is_eligible(target)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog() {
        let json = r#"{"tracks":[
            {"url":"https://a/1.mp3","length":30,"type":"track"},
            {"url":"https://a/2.mp3","length":8.5,"type":"loop"}
        ]}"#;
        let catalog: AudioCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.tracks.len(), 2);
        assert_eq!(catalog.tracks[1].kind, AudioKind::Loop);
    }

    #[test]
    fn test_eligibility() {
        let catalog = AudioCatalog::new(vec![
            AudioTrack {
                url: "long".into(),
                length: 60.0,
                kind: AudioKind::Track,
            },
            AudioTrack {
                url: "short".into(),
                length: 20.0,
                kind: AudioKind::Track,
            },
            AudioTrack {
                url: "loop".into(),
                length: 90.0,
                kind: AudioKind::Loop,
            },
        ]);

        let urls: Vec<&str> = catalog.eligible(25.0).iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, vec!["short", "loop"]);
        assert_eq!(catalog.eligible(5.0).len(), 1);
    }
}
