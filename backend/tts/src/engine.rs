//! Speech synthesizer trait and the fixed voice configuration.
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use falabot_core::{FalaError, Result};

// ---------------------------------------------------------------------------
// Voice configuration
// ---------------------------------------------------------------------------

/// SSML voice gender requested from the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoiceGender {
    #[serde(rename = "SSML_VOICE_GENDER_UNSPECIFIED")]
    Unspecified,
    Male,
    Female,
    #[default]
    Neutral,
}

impl FromStr for VoiceGender {
    type Err = FalaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "unspecified" | "ssml_voice_gender_unspecified" => Ok(Self::Unspecified),
            other => Err(FalaError::Config(format!("unknown voice gender: {other}"))),
        }
    }
}

/// Audio container returned by the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioEncoding {
    #[default]
    #[serde(rename = "MP3")]
    Mp3,
    #[serde(rename = "OGG_OPUS")]
    OggOpus,
    #[serde(rename = "LINEAR16")]
    Linear16,
}

impl AudioEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::OggOpus => "audio/ogg",
            Self::Linear16 => "audio/wav",
        }
    }
}

/// Voice parameters fixed at construction time; every request uses them.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub language_code: String,
    pub gender: VoiceGender,
    /// Specific voice name, e.g. `pt-BR-Standard-A`.
    pub name: Option<String>,
    pub speaking_rate: f32,
    pub encoding: AudioEncoding,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_code: "pt-BR".to_string(),
            gender: VoiceGender::Neutral,
            name: None,
            speaking_rate: 1.0,
            encoding: AudioEncoding::Mp3,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Returns compressed audio bytes for one line of text.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}
