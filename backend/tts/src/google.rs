//! Google Cloud Text-to-Speech provider for falabot-tts.
//!
//! Implements speech synthesis via the `text:synthesize` REST endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use falabot_core::{FalaError, Result};

use crate::engine::{AudioEncoding, SpeechSynthesizer, VoiceConfig, VoiceGender};

pub const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com";

/// How requests are authenticated.
#[derive(Clone)]
pub enum GoogleAuth {
    /// API key sent as the `key` query parameter.
    ApiKey(String),
    /// OAuth2 access token sent as a bearer token.
    AccessToken(String),
}

impl std::fmt::Debug for GoogleAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::AccessToken(_) => f.write_str("AccessToken(***)"),
        }
    }
}

#[derive(Serialize)]
struct SynthesizeBody<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: VoiceGender,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: AudioEncoding,
    speaking_rate: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

/// Google Cloud TTS client with a fixed voice.
pub struct GoogleTts {
    client: Client,
    auth: GoogleAuth,
    base_url: String,
    voice: VoiceConfig,
}

impl GoogleTts {
    pub fn new(auth: GoogleAuth, voice: VoiceConfig) -> Self {
        Self {
            client: Client::new(),
            auth,
            base_url: DEFAULT_BASE_URL.to_string(),
            voice,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn voice(&self) -> &VoiceConfig {
        &self.voice
    }

    fn body<'a>(&'a self, text: &'a str) -> SynthesizeBody<'a> {
        SynthesizeBody {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.voice.language_code,
                ssml_gender: self.voice.gender,
                name: self.voice.name.as_deref(),
            },
            audio_config: AudioConfig {
                audio_encoding: self.voice.encoding,
                speaking_rate: self.voice.speaking_rate,
            },
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        if text.trim().is_empty() {
            return Err(FalaError::Service("refusing to synthesize empty text".into()));
        }

        let url = format!("{}/v1/text:synthesize", self.base_url);
        let mut request = self.client.post(&url).json(&self.body(text));
        request = match &self.auth {
            GoogleAuth::ApiKey(key) => request.query(&[("key", key)]),
            GoogleAuth::AccessToken(token) => request.bearer_auth(token),
        };

        info!(
            language = %self.voice.language_code,
            chars = text.chars().count(),
            "[TTS/Google] Synthesizing"
        );

        let resp = request
            .send()
            .await
            .map_err(|e| FalaError::Service(format!("Google TTS request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(FalaError::Service(format!("Google TTS error {status}: {body}")));
        }

        let parsed: SynthesizeResponse = resp
            .json()
            .await
            .map_err(|e| FalaError::Service(format!("malformed Google TTS response: {e}")))?;
        let audio = general_purpose::STANDARD
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| FalaError::Service(format!("undecodable audio content: {e}")))?;

        Ok(Bytes::from(audio))
    }
}
