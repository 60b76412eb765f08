use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use falabot_core::{FalaError, Result};

use crate::redact::redact_secret;

/// Credential for the speech service.
#[derive(Clone, PartialEq, Eq)]
pub enum TtsCredential {
    ApiKey(String),
    AccessToken(String),
}

impl std::fmt::Debug for TtsCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(k) => write!(f, "ApiKey({})", redact_secret(k)),
            Self::AccessToken(t) => write!(f, "AccessToken({})", redact_secret(t)),
        }
    }
}

/// falabot runtime configuration.
#[derive(Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Speech service credential
    pub tts_credential: TtsCredential,
    /// Speech service base URL
    pub tts_base_url: String,
    /// BCP-47 language code of the fixed voice
    pub language_code: String,
    /// SSML gender of the fixed voice
    pub voice_gender: String,
    pub voice_name: Option<String>,
    pub speaking_rate: f32,
    /// Chat command that makes the bot join the author's voice channel
    pub command: String,
    /// Persisted frame file
    pub frame_file: PathBuf,
    /// Diagnostic dump of the synthesized audio; `None` disables it
    pub audio_dump: Option<PathBuf>,
    pub ffmpeg: PathBuf,
    pub opus_bitrate: i32,
    pub synthesis_timeout: Duration,
    pub io_timeout: Duration,
    pub encode_timeout: Duration,
    /// Directory for rolling JSON logs; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Log level
    pub log_level: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &redact_secret(&self.discord_token))
            .field("tts_credential", &self.tts_credential)
            .field("tts_base_url", &self.tts_base_url)
            .field("language_code", &self.language_code)
            .field("voice_gender", &self.voice_gender)
            .field("voice_name", &self.voice_name)
            .field("speaking_rate", &self.speaking_rate)
            .field("command", &self.command)
            .field("frame_file", &self.frame_file)
            .field("audio_dump", &self.audio_dump)
            .field("ffmpeg", &self.ffmpeg)
            .field("opus_bitrate", &self.opus_bitrate)
            .field("synthesis_timeout", &self.synthesis_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("encode_timeout", &self.encode_timeout)
            .field("log_dir", &self.log_dir)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// The Discord token and a speech credential are required.
    pub fn from_env() -> Result<Self> {
        Self::from_map(&std::env::vars().collect())
    }

    /// Load configuration from an explicit variable map (useful for testing).
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let parsed = |name: &str, default: u64| -> Result<u64> {
            match get(name) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| FalaError::Config(format!("{name} must be an integer, got {raw:?}"))),
                None => Ok(default),
            }
        };

        let discord_token = get("DISCORD_TOKEN")
            .or_else(|| get("TOKEN"))
            .ok_or_else(|| FalaError::Config("DISCORD_TOKEN is not set".into()))?;

        let tts_credential = match (get("GOOGLE_TTS_API_KEY"), get("GOOGLE_TTS_ACCESS_TOKEN")) {
            (Some(key), _) => TtsCredential::ApiKey(key),
            (None, Some(token)) => TtsCredential::AccessToken(token),
            (None, None) => {
                return Err(FalaError::Config(
                    "set GOOGLE_TTS_API_KEY or GOOGLE_TTS_ACCESS_TOKEN".into(),
                ))
            }
        };

        let speaking_rate = match get("FALABOT_SPEAKING_RATE") {
            Some(raw) => raw.parse().map_err(|_| {
                FalaError::Config(format!("FALABOT_SPEAKING_RATE must be a number, got {raw:?}"))
            })?,
            None => 1.0,
        };

        let opus_bitrate = parsed("FALABOT_OPUS_BITRATE", 64_000)?;
        let opus_bitrate = i32::try_from(opus_bitrate)
            .map_err(|_| FalaError::Config("FALABOT_OPUS_BITRATE is out of range".into()))?;

        let audio_dump = match get("FALABOT_AUDIO_DUMP").as_deref() {
            Some("off") | Some("none") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from("output.mp3")),
        };

        Ok(Self {
            discord_token,
            tts_credential,
            tts_base_url: get("FALABOT_TTS_BASE_URL")
                .unwrap_or_else(|| "https://texttospeech.googleapis.com".to_string()),
            language_code: get("FALABOT_LANGUAGE").unwrap_or_else(|| "pt-BR".to_string()),
            voice_gender: get("FALABOT_VOICE_GENDER").unwrap_or_else(|| "NEUTRAL".to_string()),
            voice_name: get("FALABOT_VOICE_NAME"),
            speaking_rate,
            // Blank stays blank so validation can reject it.
            command: vars
                .get("FALABOT_COMMAND")
                .map(|c| c.trim().to_string())
                .unwrap_or_else(|| "!join".to_string()),
            frame_file: get("FALABOT_FRAME_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output.dca")),
            audio_dump,
            ffmpeg: get("FALABOT_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            opus_bitrate,
            synthesis_timeout: Duration::from_secs(parsed("FALABOT_SYNTH_TIMEOUT_SECS", 15)?),
            io_timeout: Duration::from_secs(parsed("FALABOT_IO_TIMEOUT_SECS", 10)?),
            encode_timeout: Duration::from_secs(parsed("FALABOT_ENCODE_TIMEOUT_SECS", 30)?),
            log_dir: get("FALABOT_LOG_DIR").map(PathBuf::from),
            log_level: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}
