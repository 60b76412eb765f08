pub mod engine;
pub mod google;

pub use engine::{AudioEncoding, SpeechSynthesizer, VoiceConfig, VoiceGender};
pub use google::{GoogleAuth, GoogleTts, DEFAULT_BASE_URL};
