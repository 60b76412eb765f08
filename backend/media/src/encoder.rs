//! Frame encoder: compressed audio (MP3 from the speech service) → Opus
//! frame file bytes.
//!
//! Decoding is delegated to an `ffmpeg` child that emits 48 kHz stereo
//! s16le PCM; the PCM is cut into 20 ms frames and Opus-encoded in-process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use audiopus::coder::Encoder;
use audiopus::{Application, Bitrate, Channels, SampleRate};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use falabot_core::{FalaError, Result};

use crate::frame_store::{append_record, FrameStore};

/// Output sample rate expected by the voice transport.
pub const SAMPLE_RATE: u32 = 48_000;
/// Interleaved channel count.
pub const CHANNELS: usize = 2;
/// Samples per channel in one 20 ms frame.
pub const FRAME_SAMPLES: usize = 960;
/// Upper bound for one encoded Opus packet.
const MAX_PACKET: usize = 4_000;

/// Turns compressed audio into frame file bytes.
#[async_trait]
pub trait FrameEncoder: Send + Sync {
    /// Encode `audio` into a frame-formatted byte stream.
    async fn encode(&self, audio: &[u8]) -> Result<Vec<u8>>;

    /// Encode `audio` and persist the result through `store`.
    async fn encode_into(&self, audio: &[u8], store: &FrameStore) -> Result<u64> {
        let frames = self.encode(audio).await?;
        store.write(&mut frames.as_slice()).await
    }
}

/// Options for [`OpusFrameEncoder`].
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    /// Path or name of the ffmpeg binary.
    pub ffmpeg: PathBuf,
    /// Target Opus bitrate in bits per second.
    pub bitrate: i32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            bitrate: 64_000,
        }
    }
}

pub struct OpusFrameEncoder {
    options: EncoderOptions,
}

impl OpusFrameEncoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    /// Run ffmpeg over `audio` and collect the decoded PCM samples.
    async fn decode_pcm(&self, audio: &[u8]) -> Result<Vec<i16>> {
        let mut child = DecoderProcess::spawn(&self.options.ffmpeg)?;
        let mut stdin = child
            .0
            .stdin
            .take()
            .ok_or_else(|| FalaError::Encode("ffmpeg stdin unavailable".into()))?;

        let input = audio.to_vec();
        let feeder = tokio::spawn(async move {
            stdin.write_all(&input).await?;
            stdin.shutdown().await
        });

        let output = child.finish().await?;
        let fed = feeder.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or_default();
            return Err(FalaError::Encode(format!(
                "ffmpeg exited with {}: {tail}",
                output.status
            )));
        }
        match fed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(FalaError::Encode(format!("failed to feed ffmpeg: {e}"))),
            Err(e) => return Err(FalaError::Encode(format!("ffmpeg feeder task failed: {e}"))),
        }

        let samples = pcm_from_le_bytes(&output.stdout);
        if samples.is_empty() {
            return Err(FalaError::Encode("ffmpeg decoded no audio".into()));
        }
        debug!(samples = samples.len(), "Decoded PCM");
        Ok(samples)
    }
}

#[async_trait]
impl FrameEncoder for OpusFrameEncoder {
    async fn encode(&self, audio: &[u8]) -> Result<Vec<u8>> {
        if audio.is_empty() {
            return Err(FalaError::Encode("no input audio".into()));
        }
        let pcm = self.decode_pcm(audio).await?;
        let bitrate = self.options.bitrate;
        let encoded = tokio::task::spawn_blocking(move || encode_pcm(&pcm, bitrate))
            .await
            .map_err(|e| FalaError::Encode(format!("opus encode task failed: {e}")))??;
        info!(
            input_bytes = audio.len(),
            output_bytes = encoded.len(),
            "Encoded audio into Opus frames"
        );
        Ok(encoded)
    }
}

/// Owns the ffmpeg child for one decode. The child is killed if the decode is
/// abandoned (error or timeout) before it exits.
struct DecoderProcess(Child);

impl DecoderProcess {
    fn spawn(ffmpeg: &Path) -> Result<Self> {
        let child = Command::new(ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i", "pipe:0"])
            .args(["-f", "s16le", "-ar", &SAMPLE_RATE.to_string()])
            .args(["-ac", &CHANNELS.to_string(), "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                FalaError::Encode(format!("failed to spawn {}: {e}", ffmpeg.display()))
            })?;
        debug!(pid = ?child.id(), "ffmpeg decoder started");
        Ok(Self(child))
    }

    async fn finish(self) -> Result<std::process::Output> {
        self.0
            .wait_with_output()
            .await
            .map_err(|e| FalaError::Encode(format!("ffmpeg did not complete: {e}")))
    }
}

/// Interpret little-endian s16 bytes; a trailing odd byte is dropped.
pub fn pcm_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Opus-encode interleaved stereo PCM into frame file bytes. The last frame is
/// zero-padded to a full 20 ms.
pub fn encode_pcm(pcm: &[i16], bitrate: i32) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
        .map_err(|e| FalaError::Encode(format!("failed to create opus encoder: {e}")))?;
    if let Err(e) = encoder.set_bitrate(Bitrate::BitsPerSecond(bitrate)) {
        warn!(bitrate, error = %e, "Rejected opus bitrate; using encoder default");
    }

    let frame_len = FRAME_SAMPLES * CHANNELS;
    let mut packet = [0u8; MAX_PACKET];
    let mut out = Vec::new();
    let mut padded = Vec::with_capacity(frame_len);

    for chunk in pcm.chunks(frame_len) {
        let input = if chunk.len() == frame_len {
            chunk
        } else {
            padded.clear();
            padded.extend_from_slice(chunk);
            padded.resize(frame_len, 0);
            padded.as_slice()
        };
        let written = encoder
            .encode(input, &mut packet)
            .map_err(|e| FalaError::Encode(format!("opus encode failed: {e}")))?;
        append_record(&mut out, &packet[..written])?;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use falabot_core::FrameBuffer;

    #[test]
    fn pcm_bytes_are_little_endian() {
        assert_eq!(pcm_from_le_bytes(&[0x01, 0x00, 0xFF, 0xFF, 0x7F]), vec![1, -1]);
    }

    #[test]
    fn one_second_of_silence_is_fifty_frames() {
        let pcm = vec![0i16; SAMPLE_RATE as usize * CHANNELS];
        let encoded = encode_pcm(&pcm, 64_000).unwrap();

        let mut count = 0;
        let mut rest = encoded.as_slice();
        while rest.len() >= 2 {
            let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
            assert!(len > 0);
            rest = &rest[2 + len..];
            count += 1;
        }
        assert!(rest.is_empty());
        assert_eq!(count, 50);
    }

    #[test]
    fn partial_tail_is_padded_to_a_frame() {
        let pcm = vec![100i16; FRAME_SAMPLES * CHANNELS + 10];
        let encoded = encode_pcm(&pcm, 64_000).unwrap();
        let first = u16::from_le_bytes([encoded[0], encoded[1]]) as usize;
        let second_at = 2 + first;
        let second = u16::from_le_bytes([encoded[second_at], encoded[second_at + 1]]) as usize;
        assert_eq!(encoded.len(), 2 + first + 2 + second);
    }

    #[tokio::test]
    async fn encoded_pcm_loads_through_frame_store() {
        let pcm = vec![0i16; FRAME_SAMPLES * CHANNELS * 3];
        let encoded = encode_pcm(&pcm, 32_000).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path().join("output.dca"));
        store.write(&mut encoded.as_slice()).await.unwrap();

        let mut buffer = FrameBuffer::new();
        assert_eq!(store.read(&mut buffer).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_encode_error() {
        let encoder = OpusFrameEncoder::new(EncoderOptions {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg-falabot"),
            ..EncoderOptions::default()
        });
        let err = encoder.encode(b"ID3 not really mp3").await.unwrap_err();
        assert!(matches!(err, FalaError::Encode(_)));
    }

    #[tokio::test]
    async fn empty_input_is_encode_error() {
        let encoder = OpusFrameEncoder::new(EncoderOptions::default());
        let err = encoder.encode(&[]).await.unwrap_err();
        assert!(matches!(err, FalaError::Encode(_)));
    }
}
