use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use falabot_core::{
    FalaError, FrameBuffer, JoinRequest, PipelineMessage, Result, SpeakRequest, VoiceConnector,
    VoiceSink,
};
use falabot_media::{FrameEncoder, FrameStore};
use falabot_tts::SpeechSynthesizer;

use crate::playback::{PlaybackDriver, PlaybackReport};

/// Paths and deadlines for the per-request pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Frame file written by the encoder and reloaded before playback.
    pub frame_file: PathBuf,
    /// Diagnostic copy of the synthesized audio, overwritten per request.
    pub audio_dump: Option<PathBuf>,
    pub synthesis_timeout: Duration,
    pub encode_timeout: Duration,
    pub io_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            frame_file: PathBuf::from("output.dca"),
            audio_dump: Some(PathBuf::from("output.mp3")),
            synthesis_timeout: Duration::from_secs(15),
            encode_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(10),
        }
    }
}

/// Single owner of the frame buffer and the voice sink.
///
/// Every request is handled to completion before the next message is taken
/// off the queue, so synthesis, encoding, loading and playback never overlap.
pub struct Coordinator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    encoder: Arc<dyn FrameEncoder>,
    connector: Arc<dyn VoiceConnector>,
    store: FrameStore,
    playback: PlaybackDriver,
    settings: PipelineSettings,
    buffer: FrameBuffer,
    sink: Option<Box<dyn VoiceSink>>,
}

impl Coordinator {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        encoder: Arc<dyn FrameEncoder>,
        connector: Arc<dyn VoiceConnector>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            synthesizer,
            encoder,
            connector,
            store: FrameStore::new(settings.frame_file.clone()),
            playback: PlaybackDriver::new(),
            settings,
            buffer: FrameBuffer::new(),
            sink: None,
        }
    }

    pub fn with_playback(mut self, playback: PlaybackDriver) -> Self {
        self.playback = playback;
        self
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Guild and channel of the held sink, if any.
    pub fn sink_target(&self) -> Option<(u64, u64)> {
        self.sink.as_ref().map(|s| (s.guild_id(), s.channel_id()))
    }

    /// Drain the queue until `Shutdown` or until every producer is gone.
    ///
    /// Per-request failures are logged and skipped; only unrecoverable errors
    /// end the loop early.
    pub async fn run(mut self, mut rx: mpsc::Receiver<PipelineMessage>) -> Result<()> {
        info!("Pipeline coordinator started");

        let mut outcome = Ok(());
        while let Some(msg) = rx.recv().await {
            debug!(msg_type = msg.label(), "Coordinator received message");
            let result = match msg {
                PipelineMessage::Speak(request) => self.handle_speak(&request).await.map(|_| ()),
                PipelineMessage::Join(request) => self.handle_join(request).await,
                PipelineMessage::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            };
            if let Err(e) = result {
                if e.is_recoverable() {
                    warn!(error = %e, kind = e.kind(), "Request failed; continuing");
                } else {
                    error!(error = %e, kind = e.kind(), "Unrecoverable pipeline failure");
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.release_sink().await;
        info!("Pipeline coordinator stopped");
        outcome
    }

    /// Synthesize → encode → persist → reload → play one line of text.
    pub async fn handle_speak(&mut self, request: &SpeakRequest) -> Result<PlaybackReport> {
        info!(request_id = %request.id, chars = request.text.chars().count(), "Speak request");

        let audio = timeout(
            self.settings.synthesis_timeout,
            self.synthesizer.synthesize(&request.text),
        )
        .await
        .map_err(|_| {
            FalaError::Service(format!(
                "synthesis timed out after {:?}",
                self.settings.synthesis_timeout
            ))
        })??;

        self.dump_audio(&audio).await;

        let frames = timeout(self.settings.encode_timeout, self.encoder.encode(&audio))
            .await
            .map_err(|_| {
                FalaError::Encode(format!(
                    "encoding timed out after {:?}",
                    self.settings.encode_timeout
                ))
            })??;

        timeout(self.settings.io_timeout, self.store.write(&mut frames.as_slice()))
            .await
            .map_err(|_| io_timeout("writing", &self.store))??;

        self.buffer.clear();
        timeout(self.settings.io_timeout, self.store.read(&mut self.buffer))
            .await
            .map_err(|_| io_timeout("reading", &self.store))??;

        let report = self
            .playback
            .play(self.sink.as_deref_mut(), &self.buffer)
            .await?;

        let elapsed_ms = (chrono::Utc::now() - request.received_at).num_milliseconds();
        info!(
            request_id = %request.id,
            frames = self.buffer.len(),
            sent = report.frames_sent,
            played = report.played,
            elapsed_ms,
            "Speak request finished"
        );
        Ok(report)
    }

    /// Move the voice sink to the requested channel, releasing the old one
    /// first.
    pub async fn handle_join(&mut self, request: JoinRequest) -> Result<()> {
        if self.sink_target() == Some((request.guild_id, request.channel_id)) {
            info!(
                guild_id = request.guild_id,
                channel_id = request.channel_id,
                "Already connected to requested voice channel"
            );
            return Ok(());
        }

        self.release_sink().await;

        let sink = self
            .connector
            .connect(request.guild_id, request.channel_id)
            .await?;
        info!(
            guild_id = request.guild_id,
            channel_id = request.channel_id,
            requested_by = request.requested_by,
            "Voice sink established"
        );
        self.sink = Some(sink);
        Ok(())
    }

    async fn release_sink(&mut self) {
        let Some(sink) = self.sink.take() else {
            return;
        };
        let (guild_id, channel_id) = (sink.guild_id(), sink.channel_id());
        match sink.release().await {
            Ok(()) => info!(guild_id, channel_id, "Voice sink released"),
            Err(e) => warn!(guild_id, channel_id, error = %e, "Failed to release voice sink"),
        }
    }

    async fn dump_audio(&self, audio: &Bytes) {
        let Some(path) = &self.settings.audio_dump else {
            return;
        };
        match tokio::fs::write(path, audio).await {
            Ok(()) => debug!(path = %path.display(), bytes = audio.len(), "Audio content written"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write audio dump"),
        }
    }
}

fn io_timeout(action: &str, store: &FrameStore) -> FalaError {
    FalaError::Io(std::io::Error::new(
        ErrorKind::TimedOut,
        format!("{action} {} timed out", store.path().display()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingConnector, SinkEvent};
    use async_trait::async_trait;
    use falabot_core::Frame;
    use falabot_media::encode_frames;
    use std::sync::Mutex;

    /// Returns `b"audio:" + text`; fails for the text "boom".
    struct EchoSynth;

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        async fn synthesize(&self, text: &str) -> Result<Bytes> {
            if text == "boom" {
                return Err(FalaError::Service("quota exceeded".into()));
            }
            Ok(Bytes::from(format!("audio:{text}")))
        }
    }

    /// Splits the input into 3-byte frames and records what it was given.
    #[derive(Default)]
    struct ChunkEncoder {
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl ChunkEncoder {
        fn frames_for(audio: &[u8]) -> Vec<Frame> {
            audio.chunks(3).map(Frame::from).collect()
        }
    }

    #[async_trait]
    impl FrameEncoder for ChunkEncoder {
        async fn encode(&self, audio: &[u8]) -> Result<Vec<u8>> {
            self.seen.lock().unwrap().push(audio.to_vec());
            encode_frames(&Self::frames_for(audio))
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        coordinator: Coordinator,
        encoder: Arc<ChunkEncoder>,
        log: crate::testing::EventLog,
        settings: PipelineSettings,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            frame_file: dir.path().join("output.dca"),
            audio_dump: Some(dir.path().join("output.mp3")),
            ..PipelineSettings::default()
        };
        let connector = RecordingConnector::default();
        let log = connector.log.clone();
        let encoder = Arc::new(ChunkEncoder::default());
        let coordinator = Coordinator::new(
            Arc::new(EchoSynth),
            encoder.clone(),
            Arc::new(connector),
            settings.clone(),
        )
        .with_playback(PlaybackDriver::with_padding(Duration::ZERO));
        Harness {
            _dir: dir,
            coordinator,
            encoder,
            log,
            settings,
        }
    }

    fn join(guild_id: u64, channel_id: u64) -> JoinRequest {
        JoinRequest {
            guild_id,
            channel_id,
            requested_by: 42,
        }
    }

    #[tokio::test]
    async fn end_to_end_speak_plays_encoder_frames() {
        let mut h = harness();
        h.coordinator.handle_join(join(10, 20)).await.unwrap();

        let report = h
            .coordinator
            .handle_speak(&SpeakRequest::new("ola"))
            .await
            .unwrap();

        let expected = ChunkEncoder::frames_for(b"audio:ola");
        assert_eq!(h.encoder.seen.lock().unwrap().as_slice(), &[b"audio:ola".to_vec()]);
        assert_eq!(h.coordinator.buffer().frames(), expected.as_slice());
        assert_eq!(report.frames_sent, expected.len());

        let mut wanted = vec![
            SinkEvent::Connected {
                guild_id: 10,
                channel_id: 20,
            },
            SinkEvent::Speaking(true),
        ];
        wanted.extend(expected.iter().map(|f| SinkEvent::Frame(f.as_bytes().to_vec())));
        wanted.push(SinkEvent::Speaking(false));
        assert_eq!(*h.log.lock().unwrap(), wanted);

        let dumped = std::fs::read(h.settings.audio_dump.as_ref().unwrap()).unwrap();
        assert_eq!(dumped, b"audio:ola");
    }

    #[tokio::test]
    async fn speak_without_sink_loads_but_does_not_play() {
        let mut h = harness();
        let report = h
            .coordinator
            .handle_speak(&SpeakRequest::new("ola"))
            .await
            .unwrap();

        assert!(!report.played);
        assert_eq!(h.coordinator.buffer().len(), 3);
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn buffer_is_replaced_not_appended_between_requests() {
        let mut h = harness();
        h.coordinator
            .handle_speak(&SpeakRequest::new("primeira linha"))
            .await
            .unwrap();
        h.coordinator
            .handle_speak(&SpeakRequest::new("ola"))
            .await
            .unwrap();

        assert_eq!(
            h.coordinator.buffer().frames(),
            ChunkEncoder::frames_for(b"audio:ola").as_slice()
        );
    }

    #[tokio::test]
    async fn join_releases_previous_sink_first() {
        let mut h = harness();
        h.coordinator.handle_join(join(1, 100)).await.unwrap();
        h.coordinator.handle_join(join(2, 200)).await.unwrap();

        assert_eq!(
            *h.log.lock().unwrap(),
            vec![
                SinkEvent::Connected {
                    guild_id: 1,
                    channel_id: 100
                },
                SinkEvent::Released {
                    guild_id: 1,
                    channel_id: 100
                },
                SinkEvent::Connected {
                    guild_id: 2,
                    channel_id: 200
                },
            ]
        );
        assert_eq!(h.coordinator.sink_target(), Some((2, 200)));
    }

    #[tokio::test]
    async fn rejoining_same_channel_keeps_sink() {
        let mut h = harness();
        h.coordinator.handle_join(join(1, 100)).await.unwrap();
        h.coordinator.handle_join(join(1, 100)).await.unwrap();
        assert_eq!(h.log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn run_survives_failed_request_and_releases_on_shutdown() {
        let h = harness();
        let log = h.log.clone();
        let encoder = h.encoder.clone();
        let (tx, rx) = mpsc::channel(8);

        tx.send(PipelineMessage::Join(join(5, 6))).await.unwrap();
        tx.send(PipelineMessage::Speak(SpeakRequest::new("boom")))
            .await
            .unwrap();
        tx.send(PipelineMessage::Speak(SpeakRequest::new("ola")))
            .await
            .unwrap();
        tx.send(PipelineMessage::Shutdown).await.unwrap();

        h.coordinator.run(rx).await.unwrap();

        assert_eq!(encoder.seen.lock().unwrap().len(), 1);
        let events = log.lock().unwrap();
        assert!(events.contains(&SinkEvent::Frame(b"aud".to_vec())));
        assert_eq!(
            events.last(),
            Some(&SinkEvent::Released {
                guild_id: 5,
                channel_id: 6
            })
        );
    }

    #[tokio::test]
    async fn run_stops_when_all_producers_are_gone() {
        let h = harness();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        h.coordinator.run(rx).await.unwrap();
    }

    #[tokio::test]
    async fn failed_encode_is_recoverable() {
        struct BrokenEncoder;

        #[async_trait]
        impl FrameEncoder for BrokenEncoder {
            async fn encode(&self, _audio: &[u8]) -> Result<Vec<u8>> {
                Err(FalaError::Encode("not an mp3".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut coordinator = Coordinator::new(
            Arc::new(EchoSynth),
            Arc::new(BrokenEncoder),
            Arc::new(RecordingConnector::default()),
            PipelineSettings {
                frame_file: dir.path().join("output.dca"),
                audio_dump: None,
                ..PipelineSettings::default()
            },
        );

        let err = coordinator
            .handle_speak(&SpeakRequest::new("ola"))
            .await
            .unwrap_err();
        assert!(matches!(err, FalaError::Encode(_)));
        assert!(err.is_recoverable());
        assert!(coordinator.buffer().is_empty());
    }
}
