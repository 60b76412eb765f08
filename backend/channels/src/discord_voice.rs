//! Discord voice sinks backed by songbird.
//!
//! Frames sent between the speaking markers are collected and handed to
//! songbird as one DCA1 stream, which it passes through to the voice UDP
//! socket without re-encoding. A raised cancel flag stops that track.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::Input;
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

use falabot_core::{CancelFlag, FalaError, Frame, Result, VoiceConnector, VoiceSink};

/// Duration of one Opus frame in the stream.
const FRAME_DURATION: Duration = Duration::from_millis(20);
/// Extra time allowed for a track to report its end.
const END_GRACE: Duration = Duration::from_secs(5);

fn discord_ids(guild_id: u64, channel_id: u64) -> Result<(GuildId, ChannelId)> {
    if guild_id == 0 || channel_id == 0 {
        return Err(FalaError::NotFound(format!(
            "invalid voice target guild={guild_id} channel={channel_id}"
        )));
    }
    Ok((GuildId::new(guild_id), ChannelId::new(channel_id)))
}

/// Opens songbird calls on behalf of the pipeline coordinator.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    cancel: CancelFlag,
}

impl SongbirdConnector {
    /// `cancel` is shared with every sink this connector opens.
    pub fn new(manager: Arc<Songbird>, cancel: CancelFlag) -> Self {
        Self { manager, cancel }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<Box<dyn VoiceSink>> {
        let (guild, channel) = discord_ids(guild_id, channel_id)?;
        info!(guild_id, channel_id, "Joining Discord voice channel");

        let call = self
            .manager
            .join(guild, channel)
            .await
            .map_err(|e| FalaError::Service(format!("voice join failed: {e}")))?;

        {
            let mut handler = call.lock().await;
            if let Err(e) = handler.deafen(true).await {
                warn!(error = %e, "Failed to self-deafen");
            }
        }

        Ok(Box::new(SongbirdSink {
            manager: self.manager.clone(),
            call,
            cancel: self.cancel.clone(),
            guild_id,
            channel_id,
            pending: Vec::new(),
            speaking: false,
            released: false,
        }))
    }
}

/// One voice-channel membership.
///
/// Leaving the channel happens in `release`; a sink dropped without being
/// released leaves in the background.
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    cancel: CancelFlag,
    guild_id: u64,
    channel_id: u64,
    pending: Vec<Frame>,
    speaking: bool,
    released: bool,
}

impl SongbirdSink {
    async fn flush(&mut self) -> Result<()> {
        let frames = std::mem::take(&mut self.pending);
        if frames.is_empty() || self.cancel.is_cancelled() {
            return Ok(());
        }
        let stream = dca1_stream(&frames)?;
        let expected = FRAME_DURATION * frames.len() as u32;

        let (done_tx, done_rx) = oneshot::channel();
        let track = {
            let mut handler = self.call.lock().await;
            handler.play_input(Input::from(stream))
        };
        let notifier = TrackEndNotifier(StdMutex::new(Some(done_tx)));
        if let Err(e) = track.add_event(Event::Track(TrackEvent::End), notifier) {
            warn!(error = %e, "Could not watch track end; not waiting for playback");
            return Ok(());
        }

        debug!(frames = frames.len(), ?expected, "Streaming frames to voice channel");
        match wait_for_track_end(done_rx, &self.cancel, expected + END_GRACE).await {
            TrackWait::Finished => Ok(()),
            TrackWait::Cancelled => {
                info!(guild_id = self.guild_id, "Stopping voice track on cancel");
                if let Err(e) = track.stop() {
                    warn!(error = %e, "Failed to stop voice track");
                }
                Ok(())
            }
            TrackWait::TimedOut => {
                let _ = track.stop();
                Err(FalaError::Service(format!(
                    "voice playback did not finish within {:?}",
                    expected + END_GRACE
                )))
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TrackWait {
    Finished,
    Cancelled,
    TimedOut,
}

/// A dropped end notifier counts as finished: songbird drops it with the track.
async fn wait_for_track_end(
    done: oneshot::Receiver<()>,
    cancel: &CancelFlag,
    limit: Duration,
) -> TrackWait {
    tokio::select! {
        _ = done => TrackWait::Finished,
        _ = cancel.cancelled() => TrackWait::Cancelled,
        _ = tokio::time::sleep(limit) => TrackWait::TimedOut,
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    fn guild_id(&self) -> u64 {
        self.guild_id
    }

    fn channel_id(&self) -> u64 {
        self.channel_id
    }

    async fn speaking(&mut self, speaking: bool) -> Result<()> {
        let was = std::mem::replace(&mut self.speaking, speaking);
        match (was, speaking) {
            (false, true) => {
                self.pending.clear();
                Ok(())
            }
            (true, false) => self.flush().await,
            _ => Ok(()),
        }
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        if !self.speaking {
            return Err(FalaError::Service("frame sent outside a speaking run".into()));
        }
        self.pending.push(frame.clone());
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.released = true;
        info!(
            guild_id = this.guild_id,
            channel_id = this.channel_id,
            "Leaving Discord voice channel"
        );
        this.manager
            .remove(GuildId::new(this.guild_id))
            .await
            .map_err(|e| FalaError::Service(format!("voice leave failed: {e}")))
    }
}

impl Drop for SongbirdSink {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(
            guild_id = self.guild_id,
            "SongbirdSink dropped without release; leaving voice channel"
        );
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let manager = self.manager.clone();
            let guild = GuildId::new(self.guild_id);
            runtime.spawn(async move {
                let _ = manager.remove(guild).await;
            });
        }
    }
}

struct TrackEndNotifier(StdMutex<Option<oneshot::Sender<()>>>);

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(tx) = self.0.lock().ok().and_then(|mut slot| slot.take()) {
            let _ = tx.send(());
        }
        Some(Event::Cancel)
    }
}

/// Wrap frames in a DCA1 container: magic, metadata length, JSON metadata,
/// then the same length-prefixed records as the frame file.
pub fn dca1_stream(frames: &[Frame]) -> Result<Vec<u8>> {
    let metadata = serde_json::json!({
        "dca": {
            "version": 1,
            "tool": {
                "name": "falabot",
                "version": env!("CARGO_PKG_VERSION"),
                "url": null,
                "author": null
            }
        },
        "opus": {
            "mode": "audio",
            "sample_rate": 48000,
            "frame_size": 960,
            "abr": null,
            "vbr": true,
            "channels": 2
        },
        "info": null,
        "origin": null,
        "extra": null
    });
    let metadata = serde_json::to_vec(&metadata)
        .map_err(|e| FalaError::Encode(format!("failed to serialize DCA metadata: {e}")))?;

    let body_len: usize = frames.iter().map(|f| f.len() + 2).sum();
    let mut out = Vec::with_capacity(8 + metadata.len() + body_len);
    out.extend_from_slice(b"DCA1");
    out.extend_from_slice(&(metadata.len() as i32).to_le_bytes());
    out.extend_from_slice(&metadata);
    for frame in frames {
        if !frame.is_representable() {
            return Err(FalaError::Encode(format!(
                "frame of {} bytes cannot be streamed",
                frame.len()
            )));
        }
        out.extend_from_slice(&(frame.len() as u16).to_le_bytes());
        out.extend_from_slice(frame.as_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dca1_layout() {
        let frames = vec![Frame::new(vec![1, 2, 3]), Frame::new(vec![4])];
        let stream = dca1_stream(&frames).unwrap();

        assert_eq!(&stream[..4], b"DCA1");
        let meta_len = i32::from_le_bytes([stream[4], stream[5], stream[6], stream[7]]) as usize;
        let meta: serde_json::Value = serde_json::from_slice(&stream[8..8 + meta_len]).unwrap();
        assert_eq!(meta["opus"]["sample_rate"], 48000);
        assert_eq!(meta["opus"]["mode"], "audio");
        assert_eq!(&stream[8 + meta_len..], &[3, 0, 1, 2, 3, 1, 0, 4]);
    }

    #[tokio::test]
    async fn track_wait_ends_on_cancel() {
        let cancel = CancelFlag::new();
        let (_done_tx, done_rx) = oneshot::channel();
        let trigger = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let started = std::time::Instant::now();
        let outcome = wait_for_track_end(done_rx, &cancel, Duration::from_secs(30)).await;
        trigger.await.unwrap();

        assert_eq!(outcome, TrackWait::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn track_wait_reports_end_and_timeout() {
        let cancel = CancelFlag::new();

        let (done_tx, done_rx) = oneshot::channel();
        done_tx.send(()).unwrap();
        assert_eq!(
            wait_for_track_end(done_rx, &cancel, Duration::from_secs(30)).await,
            TrackWait::Finished
        );

        let (_done_tx, done_rx) = oneshot::channel();
        assert_eq!(
            wait_for_track_end(done_rx, &cancel, Duration::from_millis(10)).await,
            TrackWait::TimedOut
        );
    }

    #[test]
    fn zero_ids_are_rejected() {
        assert!(matches!(discord_ids(0, 5), Err(FalaError::NotFound(_))));
        assert!(discord_ids(1, 5).is_ok());
    }
}
