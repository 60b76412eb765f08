//! Playback driver: drains the frame buffer into a voice sink between
//! speaking markers.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use falabot_core::{CancelFlag, FrameBuffer, Result, VoiceSink};

/// Silence before the start marker and after the stop marker, so the
/// transport does not clip the first or last frame.
pub const PLAYBACK_PADDING: Duration = Duration::from_millis(250);

/// Outcome of one playback pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackReport {
    pub frames_sent: usize,
    pub cancelled: bool,
    /// False when there was no sink and nothing was attempted.
    pub played: bool,
}

pub struct PlaybackDriver {
    padding: Duration,
    cancel: CancelFlag,
}

impl PlaybackDriver {
    pub fn new() -> Self {
        Self::with_padding(PLAYBACK_PADDING)
    }

    pub fn with_padding(padding: Duration) -> Self {
        Self {
            padding,
            cancel: CancelFlag::new(),
        }
    }

    /// Share `cancel` with other holders, such as a voice sink that keeps
    /// playing after the last frame was handed over.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that stops an in-progress pass at the next frame boundary.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Send every buffered frame, in order, to `sink`.
    ///
    /// Without a sink this returns immediately. The buffer is only read.
    /// Once started, the stop marker is always sent, including after
    /// cancellation.
    pub async fn play<S>(&self, sink: Option<&mut S>, buffer: &FrameBuffer) -> Result<PlaybackReport>
    where
        S: VoiceSink + ?Sized,
    {
        let Some(sink) = sink else {
            debug!("No voice sink established; skipping playback");
            return Ok(PlaybackReport::default());
        };

        info!(
            guild_id = sink.guild_id(),
            channel_id = sink.channel_id(),
            frames = buffer.len(),
            "Playing buffered audio"
        );

        sleep(self.padding).await;
        sink.speaking(true).await?;

        let mut report = PlaybackReport {
            played: true,
            ..PlaybackReport::default()
        };
        let mut outcome = Ok(());
        for frame in buffer {
            if self.cancel.is_cancelled() {
                warn!(sent = report.frames_sent, "Playback cancelled");
                report.cancelled = true;
                break;
            }
            if let Err(e) = sink.send_frame(frame).await {
                outcome = Err(e);
                break;
            }
            report.frames_sent += 1;
        }

        let stopped = sink.speaking(false).await;
        if self.cancel.is_cancelled() && !report.cancelled {
            // The sink was still playing when the flag was raised.
            warn!(sent = report.frames_sent, "Playback cancelled while draining");
            report.cancelled = true;
        }
        sleep(self.padding).await;

        outcome?;
        stopped?;
        debug!(sent = report.frames_sent, "Playback finished");
        Ok(report)
    }
}

impl Default for PlaybackDriver {
    fn default() -> Self {
        Self::new()
    }
}
