use async_trait::async_trait;

use crate::error::Result;
use crate::frame::Frame;

/// An established outbound audio destination bound to one voice-channel
/// membership.
#[async_trait]
pub trait VoiceSink: Send + Sync {
    fn guild_id(&self) -> u64;

    fn channel_id(&self) -> u64;

    /// Toggle the speaking marker around a run of frames.
    async fn speaking(&mut self, speaking: bool) -> Result<()>;

    /// Send one encoded frame.
    async fn send_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Leave the voice channel. Consumes the sink.
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Establishes voice sinks; implemented by the voice gateway client.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<Box<dyn VoiceSink>>;
}
