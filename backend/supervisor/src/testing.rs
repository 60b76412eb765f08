//! Test doubles shared by the playback and coordinator tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use falabot_core::{FalaError, Frame, Result, VoiceConnector, VoiceSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Speaking(bool),
    Frame(Vec<u8>),
    Released { guild_id: u64, channel_id: u64 },
    Connected { guild_id: u64, channel_id: u64 },
}

pub type EventLog = Arc<Mutex<Vec<SinkEvent>>>;

/// Sink that records everything it is asked to do.
pub struct RecordingSink {
    guild_id: u64,
    channel_id: u64,
    log: EventLog,
    sent: usize,
    /// Fail `send_frame` once this many frames have been accepted.
    pub fail_after: Option<usize>,
}

impl RecordingSink {
    pub fn new(guild_id: u64, channel_id: u64) -> (Self, EventLog) {
        let log = EventLog::default();
        (Self::with_log(guild_id, channel_id, log.clone()), log)
    }

    pub fn with_log(guild_id: u64, channel_id: u64, log: EventLog) -> Self {
        Self {
            guild_id,
            channel_id,
            log,
            sent: 0,
            fail_after: None,
        }
    }
}

#[async_trait]
impl VoiceSink for RecordingSink {
    fn guild_id(&self) -> u64 {
        self.guild_id
    }

    fn channel_id(&self) -> u64 {
        self.channel_id
    }

    async fn speaking(&mut self, speaking: bool) -> Result<()> {
        self.log.lock().unwrap().push(SinkEvent::Speaking(speaking));
        Ok(())
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.sent >= limit) {
            return Err(FalaError::Service("voice transport closed".into()));
        }
        self.sent += 1;
        self.log
            .lock()
            .unwrap()
            .push(SinkEvent::Frame(frame.as_bytes().to_vec()));
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.log.lock().unwrap().push(SinkEvent::Released {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
        });
        Ok(())
    }
}

/// Connector handing out recording sinks that share one log.
#[derive(Default)]
pub struct RecordingConnector {
    pub log: EventLog,
}

#[async_trait]
impl VoiceConnector for RecordingConnector {
    async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<Box<dyn VoiceSink>> {
        self.log.lock().unwrap().push(SinkEvent::Connected {
            guild_id,
            channel_id,
        });
        Ok(Box::new(RecordingSink::with_log(
            guild_id,
            channel_id,
            self.log.clone(),
        )))
    }
}
