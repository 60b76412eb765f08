use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Messages drained by the pipeline coordinator.
#[derive(Debug, Clone)]
pub enum PipelineMessage {
    /// Operator input → Coordinator: synthesize and play this line
    Speak(SpeakRequest),
    /// Gateway → Coordinator: move the voice sink to this channel
    Join(JoinRequest),
    /// Finish in-flight work, release the sink and stop
    Shutdown,
}

/// One line of operator text to be spoken.
#[derive(Debug, Clone)]
pub struct SpeakRequest {
    pub id: Uuid,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl SpeakRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// A resolved voice-channel membership to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequest {
    pub guild_id: u64,
    pub channel_id: u64,
    pub requested_by: u64,
}

impl PipelineMessage {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineMessage::Speak(_) => "speak",
            PipelineMessage::Join(_) => "join",
            PipelineMessage::Shutdown => "shutdown",
        }
    }
}
