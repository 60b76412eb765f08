use thiserror::Error;

/// Top-level error type for the falabot pipeline.
#[derive(Debug, Error)]
pub enum FalaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("speech service error: {0}")]
    Service(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

pub type Result<T> = std::result::Result<T, FalaError>;

impl FalaError {
    /// Whether the failure is scoped to a single request.
    ///
    /// Recoverable failures are logged and the pipeline moves on to the next
    /// request; anything else stops the coordinator.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Service(_) | Self::Encode(_) | Self::NotFound(_)
        )
    }

    /// Short taxonomy label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Service(_) => "service",
            Self::Encode(_) => "encode",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::ChannelClosed(_) => "channel_closed",
        }
    }
}
