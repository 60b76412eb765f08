pub mod cancel;
pub mod channel;
pub mod error;
pub mod frame;
pub mod message;
pub mod traits;

pub use cancel::CancelFlag;
pub use channel::PipelineBus;
pub use error::{FalaError, Result};
pub use frame::{Frame, FrameBuffer, MAX_FRAME_LEN};
pub use message::{JoinRequest, PipelineMessage, SpeakRequest};
pub use traits::{VoiceConnector, VoiceSink};
