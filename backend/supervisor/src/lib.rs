pub mod coordinator;
pub mod playback;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, PipelineSettings};
pub use playback::{PlaybackDriver, PlaybackReport, PLAYBACK_PADDING};
