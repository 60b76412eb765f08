//! Audio media handling for falabot.
//!
//! - `frame_store`: the length-prefixed frame file (read and write)
//! - `encoder`: compressed audio → Opus frames via an ffmpeg decode step

pub mod encoder;
pub mod frame_store;

pub use encoder::{EncoderOptions, FrameEncoder, OpusFrameEncoder};
pub use frame_store::{append_record, encode_frames, FrameStore};
