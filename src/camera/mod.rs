//! Camera module - frame sources and per-camera capture workers

mod backoff;
mod ffmpeg;
mod frame;
mod jpeg;
mod source;
mod synthetic;
mod types;
mod worker;

pub use backoff::BackoffPolicy;
pub use ffmpeg::FfmpegSource;
pub use frame::{Frame, FrameEncoding, JPEG_QUALITY};
pub use jpeg::JpegSplitter;
pub use source::{FrameSource, SourceHandle};
pub use synthetic::SyntheticSource;
pub use types::*;
pub use worker::*;
