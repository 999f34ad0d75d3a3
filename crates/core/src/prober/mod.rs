//! Media probing.
//!
//! `MediaProber` reports per-stream codec, language and title metadata plus
//! the overall duration of a downloaded file.

mod ffprobe;
mod types;

pub use ffprobe::FfprobeProber;
pub use types::*;
