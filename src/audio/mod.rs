//! Audio-side building blocks: PCM format arithmetic and the jitter buffer

pub mod buffer;
pub mod format;

pub use buffer::{JitterBuffer, JitterBufferStats, Playout, SharedJitterBuffer};
pub use format::AudioFormat;
