//! PCM audio format descriptor

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FormatError;

/// Immutable description of a PCM stream.
///
/// Sample counts returned here are per channel (sample frames), which is also
/// the unit RTP timestamps advance in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAudioFormat")]
pub struct AudioFormat {
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
}

#[derive(Deserialize)]
struct RawAudioFormat {
    sample_rate: u32,
    channels: u16,
    bit_depth: u16,
}

impl TryFrom<RawAudioFormat> for AudioFormat {
    type Error = FormatError;

    fn try_from(raw: RawAudioFormat) -> Result<Self, Self::Error> {
        Self::new(raw.sample_rate, raw.channels, raw.bit_depth)
    }
}

impl AudioFormat {
    /// Create a format, rejecting bit depths that are not whole bytes
    pub fn new(sample_rate: u32, channels: u16, bit_depth: u16) -> Result<Self, FormatError> {
        if bit_depth == 0 || bit_depth % 8 != 0 {
            return Err(FormatError::InvalidBitDepth(bit_depth));
        }
        if channels == 0 {
            return Err(FormatError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }

        Ok(Self {
            sample_rate,
            channels,
            bit_depth,
        })
    }

    /// 8 kHz mono 16-bit, the G.711 telephony leg
    pub const fn narrowband() -> Self {
        Self {
            sample_rate: 8000,
            channels: 1,
            bit_depth: 16,
        }
    }

    /// 16 kHz mono 16-bit
    pub const fn wideband() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bit_depth: 16,
        }
    }

    /// 48 kHz mono 16-bit, the Opus/platform leg
    pub const fn fullband() -> Self {
        Self {
            sample_rate: 48000,
            channels: 1,
            bit_depth: 16,
        }
    }

    /// Get sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Get bits per sample
    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    /// Bytes per sample frame (all channels)
    pub fn bytes_per_sample(&self) -> usize {
        self.channels as usize * (self.bit_depth as usize / 8)
    }

    /// Bytes of PCM per second of audio
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_sample()
    }

    /// Sample frames covering `duration_ms`, rounded down. Saturates at
    /// `u32::MAX`.
    pub fn samples_for_duration(&self, duration_ms: u32) -> u32 {
        let samples = u64::from(self.sample_rate) * u64::from(duration_ms) / 1000;
        u32::try_from(samples).unwrap_or(u32::MAX)
    }

    /// Bytes of PCM covering `duration_ms`
    pub fn bytes_for_duration(&self, duration_ms: u32) -> usize {
        self.samples_for_duration(duration_ms) as usize * self.bytes_per_sample()
    }

    /// Playback time of `bytes` of PCM in this format
    pub fn duration_for_bytes(&self, bytes: usize) -> Duration {
        let frames = (bytes / self.bytes_per_sample()) as u64;
        Duration::from_micros(frames * 1_000_000 / self.sample_rate as u64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::fullband()
    }
}
