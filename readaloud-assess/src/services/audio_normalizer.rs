//! Audio normalization for the scoring service
//!
//! Any decodable recording (browser WebM/Opus, MP3, WAV at any rate) becomes
//! 16 kHz mono 16-bit PCM WAV, the only input format the scorer accepts.

use crate::error::{AssessError, AssessResult};
use crate::utils::wav::encode_wav_f32;
use crate::utils::{decode_audio_bytes, Resampler};
use tracing::debug;

/// Sample rate required by the scoring service
pub const TARGET_SAMPLE_RATE: u32 = 16000;
/// Channel count required by the scoring service
pub const TARGET_CHANNELS: u16 = 1;
/// Bit depth required by the scoring service
pub const TARGET_BITS_PER_SAMPLE: u16 = 16;

/// Convert raw recorded audio to 16 kHz mono 16-bit WAV bytes.
///
/// Pure function: no IO beyond the in-memory buffers.
///
/// # Errors
/// * `AudioFormat` - input empty, undecodable, or containing no samples
pub fn normalize(raw_audio: &[u8]) -> AssessResult<Vec<u8>> {
    if raw_audio.is_empty() {
        return Err(AssessError::AudioFormat("Recording is empty".to_string()));
    }

    let decoded = decode_audio_bytes(raw_audio, None)?;

    debug!(
        input_bytes = raw_audio.len(),
        sample_rate = decoded.sample_rate,
        channels = decoded.channels,
        duration_secs = decoded.duration_seconds(),
        "Decoded recording"
    );

    let samples = Resampler::resample_mono(&decoded.samples, decoded.sample_rate, TARGET_SAMPLE_RATE)?;
    if samples.is_empty() {
        return Err(AssessError::AudioFormat(
            "Recording contains no audio after resampling".to_string(),
        ));
    }

    encode_wav_f32(&samples, TARGET_SAMPLE_RATE)
}
