//! WAV encoding helpers (16-bit PCM via hound)

use crate::error::{AssessError, AssessResult};
use std::io::Cursor;

/// Encode mono f32 samples as a 16-bit PCM WAV file in memory.
///
/// Samples outside [-1.0, 1.0] are clipped.
pub fn encode_wav_f32(samples: &[f32], sample_rate: u32) -> AssessResult<Vec<u8>> {
    let pcm: Vec<i16> = samples.iter().map(|s| f32_to_i16(*s)).collect();
    encode_wav_pcm16(&pcm, sample_rate, 1)
}

/// Encode interleaved 16-bit samples as a WAV file in memory
pub fn encode_wav_pcm16(samples: &[i16], sample_rate: u32, channels: u16) -> AssessResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for sample in samples {
            writer.write_sample(*sample).map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }

    Ok(cursor.into_inner())
}

/// Wrap raw 16-bit little-endian PCM bytes (as returned by speech synthesis)
/// in a WAV container. A trailing odd byte is dropped.
pub fn pcm16le_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> AssessResult<Vec<u8>> {
    let samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    encode_wav_pcm16(&samples, sample_rate, channels)
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn wav_error(e: hound::Error) -> AssessError {
    AssessError::AudioFormat(format!("WAV encoding failed: {}", e))
}
