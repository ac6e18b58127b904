//! Audio Test Fixture Generator
//!
//! Utilities for generating test audio with various characteristics

use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency: f32,
    pub amplitude: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 1.0,
            sample_rate: 44100,
            channels: 1,
            frequency: 440.0,
            amplitude: 0.3,
        }
    }
}

fn write_tone<W: std::io::Write + std::io::Seek>(writer: W, config: &AudioConfig) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::new(writer, spec)?;
    let total_samples = (config.duration_seconds * config.sample_rate as f64) as usize;

    for i in 0..total_samples {
        let t = i as f32 / config.sample_rate as f32;
        let sample = (config.amplitude
            * (2.0 * std::f32::consts::PI * config.frequency * t).sin()
            * i16::MAX as f32) as i16;

        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Generate a sine-tone WAV file
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    let file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_tone(file, config)?;
    Ok(path.to_path_buf())
}

/// Generate a sine-tone WAV in memory
pub fn generate_wav_bytes(config: &AudioConfig) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    write_tone(&mut cursor, config).expect("in-memory WAV generation failed");
    cursor.into_inner()
}

/// A short stereo 48 kHz "recording", as a browser would upload
pub fn recording_bytes() -> Vec<u8> {
    generate_wav_bytes(&AudioConfig {
        duration_seconds: 0.5,
        sample_rate: 48000,
        channels: 2,
        ..Default::default()
    })
}

/// Read back a WAV: (sample rate, channels, frame count)
pub fn wav_info(bytes: &[u8]) -> (u32, u16, u32) {
    let reader = hound::WavReader::new(Cursor::new(bytes)).expect("not a WAV");
    let spec = reader.spec();
    (spec.sample_rate, spec.channels, reader.duration())
}
