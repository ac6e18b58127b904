//! Audio Decoding Utilities
//!
//! **Purpose:** Decode recorded or synthesized audio to mono f32 PCM samples
//!
//! Uses symphonia for format-agnostic decoding (WAV, MP3, FLAC, OGG, MKV/WebM, etc.)
//!
//! Opus, the codec of browser WebM recordings, is decoded through libopus
//! (symphonia-adapter-libopus) registered alongside symphonia's own codecs.

use crate::error::{AssessError, AssessResult};
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CodecRegistry, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia_adapter_libopus::OpusDecoder;

/// Codec registry: symphonia's enabled codecs plus Opus
fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<OpusDecoder>();
        symphonia::default::register_enabled_codecs(&mut registry);
        registry
    })
}

/// Decoded audio result
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono audio samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
}

impl DecodedAudio {
    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode in-memory audio to mono f32 PCM samples
///
/// `extension_hint` (e.g. `"wav"`) speeds up probing but is not required;
/// the container is detected from its magic bytes either way.
///
/// # Errors
/// * `AudioFormat` - unsupported or corrupt data, or no samples decoded
pub fn decode_audio_bytes(bytes: &[u8], extension_hint: Option<&str>) -> AssessResult<DecodedAudio> {
    if bytes.is_empty() {
        return Err(AssessError::AudioFormat("Audio data is empty".to_string()));
    }

    let mut hint = Hint::new();
    if let Some(extension) = extension_hint {
        hint.with_extension(extension);
    }

    decode_source(Box::new(Cursor::new(bytes.to_vec())), hint, "in-memory audio")
}

/// Decode an audio file to mono f32 PCM samples
pub fn decode_audio_file(file_path: &Path) -> AssessResult<DecodedAudio> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let file = std::fs::File::open(file_path).map_err(|e| {
        AssessError::AudioFormat(format!(
            "Failed to open audio file {}: {}",
            file_path.display(),
            e
        ))
    })?;

    // Create format hint from file extension
    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    decode_source(Box::new(file), hint, &file_path.display().to_string())
}

/// **Algorithm:**
/// 1. Probe format using symphonia
/// 2. Find default audio track
/// 3. Create decoder for track codec
/// 4. Decode all packets, mixing every frame down to mono
fn decode_source(source: Box<dyn MediaSource>, hint: Hint, label: &str) -> AssessResult<DecodedAudio> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AssessError::AudioFormat(format!("Failed to probe {}: {}", label, e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AssessError::AudioFormat(format!("No audio track found in {}", label)))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AssessError::AudioFormat(format!("Sample rate unknown for {}", label)))?;
    let channel_count = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = codec_registry()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AssessError::AudioFormat(format!("No decoder for {}: {}", label, e)))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream
                break;
            }
            Err(e) => {
                return Err(AssessError::AudioFormat(format!(
                    "Error reading packet from {}: {}",
                    label, e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => all_samples.extend(mix_to_mono(&decoded)),
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet: skip it, keep the rest of the stream
                tracing::warn!(source = label, error = e, "Skipping undecodable packet");
            }
            Err(e) => {
                return Err(AssessError::AudioFormat(format!(
                    "Failed to decode {}: {}",
                    label, e
                )));
            }
        }
    }

    if all_samples.is_empty() {
        return Err(AssessError::AudioFormat(format!("No audio samples in {}", label)));
    }

    tracing::debug!(
        source = label,
        sample_rate = sample_rate,
        channels = channel_count,
        total_samples = all_samples.len(),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples: all_samples,
        sample_rate,
        channels: channel_count,
    })
}

/// Convert a decoded buffer of any sample type to mono f32 by averaging channels
fn mix_to_mono(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => average_channels(&**buf),
        AudioBufferRef::U8(buf) => average_channels(&**buf),
        AudioBufferRef::U16(buf) => average_channels(&**buf),
        AudioBufferRef::U24(buf) => average_channels(&**buf),
        AudioBufferRef::U32(buf) => average_channels(&**buf),
        AudioBufferRef::S8(buf) => average_channels(&**buf),
        AudioBufferRef::S16(buf) => average_channels(&**buf),
        AudioBufferRef::S24(buf) => average_channels(&**buf),
        AudioBufferRef::S32(buf) => average_channels(&**buf),
        AudioBufferRef::F64(buf) => average_channels(&**buf),
    }
}

fn average_channels<S>(buf: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample,
    f32: FromSample<S>,
{
    let num_channels = buf.spec().channels.count().max(1);
    let num_frames = buf.frames();
    let mut mono = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let mut sum = 0.0f32;
        for ch in 0..num_channels {
            sum += f32::from_sample(buf.chan(ch)[frame_idx]);
        }
        mono.push(sum / num_channels as f32);
    }

    mono
}
