//! Narration rendering
//!
//! Two [`Narrator`] implementations:
//! - [`CachedComposer`]: stitches pre-rendered asset clips and cached
//!   per-word synthesis into one track
//! - [`DirectSynthesizer`]: one combined utterance synthesized directly,
//!   used when assets are unavailable
//!
//! **Composition:**
//! 1. No word feedback: one `perfect` clip, nothing else
//! 2. Otherwise one `needs-work-intro` clip, one synthesized segment per
//!    corrected word (up to a cap), one `closing` clip
//! 3. Every segment resampled to the output rate and concatenated
//! 4. Peak-normalized once over the whole track, exported as 16-bit WAV

use crate::error::AssessResult;
use crate::models::manifest::{CATEGORY_CLOSING, CATEGORY_NEEDS_WORK_INTRO, CATEGORY_PERFECT};
use crate::models::AssessmentResult;
use crate::services::asset_library::{AssetLibrary, AudioClip};
use crate::services::gemini_client::SpeechSynthesizer;
use crate::services::narration_cache::NarrationCache;
use crate::services::prompts::{combined_narration_text, word_narration_phrase};
use crate::utils::wav::encode_wav_f32;
use crate::utils::{decode_audio_bytes, Resampler};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Renders an [`AssessmentResult`] as playable audio
#[async_trait]
pub trait Narrator: Send + Sync {
    /// WAV bytes narrating `result`
    async fn narrate(&self, result: &AssessmentResult) -> AssessResult<Vec<u8>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Scale `samples` so the loudest sample sits `headroom_db` below full scale.
///
/// Silent input is left untouched.
pub fn normalize_peak(samples: &mut [f32], headroom_db: f32) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::EPSILON {
        return;
    }

    let target = 10f32.powf(-headroom_db.max(0.0) / 20.0);
    let gain = target / peak;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

/// Where one composed segment came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentSource {
    Asset { category: String, path: PathBuf },
    Synthesized { word: String },
}

/// A composed track and its segment list
#[derive(Debug, Clone)]
pub struct Composition {
    pub wav: Vec<u8>,
    pub segments: Vec<SegmentSource>,
}

/// Output format and policy for composed narration
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub voice_id: String,
    pub output_sample_rate: u32,
    pub headroom_db: f32,
    pub max_narrated_words: usize,
}

/// Asset clips plus cached per-word synthesis
pub struct CachedComposer {
    library: Arc<AssetLibrary>,
    cache: Arc<NarrationCache>,
    settings: ComposerSettings,
}

impl CachedComposer {
    pub fn new(library: Arc<AssetLibrary>, cache: Arc<NarrationCache>, settings: ComposerSettings) -> Self {
        if library.voice_id() != settings.voice_id {
            warn!(
                asset_voice = %library.voice_id(),
                synth_voice = %settings.voice_id,
                "Narration assets were rendered with a different voice"
            );
        }

        Self {
            library,
            cache,
            settings,
        }
    }

    /// Compose narration for `result`.
    ///
    /// # Errors
    /// * `AssetCategory` - a required category has no clip; nothing is emitted
    pub async fn compose(&self, result: &AssessmentResult) -> AssessResult<Composition> {
        let mut track: Vec<f32> = Vec::new();
        let mut segments = Vec::new();

        if result.is_perfect() {
            let clip = self.library.pick(CATEGORY_PERFECT)?;
            self.append_clip(&mut track, &mut segments, CATEGORY_PERFECT, &clip)?;
            return self.render(track, segments);
        }

        // Both fixed clips are picked before any synthesis so a missing
        // category fails the call without spending network calls
        let intro = self.library.pick(CATEGORY_NEEDS_WORK_INTRO)?;
        let closing = self.library.pick(CATEGORY_CLOSING)?;

        self.append_clip(&mut track, &mut segments, CATEGORY_NEEDS_WORK_INTRO, &intro)?;

        for feedback in result.word_feedback.iter().take(self.settings.max_narrated_words) {
            let phrase = word_narration_phrase(feedback);
            match self.word_segment(&phrase).await {
                Ok(samples) => {
                    track.extend_from_slice(&samples);
                    segments.push(SegmentSource::Synthesized {
                        word: feedback.word.clone(),
                    });
                }
                Err(e) => {
                    warn!(word = %feedback.word, error = %e, "Skipping word narration");
                }
            }
        }

        self.append_clip(&mut track, &mut segments, CATEGORY_CLOSING, &closing)?;
        self.render(track, segments)
    }

    fn append_clip(
        &self,
        track: &mut Vec<f32>,
        segments: &mut Vec<SegmentSource>,
        category: &str,
        clip: &AudioClip,
    ) -> AssessResult<()> {
        let samples = Resampler::resample_mono(&clip.samples, clip.sample_rate, self.settings.output_sample_rate)?;
        track.extend_from_slice(&samples);
        segments.push(SegmentSource::Asset {
            category: category.to_string(),
            path: clip.source.clone(),
        });
        Ok(())
    }

    async fn word_segment(&self, phrase: &str) -> AssessResult<Vec<f32>> {
        let wav = self.cache.get_or_generate(phrase, &self.settings.voice_id).await?;
        let decoded = decode_audio_bytes(&wav, Some("wav"))?;
        Resampler::resample_mono(&decoded.samples, decoded.sample_rate, self.settings.output_sample_rate)
    }

    fn render(&self, mut track: Vec<f32>, segments: Vec<SegmentSource>) -> AssessResult<Composition> {
        normalize_peak(&mut track, self.settings.headroom_db);
        let wav = encode_wav_f32(&track, self.settings.output_sample_rate)?;

        info!(
            segments = segments.len(),
            duration_secs = track.len() as f64 / self.settings.output_sample_rate as f64,
            wav_bytes = wav.len(),
            "Narration composed"
        );

        Ok(Composition { wav, segments })
    }
}

#[async_trait]
impl Narrator for CachedComposer {
    async fn narrate(&self, result: &AssessmentResult) -> AssessResult<Vec<u8>> {
        Ok(self.compose(result).await?.wav)
    }

    fn name(&self) -> &'static str {
        "cached-composer"
    }
}

/// Single-shot narration straight from the speech synthesizer
pub struct DirectSynthesizer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voice_id: String,
    style_hint: String,
    max_narrated_words: usize,
}

impl DirectSynthesizer {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        voice_id: impl Into<String>,
        style_hint: impl Into<String>,
        max_narrated_words: usize,
    ) -> Self {
        Self {
            synthesizer,
            voice_id: voice_id.into(),
            style_hint: style_hint.into(),
            max_narrated_words,
        }
    }
}

#[async_trait]
impl Narrator for DirectSynthesizer {
    async fn narrate(&self, result: &AssessmentResult) -> AssessResult<Vec<u8>> {
        let text = combined_narration_text(result, self.max_narrated_words);
        debug!(text_chars = text.len(), "Synthesizing combined narration");

        let audio = self
            .synthesizer
            .synthesize(&text, &self.voice_id, &self.style_hint)
            .await?;
        audio.to_wav()
    }

    fn name(&self) -> &'static str {
        "direct-synthesizer"
    }
}
