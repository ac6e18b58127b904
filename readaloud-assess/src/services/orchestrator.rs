//! End-to-end assessment and narration
//!
//! **Assessment flow:**
//! 1. Normalize the recording (off the async runtime)
//! 2. Score it
//! 3. Not recognized → "couldn't hear you" template
//! 4. Pronunciation ≥ threshold → "excellent" template, no feedback call
//! 5. Otherwise generate feedback
//!
//! Narration is best effort: any failure degrades to "no audio" and never
//! fails the assessment.

use crate::config::AssessConfig;
use crate::error::{AssessError, AssessResult};
use crate::models::AssessmentResult;
use crate::services::asset_library::AssetLibrary;
use crate::services::audio_normalizer;
use crate::services::feedback_transformer::FeedbackTransformer;
use crate::services::gemini_client::{FeedbackModel, SpeechSynthesizer};
use crate::services::narration_cache::NarrationCache;
use crate::services::narration_composer::{
    CachedComposer, ComposerSettings, DirectSynthesizer, Narrator,
};
use crate::services::scoring_client::{ScoringClient, ScoringTransport};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// External service handles the orchestrator is built from
#[derive(Clone)]
pub struct Backends {
    pub scoring: Arc<dyn ScoringTransport>,
    pub feedback: Arc<dyn FeedbackModel>,
    pub speech: Arc<dyn SpeechSynthesizer>,
}

/// Owns every pipeline component for the life of the process
pub struct AssessmentOrchestrator {
    scoring: ScoringClient,
    feedback: FeedbackTransformer,
    narrator: Arc<dyn Narrator>,
    /// Set when `narrator` is the composer, for per-call fallback
    fallback: Option<Arc<DirectSynthesizer>>,
}

impl AssessmentOrchestrator {
    /// Build in order: transport warm-up, then assets and cache (best effort).
    ///
    /// Asset or cache failures are logged and select direct synthesis; they
    /// never fail construction.
    pub async fn build(config: &AssessConfig, backends: Backends) -> AssessResult<Self> {
        let scoring = ScoringClient::new(backends.scoring);
        scoring.warm_up().await;

        let feedback = FeedbackTransformer::new(backends.feedback, config.policy.clone());

        let narration = &config.narration;
        let direct = Arc::new(DirectSynthesizer::new(
            Arc::clone(&backends.speech),
            narration.voice_id.clone(),
            narration.voice_style_prompt.clone(),
            narration.max_narrated_words,
        ));

        let (narrator, fallback): (Arc<dyn Narrator>, Option<Arc<DirectSynthesizer>>) =
            if narration.enable_composer {
                match Self::build_composer(config, Arc::clone(&backends.speech)).await {
                    Ok(composer) => (Arc::new(composer) as Arc<dyn Narrator>, Some(direct)),
                    Err(e) => {
                        warn!(error = %e, "Narration composer unavailable; using direct synthesis");
                        (direct as Arc<dyn Narrator>, None)
                    }
                }
            } else {
                (direct as Arc<dyn Narrator>, None)
            };

        info!(narrator = narrator.name(), "Assessment orchestrator ready");

        Ok(Self {
            scoring,
            feedback,
            narrator,
            fallback,
        })
    }

    async fn build_composer(
        config: &AssessConfig,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> AssessResult<CachedComposer> {
        let narration = config.narration.clone();

        // Decoding every clip and scanning the cache directory is blocking IO
        let (library, cache) = tokio::task::spawn_blocking(move || -> AssessResult<_> {
            let library = AssetLibrary::load(
                &narration.manifest_path,
                &narration.assets_dir,
                narration.variant_seed,
            )?;
            let cache = NarrationCache::open(
                &narration.cache_dir,
                narration.cache_size_bytes,
                speech,
                narration.voice_style_prompt.clone(),
            )?;
            Ok((library, cache))
        })
        .await
        .map_err(|e| AssessError::AssetLoad(format!("Asset loading task failed: {}", e)))??;

        Ok(CachedComposer::new(
            Arc::new(library),
            Arc::new(cache),
            ComposerSettings {
                voice_id: config.narration.voice_id.clone(),
                output_sample_rate: config.narration.output_sample_rate,
                headroom_db: config.narration.headroom_db,
                max_narrated_words: config.narration.max_narrated_words,
            },
        ))
    }

    /// Name of the narrator chosen at startup
    pub fn narrator_name(&self) -> &'static str {
        self.narrator.name()
    }

    /// Score `audio` against `reference_text` and build feedback.
    ///
    /// # Errors
    /// * `AudioFormat` / `AudioProcessing` - recording unusable or scoring
    ///   failed (user-retryable)
    /// * `InvalidInput` - blank reference text
    /// * `InvalidAssessmentResponse` - feedback generation failed
    pub async fn assess(&self, audio: &[u8], reference_text: &str) -> AssessResult<AssessmentResult> {
        if audio.is_empty() {
            return Err(AssessError::AudioFormat("Recording is empty".to_string()));
        }
        let reference_text = reference_text.trim();
        if reference_text.is_empty() {
            return Err(AssessError::InvalidInput("Reference text is empty".to_string()));
        }

        let started = Instant::now();

        let raw = audio.to_vec();
        let wav = tokio::task::spawn_blocking(move || audio_normalizer::normalize(&raw))
            .await
            .map_err(|e| AssessError::AudioFormat(format!("Normalization task failed: {}", e)))??;

        let scoring = self.scoring.score(&wav, reference_text).await?;

        if !scoring.status.is_success() {
            info!(status = ?scoring.status, "Speech not recognized");
            return Ok(AssessmentResult::not_heard());
        }

        let policy = self.feedback.policy();
        let pron_score = scoring.scores.pronunciation;

        let result = if pron_score >= policy.high_score_threshold {
            info!(
                pron_score = pron_score,
                threshold = policy.high_score_threshold,
                "High score; skipping feedback generation"
            );
            AssessmentResult::excellent(scoring.scores)
        } else {
            self.feedback.analyze(&scoring, reference_text).await?
        };

        info!(
            pron_score = pron_score,
            feedback_items = result.word_feedback.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Assessment complete"
        );

        Ok(result)
    }

    /// Narration WAV for `result`, or `None` when every narrator failed
    pub async fn narrate(&self, result: &AssessmentResult) -> Option<Vec<u8>> {
        match self.narrator.narrate(result).await {
            Ok(wav) => return Some(wav),
            Err(e) => warn!(narrator = self.narrator.name(), error = %e, "Narration failed"),
        }

        let fallback = self.fallback.as_ref()?;
        match fallback.narrate(result).await {
            Ok(wav) => Some(wav),
            Err(e) => {
                warn!(narrator = fallback.name(), error = %e, "Fallback narration failed");
                None
            }
        }
    }

    /// Run narration on its own task so it overlaps other per-request work
    pub fn spawn_narration(self: &Arc<Self>, result: AssessmentResult) -> JoinHandle<Option<Vec<u8>>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.narrate(&result).await })
    }
}
