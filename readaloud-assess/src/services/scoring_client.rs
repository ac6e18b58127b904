//! Pronunciation scoring client
//!
//! Sends normalized audio plus the reference sentence to the scoring service
//! and returns per-word/per-phoneme results. Callers depend on
//! [`ScoringTransport`] only; two transports exist:
//! - [`AzureRestTransport`]: native async over one pooled HTTP client
//! - [`BlockingScoringTransport`]: any blocking scorer, run on a bounded
//!   worker pool so it never stalls the async runtime

use crate::config::ScoringSettings;
use crate::error::{AssessError, AssessResult};
use crate::models::{
    OverallScores, RawScoringResult, RecognitionStatus, ScoredPhoneme, ScoredWord, WordErrorType,
};
use crate::services::audio_normalizer::TARGET_SAMPLE_RATE;
use crate::utils::preview;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("readaloud-assess/", env!("CARGO_PKG_VERSION"));
const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// Transport to the pronunciation scoring service
#[async_trait]
pub trait ScoringTransport: Send + Sync {
    /// Score a 16 kHz mono WAV recording against `reference_text`
    async fn assess(&self, wav: &[u8], reference_text: &str) -> AssessResult<RawScoringResult>;

    /// Establish connections ahead of the first request (best effort)
    async fn warm_up(&self) {}
}

/// Pronunciation-Assessment header payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssessmentParameters<'a> {
    reference_text: &'a str,
    grading_system: &'static str,
    granularity: &'static str,
    dimension: &'static str,
    enable_miscue: bool,
    enable_prosody_assessment: bool,
}

/// Base64 JSON assessment configuration: phoneme granularity, 0-100 grading,
/// miscue detection on
pub fn assessment_header(reference_text: &str) -> AssessResult<String> {
    let parameters = AssessmentParameters {
        reference_text,
        grading_system: "HundredMark",
        granularity: "Phoneme",
        dimension: "Comprehensive",
        enable_miscue: true,
        enable_prosody_assessment: true,
    };
    let json = serde_json::to_string(&parameters)
        .map_err(|e| AssessError::processing(format!("Failed to encode assessment config: {}", e)))?;
    Ok(BASE64.encode(json))
}

// Wire format of the detailed recognition reply

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: String,
    #[serde(default, rename = "NBest")]
    n_best: Vec<AzureCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureCandidate {
    pronunciation_assessment: AzureOverallAssessment,
    #[serde(default)]
    words: Vec<AzureWord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureOverallAssessment {
    accuracy_score: f64,
    fluency_score: f64,
    completeness_score: f64,
    pron_score: f64,
    /// Not available for every locale
    #[serde(default)]
    prosody_score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureWord {
    word: String,
    pronunciation_assessment: AzureWordAssessment,
    #[serde(default)]
    phonemes: Vec<AzurePhoneme>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureWordAssessment {
    #[serde(default)]
    accuracy_score: Option<f64>,
    error_type: WordErrorType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzurePhoneme {
    phoneme: String,
    pronunciation_assessment: AzurePhonemeAssessment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzurePhonemeAssessment {
    accuracy_score: f64,
}

fn parse_status(raw: &str) -> Option<RecognitionStatus> {
    match raw {
        "Success" => Some(RecognitionStatus::Success),
        "NoMatch" => Some(RecognitionStatus::NoMatch),
        "InitialSilenceTimeout" => Some(RecognitionStatus::InitialSilenceTimeout),
        "BabbleTimeout" => Some(RecognitionStatus::BabbleTimeout),
        "Error" => Some(RecognitionStatus::Error),
        _ => None,
    }
}

fn check_range(what: &str, value: f64) -> AssessResult<f64> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(AssessError::processing(format!(
            "Malformed scoring payload: {} score {} outside [0, 100]",
            what, value
        )))
    }
}

/// Parse a detailed recognition reply into a [`RawScoringResult`].
///
/// Non-success recognition statuses are results, not errors. Anything that
/// does not match the wire format (unknown status, missing candidate, score
/// out of range, unknown error type) is an `AudioProcessing` error.
pub fn parse_azure_response(body: &str) -> AssessResult<RawScoringResult> {
    let response: AzureResponse = serde_json::from_str(body).map_err(|e| {
        AssessError::processing(format!(
            "Malformed scoring payload: {} (body: {})",
            e,
            preview(body, ERROR_BODY_PREVIEW_CHARS)
        ))
    })?;

    let status = parse_status(&response.recognition_status).ok_or_else(|| {
        AssessError::processing_with_status(
            response.recognition_status.clone(),
            "Unknown recognition status",
        )
    })?;

    if !status.is_success() {
        return Ok(RawScoringResult::unrecognized(status));
    }

    let candidate = response.n_best.into_iter().next().ok_or_else(|| {
        AssessError::processing_with_status("Success", "Recognition succeeded without any candidate")
    })?;

    let overall = candidate.pronunciation_assessment;
    let scores = OverallScores::new(
        overall.pron_score,
        overall.accuracy_score,
        overall.fluency_score,
        overall.completeness_score,
        overall.prosody_score,
    )
    .map_err(|e| AssessError::processing(format!("Malformed scoring payload: {}", e)))?;

    let mut words = Vec::with_capacity(candidate.words.len());
    for word in candidate.words {
        let accuracy = match word.pronunciation_assessment.accuracy_score {
            Some(value) => Some(check_range(&word.word, value)?),
            None => None,
        };

        let mut phonemes = Vec::with_capacity(word.phonemes.len());
        for phoneme in word.phonemes {
            let accuracy = check_range(&phoneme.phoneme, phoneme.pronunciation_assessment.accuracy_score)?;
            phonemes.push(ScoredPhoneme {
                phoneme: phoneme.phoneme,
                accuracy,
            });
        }

        words.push(ScoredWord {
            word: word.word,
            accuracy,
            error_type: word.pronunciation_assessment.error_type,
            phonemes,
        });
    }

    Ok(RawScoringResult {
        status,
        recognized_text: response.display_text,
        scores,
        words,
    })
}

/// Native async scoring transport over the speech service's short-audio REST API
pub struct AzureRestTransport {
    http_client: reqwest::Client,
    endpoint: String,
    language_code: String,
    speech_key: String,
}

impl AzureRestTransport {
    /// Build the transport from settings; fails with `Configuration` when the
    /// key or region is missing
    pub fn new(settings: &ScoringSettings) -> AssessResult<Self> {
        let (speech_key, region) = settings.credentials()?;
        let endpoint = format!(
            "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
            region
        );
        Self::with_endpoint(
            endpoint,
            speech_key.to_string(),
            settings.language_code.clone(),
            settings.timeout,
            settings.connect_timeout,
        )
    }

    /// Build the transport against an explicit endpoint URL
    pub fn with_endpoint(
        endpoint: String,
        speech_key: String,
        language_code: String,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> AssessResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AssessError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
            language_code,
            speech_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ScoringTransport for AzureRestTransport {
    async fn assess(&self, wav: &[u8], reference_text: &str) -> AssessResult<RawScoringResult> {
        let header = assessment_header(reference_text)?;

        debug!(
            audio_bytes = wav.len(),
            language = %self.language_code,
            "Sending recording to scoring service"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("language", self.language_code.as_str()), ("format", "detailed")])
            .header("Ocp-Apim-Subscription-Key", &self.speech_key)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/wav; codecs=audio/pcm; samplerate={}", TARGET_SAMPLE_RATE),
            )
            .header(reqwest::header::ACCEPT, "application/json")
            .header("Pronunciation-Assessment", header)
            .body(wav.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AssessError::processing(format!("Scoring request timed out: {}", e))
                } else {
                    AssessError::processing(format!("Scoring service unreachable: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssessError::processing_with_status(status.as_u16().to_string(), e.to_string()))?;

        if !status.is_success() {
            return Err(AssessError::processing_with_status(
                status.as_u16().to_string(),
                preview(&body, ERROR_BODY_PREVIEW_CHARS),
            ));
        }

        parse_azure_response(&body)
    }

    async fn warm_up(&self) {
        // Any HTTP answer means DNS, TCP and TLS are done and the connection is pooled
        match self.http_client.head(&self.endpoint).send().await {
            Ok(response) => debug!(status = %response.status(), "Scoring transport warmed up"),
            Err(e) => warn!(error = %e, "Scoring transport warm-up failed"),
        }
    }
}

/// A scorer that only exists as a blocking call (e.g. a vendor SDK binding)
pub trait BlockingScorer: Send + Sync + 'static {
    fn score_blocking(&self, wav: &[u8], reference_text: &str) -> AssessResult<RawScoringResult>;
}

/// Runs a [`BlockingScorer`] on the blocking thread pool, at most
/// `max_workers` at a time, each bounded by `deadline`
pub struct BlockingScoringTransport<S: BlockingScorer> {
    scorer: Arc<S>,
    permits: Arc<Semaphore>,
    deadline: Duration,
}

impl<S: BlockingScorer> BlockingScoringTransport<S> {
    pub fn new(scorer: S, max_workers: usize, deadline: Duration) -> Self {
        Self {
            scorer: Arc::new(scorer),
            permits: Arc::new(Semaphore::new(max_workers.max(1))),
            deadline,
        }
    }

    /// Pool size from `[scoring] max_blocking_workers`, deadline from
    /// `[scoring] timeout_secs`
    pub fn from_settings(scorer: S, settings: &ScoringSettings) -> Self {
        Self::new(scorer, settings.max_blocking_workers, settings.timeout)
    }

    /// Workers not currently running a scoring call
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

#[async_trait]
impl<S: BlockingScorer> ScoringTransport for BlockingScoringTransport<S> {
    async fn assess(&self, wav: &[u8], reference_text: &str) -> AssessResult<RawScoringResult> {
        let deadline = self.deadline;
        let scorer = Arc::clone(&self.scorer);
        let permits = Arc::clone(&self.permits);
        let wav = wav.to_vec();
        let reference_text = reference_text.to_string();

        let work = async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Err(AssessError::processing("Scoring worker pool closed")),
            };

            // The permit travels with the blocking call, so an abandoned call
            // still counts against the pool until it returns
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                scorer.score_blocking(&wav, &reference_text)
            });

            match handle.await {
                Ok(result) => result,
                Err(e) => Err(AssessError::processing(format!("Scoring worker failed: {}", e))),
            }
        };

        tokio::time::timeout(deadline, work).await.map_err(|_| {
            AssessError::processing(format!("Scoring timed out after {:?}", deadline))
        })?
    }
}

/// Async-safe facade over a [`ScoringTransport`]
#[derive(Clone)]
pub struct ScoringClient {
    transport: Arc<dyn ScoringTransport>,
}

impl ScoringClient {
    pub fn new(transport: Arc<dyn ScoringTransport>) -> Self {
        Self { transport }
    }

    pub async fn warm_up(&self) {
        self.transport.warm_up().await;
    }

    /// Score `wav` (already normalized) against `reference_text`.
    ///
    /// A `Success` reply in which every overall score is zero means the
    /// service found nothing to score; it is reported as
    /// [`RecognitionStatus::NothingScorable`] so it can never be mistaken
    /// for a real zero score downstream.
    pub async fn score(&self, wav: &[u8], reference_text: &str) -> AssessResult<RawScoringResult> {
        if wav.is_empty() {
            return Err(AssessError::AudioFormat("Recording is empty".to_string()));
        }
        let reference_text = reference_text.trim();
        if reference_text.is_empty() {
            return Err(AssessError::InvalidInput("Reference text is empty".to_string()));
        }

        let result = self.transport.assess(wav, reference_text).await?;

        if result.status.is_success() && result.scores.is_all_zero() {
            warn!(
                recognized = %result.recognized_text,
                "Scoring service returned all-zero scores; treating as not recognized"
            );
            return Ok(RawScoringResult::unrecognized(RecognitionStatus::NothingScorable));
        }

        info!(
            status = ?result.status,
            pron_score = result.scores.pronunciation,
            flagged_words = result.flagged_words().count(),
            "Scoring complete"
        );

        Ok(result)
    }
}
