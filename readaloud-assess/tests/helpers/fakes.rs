//! In-process stand-ins for the external services
//!
//! Every fake counts its calls so tests can assert "never invoked" and
//! "at most once" directly.

use async_trait::async_trait;
use readaloud_assess::config::{AssessConfig, TomlConfig};
use readaloud_assess::models::{
    OverallScores, RawScoringResult, RecognitionStatus, ScoredPhoneme, ScoredWord, WordErrorType,
};
use readaloud_assess::services::{
    Backends, FeedbackModel, ScoringTransport, SpeechSynthesizer, StructuredRequest, SynthesizedAudio,
};
use readaloud_assess::{AssessError, AssessResult};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scoring service returning a fixed result
pub struct FakeScoring {
    result: RawScoringResult,
    pub calls: AtomicUsize,
    pub warm_ups: AtomicUsize,
    pub last_reference: Mutex<Option<String>>,
}

impl FakeScoring {
    pub fn new(result: RawScoringResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
            warm_ups: AtomicUsize::new(0),
            last_reference: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoringTransport for FakeScoring {
    async fn assess(&self, wav: &[u8], reference_text: &str) -> AssessResult<RawScoringResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(wav.starts_with(b"RIFF"), "scorer must receive WAV");
        *self.last_reference.lock().unwrap() = Some(reference_text.to_string());
        Ok(self.result.clone())
    }

    async fn warm_up(&self) {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
    }
}

/// Feedback service returning a fixed reply (or a fixed failure)
pub struct FakeFeedback {
    reply: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeFeedback {
    pub fn replying(json: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(json.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedbackModel for FakeFeedback {
    async fn generate_json(&self, request: &StructuredRequest) -> AssessResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!request.prompt.is_empty());
        self.reply
            .clone()
            .map_err(AssessError::InvalidAssessmentResponse)
    }
}

/// Speech synthesizer producing a short tone per request.
///
/// Fails for any text containing one of `fail_on`, or for everything when
/// `fail_all` is set.
pub struct FakeSpeech {
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
    fail_on: Vec<String>,
    fail_all: bool,
}

impl FakeSpeech {
    pub fn new() -> Arc<Self> {
        Self::build(Vec::new(), false)
    }

    pub fn failing_on(words: &[&str]) -> Arc<Self> {
        Self::build(words.iter().map(|w| w.to_string()).collect(), false)
    }

    pub fn failing() -> Arc<Self> {
        Self::build(Vec::new(), true)
    }

    fn build(fail_on: Vec<String>, fail_all: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
            fail_on,
            fail_all,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _voice_id: &str, _style_hint: &str) -> AssessResult<SynthesizedAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());

        if self.fail_all || self.fail_on.iter().any(|w| text.contains(w.as_str())) {
            return Err(AssessError::TtsGeneration(format!("synthesis refused: {}", text)));
        }

        // 0.1 s of 24 kHz tone, pitch varying with the text
        let frequency = 200.0 + (text.len() % 50) as f32 * 10.0;
        let pcm: Vec<u8> = (0..2400)
            .flat_map(|i| {
                let t = i as f32 / 24000.0;
                let sample = ((2.0 * std::f32::consts::PI * frequency * t).sin() * 6000.0) as i16;
                sample.to_le_bytes()
            })
            .collect();

        Ok(SynthesizedAudio {
            pcm,
            sample_rate: 24000,
        })
    }
}

pub fn backends(
    scoring: &Arc<FakeScoring>,
    feedback: &Arc<FakeFeedback>,
    speech: &Arc<FakeSpeech>,
) -> Backends {
    Backends {
        scoring: scoring.clone(),
        feedback: feedback.clone(),
        speech: speech.clone(),
    }
}

/// Config rooted at `data_dir` with reproducible variant selection
pub fn test_config(data_dir: &Path) -> AssessConfig {
    let mut config = AssessConfig::from_toml(TomlConfig::default(), data_dir.to_path_buf())
        .expect("default config is valid");
    config.narration.variant_seed = Some(7);
    config
}

pub fn scores(pronunciation: f64) -> OverallScores {
    OverallScores::new(pronunciation, 50.0, 90.0, 100.0, 80.0).unwrap()
}

/// Scoring for "I have a red van" read as "I have a red wan"
pub fn red_van_scoring() -> RawScoringResult {
    let word = |word: &str, accuracy: f64, error_type: WordErrorType| ScoredWord {
        word: word.to_string(),
        accuracy: Some(accuracy),
        error_type,
        phonemes: Vec::new(),
    };

    RawScoringResult {
        status: RecognitionStatus::Success,
        recognized_text: "I have a red wan.".to_string(),
        scores: scores(55.0),
        words: vec![
            word("i", 98.0, WordErrorType::None),
            word("have", 96.0, WordErrorType::None),
            word("a", 97.0, WordErrorType::None),
            word("red", 94.0, WordErrorType::None),
            ScoredWord {
                word: "van".to_string(),
                accuracy: Some(22.0),
                error_type: WordErrorType::Mispronunciation,
                phonemes: vec![
                    ScoredPhoneme {
                        phoneme: "v".to_string(),
                        accuracy: 5.0,
                    },
                    ScoredPhoneme {
                        phoneme: "ae".to_string(),
                        accuracy: 85.0,
                    },
                    ScoredPhoneme {
                        phoneme: "n".to_string(),
                        accuracy: 92.0,
                    },
                ],
            },
        ],
    }
}

/// Reply a feedback model would give for [`red_van_scoring`]
pub const RED_VAN_FEEDBACK: &str = r#"{
    "summaryText": "Great job reading all five words! Let's make the 'v' in van buzz.",
    "wordFeedback": [
        {
            "word": "van",
            "issue": "You said 'wan'.",
            "suggestion": "Put your top teeth on your lower lip and buzz: vvv-an.",
            "severity": "critical"
        }
    ],
    "prosodyFeedback": "Nice steady voice!"
}"#;
