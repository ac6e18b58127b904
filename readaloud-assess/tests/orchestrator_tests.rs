//! End-to-end tests for assessment and narration with in-process service fakes

mod helpers;

use futures::future::join_all;
use helpers::*;
use readaloud_assess::config::AssessConfig;
use readaloud_assess::models::{AssessmentResult, RawScoringResult, RecognitionStatus, Severity};
use readaloud_assess::{AppContext, AssessError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const RED_VAN: &str = "I have a red van";

/// Asset setup for a test
#[derive(Clone, Copy, PartialEq)]
enum Assets {
    Complete,
    MissingClosing,
    None,
}

struct Harness {
    _data_dir: TempDir,
    scoring: Arc<FakeScoring>,
    feedback: Arc<FakeFeedback>,
    speech: Arc<FakeSpeech>,
    context: AppContext,
}

fn harness_with(
    scoring: RawScoringResult,
    feedback: Arc<FakeFeedback>,
    speech: Arc<FakeSpeech>,
    assets: Assets,
    adjust: impl FnOnce(&mut AssessConfig),
) -> Harness {
    let data_dir = TempDir::new().unwrap();
    let mut config = test_config(data_dir.path());
    adjust(&mut config);

    match assets {
        Assets::Complete => {
            write_assets(&config.narration.assets_dir, true);
        }
        Assets::MissingClosing => {
            write_assets(&config.narration.assets_dir, false);
        }
        Assets::None => {}
    }

    let scoring = FakeScoring::new(scoring);
    let fakes = backends(&scoring, &feedback, &speech);
    let context = AppContext::with_backend_factory(config, Arc::new(move |_| Ok(fakes.clone())));

    Harness {
        _data_dir: data_dir,
        scoring,
        feedback,
        speech,
        context,
    }
}

fn harness(scoring: RawScoringResult, assets: Assets) -> Harness {
    harness_with(
        scoring,
        FakeFeedback::replying(RED_VAN_FEEDBACK),
        FakeSpeech::new(),
        assets,
        |_| {},
    )
}

fn with_pronunciation(pronunciation: f64) -> RawScoringResult {
    let mut result = red_van_scoring();
    result.scores = scores(pronunciation);
    result
}

fn assert_scores_in_range(result: &AssessmentResult) {
    let s = result.overall_scores;
    for value in [s.pronunciation, s.accuracy, s.fluency, s.completeness, s.prosody] {
        assert!((0.0..=100.0).contains(&value), "score {} out of range", value);
    }
}

#[tokio::test]
async fn test_red_van_gets_critical_feedback_and_three_part_narration() {
    let h = harness(red_van_scoring(), Assets::Complete);
    let orchestrator = h.context.orchestrator().await.unwrap();
    assert_eq!(orchestrator.narrator_name(), "cached-composer");

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();

    assert_eq!(h.scoring.calls(), 1);
    assert_eq!(h.feedback.calls(), 1);
    assert_eq!(
        h.scoring.last_reference.lock().unwrap().as_deref(),
        Some(RED_VAN)
    );

    let van = result
        .word_feedback
        .iter()
        .find(|f| f.word == "van")
        .expect("feedback for 'van'");
    assert_eq!(van.severity, Severity::Critical);
    assert_eq!(result.overall_scores.pronunciation, 55.0);
    assert_scores_in_range(&result);

    let wav = orchestrator.narrate(&result).await.expect("narration audio");
    let (rate, channels, frames) = wav_info(&wav);
    assert_eq!(rate, 24000);
    assert_eq!(channels, 1);
    // intro (0.2 s) + one word (0.1 s) + closing (0.2 s)
    assert!(frames > 10_000, "expected three segments, got {} frames", frames);
    assert_eq!(h.speech.calls(), 1);
    assert!(h.speech.texts.lock().unwrap()[0].starts_with("van."));
}

#[tokio::test]
async fn test_high_score_skips_feedback_and_narrates_perfect_clip() {
    let h = harness(with_pronunciation(95.0), Assets::Complete);
    let orchestrator = h.context.orchestrator().await.unwrap();

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();

    assert_eq!(h.feedback.calls(), 0);
    assert_eq!(result, AssessmentResult::excellent(scores(95.0)));
    assert!(result.word_feedback.is_empty());

    let wav = orchestrator.narrate(&result).await.expect("narration audio");
    let (_, _, frames) = wav_info(&wav);
    // A single 0.2 s perfect clip at 24 kHz
    assert!((4000..=5600).contains(&frames), "got {} frames", frames);
    assert_eq!(h.speech.calls(), 0);
}

#[tokio::test]
async fn test_threshold_is_inclusive_and_configurable() {
    let h = harness_with(
        with_pronunciation(55.0),
        FakeFeedback::replying(RED_VAN_FEEDBACK),
        FakeSpeech::new(),
        Assets::None,
        |config| config.policy.high_score_threshold = 55.0,
    );
    let orchestrator = h.context.orchestrator().await.unwrap();

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
    assert!(result.is_perfect());
    assert_eq!(h.feedback.calls(), 0);
}

#[tokio::test]
async fn test_unrecognized_speech_never_calls_feedback() {
    for status in [
        RecognitionStatus::NoMatch,
        RecognitionStatus::InitialSilenceTimeout,
        RecognitionStatus::BabbleTimeout,
    ] {
        let h = harness(RawScoringResult::unrecognized(status), Assets::None);
        let orchestrator = h.context.orchestrator().await.unwrap();

        let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
        assert_eq!(result, AssessmentResult::not_heard());
        assert_eq!(h.feedback.calls(), 0);
    }
}

#[tokio::test]
async fn test_all_zero_scores_treated_as_not_heard() {
    let mut zero = red_van_scoring();
    zero.scores = readaloud_assess::models::OverallScores::zero();

    let h = harness(zero, Assets::None);
    let orchestrator = h.context.orchestrator().await.unwrap();

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
    assert_eq!(result.summary_text, "I couldn't hear you clearly. Please try again!");
    assert!(result.word_feedback.is_empty());
    assert_eq!(h.feedback.calls(), 0);
}

#[tokio::test]
async fn test_scores_always_in_range() {
    for pronunciation in [0.5, 42.0, 89.9, 90.0, 100.0] {
        let h = harness(with_pronunciation(pronunciation), Assets::None);
        let orchestrator = h.context.orchestrator().await.unwrap();

        let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
        assert_scores_in_range(&result);
        assert_eq!(result.overall_scores.pronunciation, pronunciation);
    }
}

#[tokio::test]
async fn test_undecodable_audio_is_retryable_and_not_scored() {
    let h = harness(red_van_scoring(), Assets::None);
    let orchestrator = h.context.orchestrator().await.unwrap();

    let err = orchestrator.assess(b"definitely not audio", RED_VAN).await.unwrap_err();
    assert!(matches!(err, AssessError::AudioFormat(_)));
    assert!(err.is_user_retryable());
    assert_eq!(h.scoring.calls(), 0);
}

#[tokio::test]
async fn test_opus_recording_reaches_scorer() {
    let h = harness(red_van_scoring(), Assets::None);
    let orchestrator = h.context.orchestrator().await.unwrap();

    let result = orchestrator.assess(&ogg_opus_bytes(25), RED_VAN).await.unwrap();
    assert_eq!(h.scoring.calls(), 1);
    assert_eq!(h.feedback.calls(), 1);
    assert!(!result.word_feedback.is_empty());
}

#[tokio::test]
async fn test_blank_reference_text_rejected() {
    let h = harness(red_van_scoring(), Assets::None);
    let orchestrator = h.context.orchestrator().await.unwrap();

    let err = orchestrator.assess(&recording_bytes(), "   ").await.unwrap_err();
    assert!(matches!(err, AssessError::InvalidInput(_)));
    assert_eq!(h.scoring.calls(), 0);
}

#[tokio::test]
async fn test_feedback_failure_is_server_side() {
    let h = harness_with(
        red_van_scoring(),
        FakeFeedback::failing("Reply contained zero candidates"),
        FakeSpeech::new(),
        Assets::None,
        |_| {},
    );
    let orchestrator = h.context.orchestrator().await.unwrap();

    let err = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap_err();
    assert!(matches!(err, AssessError::InvalidAssessmentResponse(_)));
    assert!(!err.is_user_retryable());
}

#[tokio::test]
async fn test_malformed_feedback_reply_rejected() {
    let h = harness_with(
        red_van_scoring(),
        FakeFeedback::replying(r#"{"summaryText": "Hi", "wordFeedback": [{"word": "van", "issue": "x", "suggestion": "y", "severity": "severe"}]}"#),
        FakeSpeech::new(),
        Assets::None,
        |_| {},
    );
    let orchestrator = h.context.orchestrator().await.unwrap();

    let err = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap_err();
    assert!(matches!(err, AssessError::InvalidAssessmentResponse(_)));
}

#[tokio::test]
async fn test_missing_closing_category_falls_back_to_direct_synthesis() {
    let h = harness(red_van_scoring(), Assets::MissingClosing);
    let orchestrator = h.context.orchestrator().await.unwrap();
    assert_eq!(orchestrator.narrator_name(), "direct-synthesizer");

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
    let wav = orchestrator.narrate(&result).await.expect("fallback narration");
    assert!(wav.starts_with(b"RIFF"));

    // One combined utterance, not per-word clips
    assert_eq!(h.speech.calls(), 1);
    let texts = h.speech.texts.lock().unwrap();
    assert!(texts[0].starts_with("Great job reading all five words!"));
    assert!(texts[0].contains("van."));
}

#[tokio::test]
async fn test_narration_failure_degrades_to_no_audio() {
    let h = harness_with(
        red_van_scoring(),
        FakeFeedback::replying(RED_VAN_FEEDBACK),
        FakeSpeech::failing(),
        Assets::None,
        |_| {},
    );
    let orchestrator = h.context.orchestrator().await.unwrap();

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
    assert!(!result.word_feedback.is_empty());
    assert!(orchestrator.narrate(&result).await.is_none());
}

#[tokio::test]
async fn test_composer_disabled_uses_direct_synthesis() {
    let h = harness_with(
        red_van_scoring(),
        FakeFeedback::replying(RED_VAN_FEEDBACK),
        FakeSpeech::new(),
        Assets::Complete,
        |config| config.narration.enable_composer = false,
    );
    let orchestrator = h.context.orchestrator().await.unwrap();
    assert_eq!(orchestrator.narrator_name(), "direct-synthesizer");
}

#[tokio::test]
async fn test_spawned_narration_matches_inline() {
    let h = harness(with_pronunciation(95.0), Assets::Complete);
    let orchestrator = h.context.orchestrator().await.unwrap();

    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();
    let spawned = orchestrator.spawn_narration(result.clone()).await.unwrap();

    assert!(spawned.is_some());
    assert_eq!(h.speech.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_access_initializes_once() {
    let data_dir = TempDir::new().unwrap();
    let config = test_config(data_dir.path());
    write_assets(&config.narration.assets_dir, true);

    let scoring = FakeScoring::new(red_van_scoring());
    let fakes = backends(&scoring, &FakeFeedback::replying(RED_VAN_FEEDBACK), &FakeSpeech::new());
    let factory_calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&factory_calls);
    let context = AppContext::with_backend_factory(
        config,
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(fakes.clone())
        }),
    );
    assert!(!context.is_initialized());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let context = context.clone();
            tokio::spawn(async move { context.orchestrator().await })
        })
        .collect();

    let orchestrators: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
    assert_eq!(scoring.warm_ups.load(Ordering::SeqCst), 1);
    assert!(orchestrators
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert!(context.is_initialized());
}

#[tokio::test]
async fn test_failed_initialization_is_retried() {
    let data_dir = TempDir::new().unwrap();
    let config = test_config(data_dir.path());

    let scoring = FakeScoring::new(red_van_scoring());
    let fakes = backends(&scoring, &FakeFeedback::replying(RED_VAN_FEEDBACK), &FakeSpeech::new());
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&attempts);
    let context = AppContext::with_backend_factory(
        config,
        Arc::new(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AssessError::Configuration("SPEECH_KEY not configured".to_string()))
            } else {
                Ok(fakes.clone())
            }
        }),
    );

    assert!(matches!(
        context.orchestrator().await,
        Err(AssessError::Configuration(_))
    ));
    assert!(context.orchestrator().await.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

struct RecordedScorer(RawScoringResult);

impl readaloud_assess::services::BlockingScorer for RecordedScorer {
    fn score_blocking(
        &self,
        wav: &[u8],
        _reference_text: &str,
    ) -> readaloud_assess::AssessResult<RawScoringResult> {
        assert!(wav.starts_with(b"RIFF"));
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_blocking_scorer_backend_uses_configured_pool() {
    use readaloud_assess::services::BlockingScoringTransport;

    let data_dir = TempDir::new().unwrap();
    let mut config = test_config(data_dir.path());
    config.scoring.max_blocking_workers = 3;

    let feedback = FakeFeedback::replying(RED_VAN_FEEDBACK);
    let speech = FakeSpeech::new();
    let pool_sizes = Arc::new(std::sync::Mutex::new(Vec::new()));

    let seen = Arc::clone(&pool_sizes);
    let context = AppContext::with_backend_factory(
        config,
        Arc::new(move |config: &AssessConfig| {
            let transport =
                BlockingScoringTransport::from_settings(RecordedScorer(red_van_scoring()), &config.scoring);
            seen.lock().unwrap().push(transport.available_workers());
            Ok::<_, AssessError>(readaloud_assess::Backends {
                scoring: Arc::new(transport),
                feedback: feedback.clone(),
                speech: speech.clone(),
            })
        }),
    );

    let orchestrator = context.orchestrator().await.unwrap();
    let result = orchestrator.assess(&recording_bytes(), RED_VAN).await.unwrap();

    assert_eq!(*pool_sizes.lock().unwrap(), vec![3]);
    assert_eq!(result.overall_scores.pronunciation, 55.0);
}
