//! Raw scoring results from the pronunciation-scoring service

use super::assessment::OverallScores;
use serde::{Deserialize, Serialize};

/// Recognition outcome reported by the scoring service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionStatus {
    Success,
    NoMatch,
    InitialSilenceTimeout,
    BabbleTimeout,
    Error,
    /// Reported `Success` but every score was zero
    NothingScorable,
}

impl RecognitionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RecognitionStatus::Success)
    }
}

/// Per-word error classification reported by the scoring service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordErrorType {
    None,
    Omission,
    Insertion,
    Mispronunciation,
    UnexpectedBreak,
    MissingBreak,
    Monotone,
}

/// Phoneme-level accuracy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPhoneme {
    pub phoneme: String,
    pub accuracy: f64,
}

/// Word-level accuracy and miscue classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredWord {
    pub word: String,
    /// Absent for some miscues (e.g. insertions)
    pub accuracy: Option<f64>,
    pub error_type: WordErrorType,
    pub phonemes: Vec<ScoredPhoneme>,
}

/// Everything the scoring service said about one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawScoringResult {
    pub status: RecognitionStatus,
    /// What the service heard
    pub recognized_text: String,
    pub scores: OverallScores,
    pub words: Vec<ScoredWord>,
}

impl RawScoringResult {
    /// Result for a recognition failure (no scores, no words)
    pub fn unrecognized(status: RecognitionStatus) -> Self {
        Self {
            status,
            recognized_text: String::new(),
            scores: OverallScores::zero(),
            words: Vec::new(),
        }
    }

    /// Words the service flagged with any error type
    pub fn flagged_words(&self) -> impl Iterator<Item = &ScoredWord> {
        self.words
            .iter()
            .filter(|w| w.error_type != WordErrorType::None)
    }
}
