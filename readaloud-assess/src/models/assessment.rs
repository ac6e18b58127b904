//! Assessment results
//!
//! An `AssessmentResult` is built once per request and is the sole input to
//! narration. It serializes with camelCase field names, the shape the HTTP
//! front end and the generative feedback schema both use.

use serde::{Deserialize, Serialize};

/// Summary shown when the scoring service could not recognize any speech
pub const NOT_HEARD_SUMMARY: &str = "I couldn't hear you clearly. Please try again!";

/// Summary used when the high-score shortcut skips feedback generation
pub const EXCELLENT_SUMMARY: &str = "Excellent! Your pronunciation is perfect!";

/// Overall 0-100 scores reported by the scoring service
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallScores {
    pub pronunciation: f64,
    pub accuracy: f64,
    pub fluency: f64,
    pub completeness: f64,
    pub prosody: f64,
}

impl OverallScores {
    /// Create scores, rejecting any value outside [0, 100] or not finite
    pub fn new(
        pronunciation: f64,
        accuracy: f64,
        fluency: f64,
        completeness: f64,
        prosody: f64,
    ) -> Result<Self, String> {
        let scores = Self {
            pronunciation,
            accuracy,
            fluency,
            completeness,
            prosody,
        };

        for (name, value) in scores.fields() {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(format!("{} score {} outside [0, 100]", name, value));
            }
        }

        Ok(scores)
    }

    /// All five scores at zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// True when every field is zero (provider found nothing to score)
    pub fn is_all_zero(&self) -> bool {
        self.fields().iter().all(|(_, value)| *value == 0.0)
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("pronunciation", self.pronunciation),
            ("accuracy", self.accuracy),
            ("fluency", self.fluency),
            ("completeness", self.completeness),
            ("prosody", self.prosody),
        ]
    }
}

/// Word-level issue severity. Closed set; never inferred beyond these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Wrong or missing word that changes meaning
    Critical,
    /// Sound-level issue that does not block understanding
    Minor,
}

/// Kid-friendly feedback about one word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFeedback {
    pub word: String,
    pub issue: String,
    pub suggestion: String,
    pub severity: Severity,
}

/// Complete assessment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub summary_text: String,
    pub overall_scores: OverallScores,
    pub word_feedback: Vec<WordFeedback>,
    pub prosody_feedback: Option<String>,
}

impl AssessmentResult {
    /// Template result for recordings the scoring service could not recognize
    pub fn not_heard() -> Self {
        Self {
            summary_text: NOT_HEARD_SUMMARY.to_string(),
            overall_scores: OverallScores::zero(),
            word_feedback: Vec::new(),
            prosody_feedback: None,
        }
    }

    /// Template result for readings at or above the high-score threshold
    pub fn excellent(scores: OverallScores) -> Self {
        Self {
            summary_text: EXCELLENT_SUMMARY.to_string(),
            overall_scores: scores,
            word_feedback: Vec::new(),
            prosody_feedback: None,
        }
    }

    /// No word-level corrections to narrate
    pub fn is_perfect(&self) -> bool {
        self.word_feedback.is_empty()
    }
}
