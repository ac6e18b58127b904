//! Feedback generation from raw scoring results
//!
//! Builds one prompt from the scoring detail, asks the generative service for
//! a schema-constrained reply and validates it strictly. Overall scores in the
//! returned [`AssessmentResult`] always come from the scoring service.

use crate::config::AssessmentPolicy;
use crate::error::{AssessError, AssessResult};
use crate::models::{AssessmentResult, OverallScores, RawScoringResult, WordFeedback};
use crate::services::gemini_client::{FeedbackModel, StructuredRequest};
use crate::services::prompts::{build_analysis_prompt, FEEDBACK_SYSTEM_PROMPT};
use crate::utils::preview;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

const LOG_PREVIEW_CHARS: usize = 300;

/// Output schema handed to the generative service
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summaryText": { "type": "STRING" },
            "wordFeedback": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "word": { "type": "STRING" },
                        "issue": { "type": "STRING" },
                        "suggestion": { "type": "STRING" },
                        "severity": { "type": "STRING", "enum": ["critical", "minor"] }
                    },
                    "required": ["word", "issue", "suggestion", "severity"]
                }
            },
            "prosodyFeedback": { "type": "STRING" }
        },
        "required": ["summaryText", "wordFeedback"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackReply {
    summary_text: String,
    word_feedback: Vec<WordFeedback>,
    #[serde(default)]
    prosody_feedback: Option<String>,
}

/// Validate a reply and combine it with the scoring service's scores.
///
/// Rejects malformed JSON, missing fields, unknown severities, a blank
/// summary, and entries with a blank word. Keeps at most `max_word_feedback`
/// entries in reply order.
pub fn parse_feedback_reply(
    json: &str,
    scores: OverallScores,
    max_word_feedback: usize,
) -> Result<AssessmentResult, String> {
    if json.trim().is_empty() {
        return Err("Reply is empty".to_string());
    }

    let reply: FeedbackReply =
        serde_json::from_str(json).map_err(|e| format!("Reply does not match schema: {}", e))?;

    let summary_text = reply.summary_text.trim().to_string();
    if summary_text.is_empty() {
        return Err("summaryText is empty".to_string());
    }

    let mut word_feedback = Vec::with_capacity(reply.word_feedback.len());
    for (index, entry) in reply.word_feedback.into_iter().enumerate() {
        let word = entry.word.trim();
        if word.is_empty() {
            return Err(format!("wordFeedback[{}].word is empty", index));
        }
        word_feedback.push(WordFeedback {
            word: word.to_string(),
            issue: entry.issue.trim().to_string(),
            suggestion: entry.suggestion.trim().to_string(),
            severity: entry.severity,
        });
    }
    word_feedback.truncate(max_word_feedback);

    let prosody_feedback = reply
        .prosody_feedback
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    Ok(AssessmentResult {
        summary_text,
        overall_scores: scores,
        word_feedback,
        prosody_feedback,
    })
}

/// Turns a [`RawScoringResult`] into child-friendly feedback
#[derive(Clone)]
pub struct FeedbackTransformer {
    model: Arc<dyn FeedbackModel>,
    policy: AssessmentPolicy,
}

impl FeedbackTransformer {
    pub fn new(model: Arc<dyn FeedbackModel>, policy: AssessmentPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &AssessmentPolicy {
        &self.policy
    }

    /// Generate feedback for a successful scoring result.
    ///
    /// # Errors
    /// * `InvalidAssessmentResponse` - service failure, empty/blocked reply,
    ///   or a reply that fails validation
    pub async fn analyze(
        &self,
        scoring: &RawScoringResult,
        reference_text: &str,
    ) -> AssessResult<AssessmentResult> {
        let prompt = build_analysis_prompt(scoring, reference_text, &self.policy);
        let request = StructuredRequest {
            system_instruction: FEEDBACK_SYSTEM_PROMPT.to_string(),
            prompt,
            response_schema: response_schema(),
        };

        let reply = match self.model.generate_json(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    error = %e,
                    prompt_preview = %preview(&request.prompt, LOG_PREVIEW_CHARS),
                    "Feedback generation failed"
                );
                return Err(e);
            }
        };

        match parse_feedback_reply(&reply, scoring.scores, self.policy.max_word_feedback) {
            Ok(result) => {
                info!(
                    feedback_items = result.word_feedback.len(),
                    has_prosody = result.prosody_feedback.is_some(),
                    "Feedback generated"
                );
                Ok(result)
            }
            Err(reason) => {
                error!(
                    reason = %reason,
                    prompt_preview = %preview(&request.prompt, LOG_PREVIEW_CHARS),
                    response_preview = %preview(&reply, LOG_PREVIEW_CHARS),
                    "Invalid feedback reply"
                );
                Err(AssessError::InvalidAssessmentResponse(reason))
            }
        }
    }
}
