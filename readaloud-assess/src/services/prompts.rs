//! Prompt and narration text builders
//!
//! Everything sent to the generative service as text is assembled here so
//! prompt changes stay in one place.

use crate::config::AssessmentPolicy;
use crate::models::{AssessmentResult, RawScoringResult, WordErrorType, WordFeedback};
use std::fmt::Write as _;

/// System instruction for feedback generation
pub const FEEDBACK_SYSTEM_PROMPT: &str = "\
You are a warm, patient pronunciation coach for children aged 5 to 7 who are \
beginning to read English aloud. Accents, slow pace, pauses and self-corrections \
are normal at this level and are never errors.

Write feedback a young child can follow:
- summaryText: one or two short sentences. Praise the effort first.
- wordFeedback: at most a few words that really need practice. For each, say \
what went wrong in the issue and give one playful, physical tip in the \
suggestion (for example: put your top teeth on your lower lip and buzz: vvv-an).
- prosodyFeedback: one short sentence about rhythm or expression, or omit it.

Only flag a word when the child would be misunderstood or skipped it. Use \
severity \"critical\" or \"minor\" exactly as the user message instructs.";

fn error_type_label(error_type: WordErrorType) -> &'static str {
    match error_type {
        WordErrorType::None => "None",
        WordErrorType::Omission => "Omission",
        WordErrorType::Insertion => "Insertion",
        WordErrorType::Mispronunciation => "Mispronunciation",
        WordErrorType::UnexpectedBreak => "UnexpectedBreak",
        WordErrorType::MissingBreak => "MissingBreak",
        WordErrorType::Monotone => "Monotone",
    }
}

/// Prompt carrying the reference sentence, what was heard, the five overall
/// scores and per-word/per-phoneme detail
pub fn build_analysis_prompt(
    scoring: &RawScoringResult,
    reference_text: &str,
    policy: &AssessmentPolicy,
) -> String {
    let scores = &scoring.scores;
    let mut prompt = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(prompt, "Expected sentence: \"{}\"", reference_text.trim());
    let _ = writeln!(prompt, "Child said: \"{}\"", scoring.recognized_text.trim());
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Scores (0-100): pronunciation {:.0}, accuracy {:.0}, fluency {:.0}, completeness {:.0}, prosody {:.0}",
        scores.pronunciation, scores.accuracy, scores.fluency, scores.completeness, scores.prosody
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Words:");

    for word in &scoring.words {
        let accuracy = word
            .accuracy
            .map(|a| format!("{:.0}", a))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = write!(
            prompt,
            "- {} (accuracy {}, error {})",
            word.word,
            accuracy,
            error_type_label(word.error_type)
        );

        let weak: Vec<String> = word
            .phonemes
            .iter()
            .filter(|p| p.accuracy < 60.0)
            .map(|p| format!("/{}/ {:.0}", p.phoneme, p.accuracy))
            .collect();
        if !weak.is_empty() {
            let _ = write!(prompt, " weak sounds: {}", weak.join(", "));
        }
        let _ = writeln!(prompt);
    }

    let critical: Vec<&str> = policy
        .critical_error_types
        .iter()
        .map(|t| error_type_label(*t))
        .collect();
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Mark a word \"critical\" when its error is one of: {}. Mark every other issue \"minor\".",
        if critical.is_empty() {
            "(none)".to_string()
        } else {
            critical.join(", ")
        }
    );
    let _ = writeln!(
        prompt,
        "Give at most {} wordFeedback entries, most important first.",
        policy.max_word_feedback
    );

    prompt
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Short phrase narrated for one corrected word: `"{word}. {issue} {suggestion}"`
pub fn word_narration_phrase(feedback: &WordFeedback) -> String {
    collapse_whitespace(&format!(
        "{}. {} {}",
        feedback.word, feedback.issue, feedback.suggestion
    ))
}

/// Single utterance covering the summary and up to `max_words` corrections
pub fn combined_narration_text(result: &AssessmentResult, max_words: usize) -> String {
    let mut parts = vec![result.summary_text.trim().to_string()];

    if !result.word_feedback.is_empty() && max_words > 0 {
        parts.push("Let's practice.".to_string());
        parts.extend(
            result
                .word_feedback
                .iter()
                .take(max_words)
                .map(word_narration_phrase),
        );
        parts.push("Great try! Let's read it again together.".to_string());
    }

    collapse_whitespace(&parts.join(" "))
}
