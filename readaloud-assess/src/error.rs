//! Error types for readaloud-assess
//!
//! Two severities matter to callers:
//! - **User-retryable** (`AudioFormat`, `AudioProcessing`): the recording could
//!   not be scored; the child can simply try again.
//! - **Server-side** (everything else): feedback generation, narration or
//!   configuration failed; retrying the recording will not help.

use thiserror::Error;

/// Assessment pipeline error type
#[derive(Debug, Error)]
pub enum AssessError {
    /// Input audio could not be decoded or contained no samples
    #[error("Audio format error: {0}")]
    AudioFormat(String),

    /// Scoring service unreachable, timed out, or returned a non-success payload
    #[error("Audio processing error{}: {message}", format_status(.status))]
    AudioProcessing {
        /// Raw provider status, kept for diagnostics
        status: Option<String>,
        message: String,
    },

    /// Request missing audio or reference text
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Feedback service reply empty, blocked, or missing required fields
    #[error("Invalid assessment response: {0}")]
    InvalidAssessmentResponse(String),

    /// Speech synthesis call failed or returned no audio
    #[error("TTS generation error: {0}")]
    TtsGeneration(String),

    /// Missing or invalid settings (e.g. provider credentials)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Asset category missing or without usable variants
    #[error("Asset category error: {0}")]
    AssetCategory(String),

    /// Asset manifest unreadable/malformed, or preload left a category empty
    #[error("Asset load error: {0}")]
    AssetLoad(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// readaloud-common error
    #[error("Common error: {0}")]
    Common(#[from] readaloud_common::Error),
}

impl AssessError {
    /// Build an `AudioProcessing` error without a provider status
    pub fn processing(message: impl Into<String>) -> Self {
        Self::AudioProcessing {
            status: None,
            message: message.into(),
        }
    }

    /// Build an `AudioProcessing` error carrying the provider's raw status
    pub fn processing_with_status(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AudioProcessing {
            status: Some(status.into()),
            message: message.into(),
        }
    }

    /// True when the end user can fix the problem by recording again
    pub fn is_user_retryable(&self) -> bool {
        matches!(
            self,
            AssessError::AudioFormat(_) | AssessError::AudioProcessing { .. }
        )
    }

    /// Short message safe to show to a child or parent
    pub fn user_message(&self) -> &'static str {
        if self.is_user_retryable() {
            "We couldn't use that recording. Please try again!"
        } else {
            "Something went wrong on our side. Please try again later."
        }
    }
}

fn format_status(status: &Option<String>) -> String {
    status
        .as_deref()
        .map(|s| format!(" (status {})", s))
        .unwrap_or_default()
}

/// Result type for the assessment pipeline
pub type AssessResult<T> = Result<T, AssessError>;
