//! Data models for readaloud-assess
//!
//! - Assessment results handed to callers and to narration
//! - Raw scoring results returned by the pronunciation-scoring service
//! - Narration asset manifest

pub mod assessment;
pub mod manifest;
pub mod scoring;

pub use assessment::{AssessmentResult, OverallScores, Severity, WordFeedback};
pub use manifest::{AssetManifest, CategoryEntry};
pub use scoring::{RawScoringResult, RecognitionStatus, ScoredPhoneme, ScoredWord, WordErrorType};
