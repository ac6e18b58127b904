//! Pipeline components
//!
//! Leaves first: audio normalization, scoring, feedback generation, narration
//! assets, narration cache, composition, and the orchestrator that wires them.

pub mod asset_library;
pub mod audio_normalizer;
pub mod feedback_transformer;
pub mod gemini_client;
pub mod narration_cache;
pub mod narration_composer;
pub mod orchestrator;
pub mod prompts;
pub mod scoring_client;

pub use asset_library::{AssetLibrary, AudioClip};
pub use feedback_transformer::FeedbackTransformer;
pub use gemini_client::{FeedbackModel, GeminiClient, SpeechSynthesizer, StructuredRequest, SynthesizedAudio};
pub use narration_cache::{CacheStats, NarrationCache};
pub use narration_composer::{CachedComposer, ComposerSettings, Composition, DirectSynthesizer, Narrator, SegmentSource};
pub use orchestrator::{AssessmentOrchestrator, Backends};
pub use scoring_client::{
    AzureRestTransport, BlockingScorer, BlockingScoringTransport, ScoringClient, ScoringTransport,
};
