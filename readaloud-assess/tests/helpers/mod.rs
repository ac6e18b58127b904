//! Test Helper Utilities
//!
//! Shared utilities for testing readaloud-assess

#![allow(dead_code)]

pub mod assets;
pub mod audio_generator;
pub mod fakes;
pub mod ogg_opus;

// Re-export commonly used items
pub use assets::write_assets;
pub use audio_generator::{generate_test_wav, generate_wav_bytes, recording_bytes, wav_info, AudioConfig};
pub use ogg_opus::{ogg_opus_bytes, OPUS_FRAME_SAMPLES};
pub use fakes::{
    backends, red_van_scoring, scores, test_config, FakeFeedback, FakeScoring, FakeSpeech,
    RED_VAN_FEEDBACK,
};
