//! Configuration resolution for readaloud-assess
//!
//! Provides multi-tier configuration resolution with CLI → ENV → TOML → default
//! priority. Provider credentials are optional at load time and only required
//! when the real provider clients are built, so a misconfigured key surfaces as
//! a `Configuration` error at startup instead of at the first request.

use crate::error::{AssessError, AssessResult};
use crate::models::WordErrorType;
use readaloud_common::config::{
    load_toml_config, resolve_config_path, resolve_data_folder, resolve_setting, LoggingConfig,
    CONFIG_ENV_VAR, DATA_DIR_ENV_VAR,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SPEECH_KEY_ENV_VAR: &str = "SPEECH_KEY";
pub const SPEECH_REGION_ENV_VAR: &str = "SPEECH_REGION";
pub const GEMINI_API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

/// Bootstrap configuration as written in the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Data folder for assets and narration cache
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scoring: ScoringSection,

    #[serde(default)]
    pub feedback: FeedbackSection,

    #[serde(default)]
    pub narration: NarrationSection,

    #[serde(default)]
    pub policy: AssessmentPolicy,
}

/// `[scoring]` section
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSection {
    #[serde(default)]
    pub speech_key: Option<String>,
    #[serde(default)]
    pub speech_region: Option<String>,
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_blocking_workers")]
    pub max_blocking_workers: usize,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            speech_key: None,
            speech_region: None,
            language_code: default_language_code(),
            timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_blocking_workers: default_max_blocking_workers(),
        }
    }
}

/// `[feedback]` section
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackSection {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_feedback_model")]
    pub model_name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedbackSection {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name: default_feedback_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// `[narration]` section
#[derive(Debug, Clone, Deserialize)]
pub struct NarrationSection {
    #[serde(default = "default_true")]
    pub enable_composer: bool,
    #[serde(default = "default_tts_model")]
    pub tts_model_name: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_voice_style_prompt")]
    pub voice_style_prompt: String,
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default = "default_cache_size_mb")]
    pub cache_size_mb: u64,
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
    #[serde(default = "default_headroom_db")]
    pub headroom_db: f32,
    #[serde(default = "default_max_narrated_words")]
    pub max_narrated_words: usize,
    /// Fixed seed for variant selection (reproducible narration)
    #[serde(default)]
    pub variant_seed: Option<u64>,
}

impl Default for NarrationSection {
    fn default() -> Self {
        Self {
            enable_composer: true,
            tts_model_name: default_tts_model(),
            voice_id: default_voice_id(),
            voice_style_prompt: default_voice_style_prompt(),
            manifest_path: None,
            assets_dir: None,
            cache_dir: None,
            cache_size_mb: default_cache_size_mb(),
            output_sample_rate: default_output_sample_rate(),
            headroom_db: default_headroom_db(),
            max_narrated_words: default_max_narrated_words(),
            variant_seed: None,
        }
    }
}

/// Feedback policy (`[policy]` section)
///
/// The shortcut threshold and severity rules are policy, not constants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssessmentPolicy {
    /// Pronunciation score at or above which feedback generation is skipped
    #[serde(default = "default_high_score_threshold")]
    pub high_score_threshold: f64,
    /// Provider error types the feedback prompt treats as critical
    #[serde(default = "default_critical_error_types")]
    pub critical_error_types: Vec<WordErrorType>,
    /// Maximum word feedback entries kept from a reply
    #[serde(default = "default_max_word_feedback")]
    pub max_word_feedback: usize,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            high_score_threshold: default_high_score_threshold(),
            critical_error_types: default_critical_error_types(),
            max_word_feedback: default_max_word_feedback(),
        }
    }
}

fn default_language_code() -> String {
    "en-IN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_blocking_workers() -> usize {
    4
}

fn default_feedback_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_true() -> bool {
    true
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_voice_id() -> String {
    "Kore".to_string()
}

fn default_voice_style_prompt() -> String {
    "Say warmly and cheerfully, like a patient teacher talking to a six-year-old:".to_string()
}

fn default_cache_size_mb() -> u64 {
    100
}

fn default_output_sample_rate() -> u32 {
    24000
}

fn default_headroom_db() -> f32 {
    0.1
}

fn default_max_narrated_words() -> usize {
    2
}

fn default_high_score_threshold() -> f64 {
    90.0
}

fn default_critical_error_types() -> Vec<WordErrorType> {
    vec![
        WordErrorType::Omission,
        WordErrorType::Insertion,
        WordErrorType::Mispronunciation,
    ]
}

fn default_max_word_feedback() -> usize {
    3
}

/// Scoring service settings
#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub speech_key: Option<String>,
    pub speech_region: Option<String>,
    pub language_code: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_blocking_workers: usize,
}

impl ScoringSettings {
    /// Key and region, or a `Configuration` error naming where to set them
    pub fn credentials(&self) -> AssessResult<(&str, &str)> {
        let key = self.speech_key.as_deref().ok_or_else(|| {
            missing_setting("Speech service key", SPEECH_KEY_ENV_VAR, "[scoring] speech_key")
        })?;
        let region = self.speech_region.as_deref().ok_or_else(|| {
            missing_setting(
                "Speech service region",
                SPEECH_REGION_ENV_VAR,
                "[scoring] speech_region",
            )
        })?;
        Ok((key, region))
    }
}

/// Generative feedback service settings
#[derive(Debug, Clone)]
pub struct FeedbackSettings {
    pub api_key: Option<String>,
    pub model_name: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl FeedbackSettings {
    pub fn api_key(&self) -> AssessResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            missing_setting("Gemini API key", GEMINI_API_KEY_ENV_VAR, "[feedback] api_key")
        })
    }
}

/// Narration settings with all paths resolved against the data folder
#[derive(Debug, Clone)]
pub struct NarrationSettings {
    pub enable_composer: bool,
    pub tts_model_name: String,
    pub voice_id: String,
    pub voice_style_prompt: String,
    pub manifest_path: PathBuf,
    pub assets_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub cache_size_bytes: u64,
    pub output_sample_rate: u32,
    pub headroom_db: f32,
    pub max_narrated_words: usize,
    pub variant_seed: Option<u64>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct AssessConfig {
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
    pub scoring: ScoringSettings,
    pub feedback: FeedbackSettings,
    pub narration: NarrationSettings,
    pub policy: AssessmentPolicy,
}

impl AssessConfig {
    /// Load the TOML file (if any) and resolve every setting.
    ///
    /// **Priority:** CLI → ENV → TOML → built-in default
    pub fn load(cli_config: Option<&Path>, cli_data_dir: Option<&Path>) -> AssessResult<Self> {
        let config_path = resolve_config_path(cli_config, CONFIG_ENV_VAR);
        let toml_config: TomlConfig = load_toml_config(config_path.as_deref())?;

        let data_dir = resolve_data_folder(
            cli_data_dir,
            DATA_DIR_ENV_VAR,
            toml_config.data_dir.as_deref(),
        );

        Self::from_toml(toml_config, data_dir)
    }

    /// Resolve a parsed TOML config against a data folder and the environment
    pub fn from_toml(toml_config: TomlConfig, data_dir: PathBuf) -> AssessResult<Self> {
        let TomlConfig {
            data_dir: _,
            logging,
            scoring,
            feedback,
            narration,
            policy,
        } = toml_config;

        let scoring = ScoringSettings {
            speech_key: resolve_setting(
                "Speech service key",
                SPEECH_KEY_ENV_VAR,
                scoring.speech_key.as_deref(),
            ),
            speech_region: resolve_setting(
                "Speech service region",
                SPEECH_REGION_ENV_VAR,
                scoring.speech_region.as_deref(),
            ),
            language_code: scoring.language_code,
            timeout: Duration::from_secs(scoring.timeout_secs),
            connect_timeout: Duration::from_secs(scoring.connect_timeout_secs),
            max_blocking_workers: scoring.max_blocking_workers,
        };

        let feedback = FeedbackSettings {
            api_key: resolve_setting(
                "Gemini API key",
                GEMINI_API_KEY_ENV_VAR,
                feedback.api_key.as_deref(),
            ),
            model_name: feedback.model_name,
            temperature: feedback.temperature,
            max_output_tokens: feedback.max_output_tokens,
            timeout: Duration::from_secs(feedback.timeout_secs),
        };

        let assets_dir = narration
            .assets_dir
            .unwrap_or_else(|| data_dir.join("tts_assets"));
        let narration = NarrationSettings {
            enable_composer: narration.enable_composer,
            tts_model_name: narration.tts_model_name,
            voice_id: narration.voice_id,
            voice_style_prompt: narration.voice_style_prompt,
            manifest_path: narration
                .manifest_path
                .unwrap_or_else(|| assets_dir.join("manifest.json")),
            assets_dir,
            cache_dir: narration
                .cache_dir
                .unwrap_or_else(|| data_dir.join("tts_cache")),
            cache_size_bytes: narration.cache_size_mb.saturating_mul(1024 * 1024),
            output_sample_rate: narration.output_sample_rate,
            headroom_db: narration.headroom_db,
            max_narrated_words: narration.max_narrated_words,
            variant_seed: narration.variant_seed,
        };

        let config = Self {
            data_dir,
            logging,
            scoring,
            feedback,
            narration,
            policy,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AssessResult<()> {
        let threshold = self.policy.high_score_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(AssessError::Configuration(format!(
                "high_score_threshold {} outside [0, 100]",
                threshold
            )));
        }
        if self.narration.cache_size_bytes == 0 {
            return Err(AssessError::Configuration(
                "cache_size_mb must be greater than 0".to_string(),
            ));
        }
        if self.narration.output_sample_rate == 0 {
            return Err(AssessError::Configuration(
                "output_sample_rate must be greater than 0".to_string(),
            ));
        }
        if !self.narration.headroom_db.is_finite() || self.narration.headroom_db < 0.0 {
            return Err(AssessError::Configuration(format!(
                "headroom_db {} must be >= 0",
                self.narration.headroom_db
            )));
        }
        if self.scoring.max_blocking_workers == 0 {
            return Err(AssessError::Configuration(
                "max_blocking_workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn missing_setting(name: &str, env_var: &str, toml_key: &str) -> AssessError {
    AssessError::Configuration(format!(
        "{} not configured. Please configure using one of:\n\
         1. Environment: {}=your-value\n\
         2. TOML config: {} = \"your-value\"",
        name, env_var, toml_key
    ))
}
