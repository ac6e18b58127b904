//! Generative language service client
//!
//! One REST client backs two roles:
//! - [`FeedbackModel`]: schema-constrained JSON generation for assessment feedback
//! - [`SpeechSynthesizer`]: single-voice speech synthesis for narration
//!
//! Both go through `models/{model}:generateContent`; speech replies carry
//! base64 16-bit little-endian PCM in `inlineData`.

use crate::config::FeedbackSettings;
use crate::error::{AssessError, AssessResult};
use crate::utils::preview;
use crate::utils::wav::pcm16le_to_wav;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const USER_AGENT: &str = concat!("readaloud-assess/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_PREVIEW_CHARS: usize = 500;

/// Sample rate assumed when the audio mime type does not state one
pub const DEFAULT_TTS_SAMPLE_RATE: u32 = 24000;

/// One schema-constrained generation request
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub system_instruction: String,
    pub prompt: String,
    /// Response schema in the service's OpenAPI subset (uppercase type names)
    pub response_schema: serde_json::Value,
}

/// Generative service returning JSON text that conforms to a schema
#[async_trait]
pub trait FeedbackModel: Send + Sync {
    /// Raw JSON text of the first candidate.
    ///
    /// # Errors
    /// * `InvalidAssessmentResponse` - request failed, prompt blocked, zero
    ///   candidates, or a candidate without text
    async fn generate_json(&self, request: &StructuredRequest) -> AssessResult<String>;
}

/// Mono 16-bit little-endian PCM returned by speech synthesis
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

impl SynthesizedAudio {
    /// Wrap the PCM in a WAV container
    pub fn to_wav(&self) -> AssessResult<Vec<u8>> {
        pcm16le_to_wav(&self.pcm, self.sample_rate, 1)
            .map_err(|e| AssessError::TtsGeneration(format!("Failed to wrap PCM as WAV: {}", e)))
    }
}

/// Speech synthesis service
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text` with `voice_id`; `style_hint` (may be empty) steers the delivery.
    ///
    /// # Errors
    /// * `TtsGeneration` - request failed or the reply carried no audio
    async fn synthesize(&self, text: &str, voice_id: &str, style_hint: &str) -> AssessResult<SynthesizedAudio>;
}

// Request wire format

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart>,
}

impl Content {
    fn user(text: String) -> Self {
        Self {
            role: Some("user"),
            parts: vec![TextPart { text }],
        }
    }

    fn system(text: String) -> Self {
        Self {
            role: None,
            parts: vec![TextPart { text }],
        }
    }
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

// Response wire format

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

fn parse_reply(body: &str) -> Result<GenerateContentResponse, String> {
    let reply: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| format!("Malformed reply: {} (body: {})", e, preview(body, ERROR_BODY_PREVIEW_CHARS)))?;

    if let Some(reason) = reply
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(format!("Prompt blocked: {}", reason));
    }

    if reply.candidates.is_empty() {
        return Err("Reply contained zero candidates".to_string());
    }

    Ok(reply)
}

fn first_parts(reply: &GenerateContentResponse) -> Result<&[ResponsePart], String> {
    let candidate = reply
        .candidates
        .first()
        .ok_or_else(|| "Reply contained zero candidates".to_string())?;

    match candidate.content.as_ref() {
        Some(content) if !content.parts.is_empty() => Ok(&content.parts),
        _ => Err(format!(
            "Candidate has no content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )),
    }
}

/// Concatenated text of the first candidate
pub fn extract_text(body: &str) -> Result<String, String> {
    let reply = parse_reply(body)?;

    let text: String = first_parts(&reply)?
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        return Err("Candidate text is empty".to_string());
    }

    if let Some(usage) = &reply.usage_metadata {
        debug!(
            prompt_tokens = usage.prompt_token_count,
            output_tokens = usage.candidates_token_count,
            "Generation usage"
        );
    }

    Ok(text)
}

/// First inline audio part of the first candidate
pub fn extract_audio(body: &str) -> Result<SynthesizedAudio, String> {
    let reply = parse_reply(body)?;

    let inline = first_parts(&reply)?
        .iter()
        .find_map(|part| part.inline_data.as_ref())
        .ok_or_else(|| "Reply contained no audio".to_string())?;

    let pcm = BASE64
        .decode(inline.data.as_bytes())
        .map_err(|e| format!("Audio payload is not valid base64: {}", e))?;

    if pcm.len() < 2 {
        return Err("Audio payload is empty".to_string());
    }

    Ok(SynthesizedAudio {
        pcm,
        sample_rate: sample_rate_from_mime(&inline.mime_type),
    })
}

/// Read `rate=N` from a mime type such as `audio/L16;codec=pcm;rate=24000`
pub fn sample_rate_from_mime(mime_type: &str) -> u32 {
    mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse::<u32>().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(DEFAULT_TTS_SAMPLE_RATE)
}

/// REST client for the generative language service
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    tts_model_name: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    /// Build the client from settings; fails with `Configuration` when the
    /// API key is missing
    pub fn new(settings: &FeedbackSettings, tts_model_name: &str) -> AssessResult<Self> {
        let api_key = settings.api_key()?.to_string();

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AssessError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model_name: settings.model_name.clone(),
            tts_model_name: tts_model_name.to_string(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }

    /// Point the client at another endpoint root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Result<String, String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("Request timed out: {}", e)
                } else {
                    format!("Network error: {}", e)
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| format!("Failed to read reply: {}", e))?;

        if !status.is_success() {
            return Err(format!(
                "API error {}: {}",
                status.as_u16(),
                preview(&body, ERROR_BODY_PREVIEW_CHARS)
            ));
        }

        Ok(body)
    }
}

#[async_trait]
impl FeedbackModel for GeminiClient {
    async fn generate_json(&self, request: &StructuredRequest) -> AssessResult<String> {
        let body = GenerateContentRequest {
            contents: vec![Content::user(request.prompt.clone())],
            system_instruction: Some(Content::system(request.system_instruction.clone())),
            generation_config: GenerationConfig {
                temperature: Some(self.temperature),
                max_output_tokens: Some(self.max_output_tokens),
                response_mime_type: Some("application/json"),
                response_schema: Some(request.response_schema.clone()),
                ..Default::default()
            },
        };

        debug!(model = %self.model_name, prompt_chars = request.prompt.len(), "Requesting feedback");

        let reply = self
            .generate(&self.model_name, &body)
            .await
            .map_err(AssessError::InvalidAssessmentResponse)?;

        extract_text(&reply).map_err(AssessError::InvalidAssessmentResponse)
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str, voice_id: &str, style_hint: &str) -> AssessResult<SynthesizedAudio> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssessError::TtsGeneration("Nothing to synthesize".to_string()));
        }

        let prompt = if style_hint.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}\n\n{}", style_hint.trim(), text)
        };

        let body = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            system_instruction: None,
            generation_config: GenerationConfig {
                response_modalities: Some(vec!["AUDIO"]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice_id.to_string(),
                        },
                    },
                }),
                ..Default::default()
            },
        };

        let reply = self
            .generate(&self.tts_model_name, &body)
            .await
            .map_err(AssessError::TtsGeneration)?;

        match extract_audio(&reply) {
            Ok(audio) => {
                info!(
                    text_chars = text.len(),
                    pcm_bytes = audio.pcm.len(),
                    sample_rate = audio.sample_rate,
                    "Speech synthesized"
                );
                Ok(audio)
            }
            Err(reason) => {
                warn!(reason = %reason, "Speech synthesis returned no audio");
                Err(AssessError::TtsGeneration(reason))
            }
        }
    }
}
