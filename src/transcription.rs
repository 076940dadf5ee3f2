use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

use crate::config::TranscriptionConfig;
use crate::error::Result;
use crate::models::{AudioMetadata, TranscriptAlternative, TranscriptionResult};

pub const SUPPORTED_FORMATS: [&str; 5] = [
    "audio/webm",
    "audio/wav",
    "audio/mp3",
    "audio/m4a",
    "audio/ogg",
];

const MIN_AUDIO_BYTES: u64 = 1024;
const ALTERNATIVE_MIN_CONFIDENCE: f64 = 0.5;
const MAX_ALTERNATIVES: usize = 2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranscriptionError {
    #[error("Deepgram API key not configured")]
    NoApiKey,

    #[error("No audio data provided")]
    EmptyAudio,

    #[error("Request timeout - audio file may be too long")]
    Timeout,

    #[error("Failed to connect to Deepgram service: {0}")]
    Connection(String),

    #[error("Invalid response from Deepgram: {0}")]
    InvalidResponse(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("No speech detected in audio")]
    NoSpeech,
}

impl TranscriptionError {
    /// Stable machine-readable code returned to clients
    pub fn code(&self) -> String {
        match self {
            Self::NoApiKey => "NO_API_KEY".to_string(),
            Self::EmptyAudio => "EMPTY_AUDIO".to_string(),
            Self::Timeout => "TIMEOUT".to_string(),
            Self::Connection(_) => "CONNECTION_ERROR".to_string(),
            Self::InvalidResponse(_) => "INVALID_RESPONSE".to_string(),
            Self::Http { status, .. } => format!("HTTP_{status}"),
            Self::NoSpeech => "NO_SPEECH".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionGateway: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        content_type: &str,
        language: &str,
        options: &[(String, String)],
    ) -> std::result::Result<TranscriptionResult, TranscriptionError>;

    fn is_configured(&self) -> bool;
}

/// Only an oversize payload is rejected; odd formats and tiny files just warn
pub fn validate_audio(content_type: &str, size_bytes: u64, max_bytes: u64) -> AudioValidation {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let base = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if !SUPPORTED_FORMATS.contains(&base.as_str()) {
        warnings.push(format!(
            "Format {content_type} may not be optimal. Supported: {}",
            SUPPORTED_FORMATS.join(", ")
        ));
    }

    if size_bytes > max_bytes {
        errors.push(format!(
            "File too large: {:.1}MB (max: {}MB)",
            size_bytes as f64 / (1024.0 * 1024.0),
            max_bytes / (1024 * 1024)
        ));
    } else if size_bytes < MIN_AUDIO_BYTES {
        warnings.push("Very small audio file - may not contain speech".to_string());
    }

    AudioValidation {
        valid: errors.is_empty(),
        warnings,
        errors,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SupportedLanguages {
    pub languages: BTreeMap<&'static str, &'static str>,
    pub default: &'static str,
    pub agricultural_optimized: Vec<&'static str>,
}

pub fn supported_languages() -> SupportedLanguages {
    SupportedLanguages {
        languages: BTreeMap::from([
            ("ja", "Japanese"),
            ("en", "English"),
            ("zh", "Chinese (Mandarin)"),
            ("ko", "Korean"),
            ("hi", "Hindi"),
            ("es", "Spanish"),
            ("fr", "French"),
            ("de", "German"),
            ("pt", "Portuguese"),
            ("ru", "Russian"),
            ("it", "Italian"),
            ("th", "Thai"),
            ("vi", "Vietnamese"),
        ]),
        default: "ja",
        agricultural_optimized: vec!["ja", "en", "hi", "zh"],
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub service: &'static str,
    pub provider: &'static str,
    pub configured: bool,
    pub status: &'static str,
    pub model: String,
    pub supported_formats: Vec<&'static str>,
    pub max_file_size_mb: u64,
    pub timeout_seconds: u64,
}

pub fn service_status(configured: bool, cfg: &TranscriptionConfig) -> ServiceStatus {
    ServiceStatus {
        service: "TranscriptionService",
        provider: "Deepgram",
        configured,
        status: if configured { "ready" } else { "not_configured" },
        model: cfg.model.clone(),
        supported_formats: SUPPORTED_FORMATS.to_vec(),
        max_file_size_mb: cfg.max_file_bytes / (1024 * 1024),
        timeout_seconds: cfg.timeout_seconds,
    }
}

// Deepgram /v1/listen response
#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    metadata: ListenMetadata,
    results: ListenResults,
}

#[derive(Debug, Default, Deserialize)]
struct ListenMetadata {
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    channels: u32,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    #[serde(default)]
    alternatives: Vec<ListenAlternative>,
    #[serde(default)]
    detected_language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListenAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct ListenErrorBody {
    err_msg: Option<String>,
}

pub struct DeepgramGateway {
    client: Client,
    api_key: Option<String>,
    api_url: String,
    model: String,
}

impl DeepgramGateway {
    pub fn new(cfg: &TranscriptionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout())
            .build()?;
        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            api_url: cfg.api_url.clone(),
            model: cfg.model.clone(),
        })
    }
}

fn status_message(status: u16) -> String {
    match status {
        400 => "Invalid audio format or parameters",
        401 => "Invalid or missing API key",
        402 => "Insufficient credits",
        403 => "Access forbidden",
        413 => "Audio file too large",
        429 => "Rate limit exceeded",
        500 => "Deepgram service error",
        _ => return format!("Deepgram API error {status}"),
    }
    .to_string()
}

#[async_trait]
impl TranscriptionGateway for DeepgramGateway {
    async fn transcribe(
        &self,
        audio: &[u8],
        content_type: &str,
        language: &str,
        options: &[(String, String)],
    ) -> std::result::Result<TranscriptionResult, TranscriptionError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(TranscriptionError::NoApiKey);
        };
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }

        tracing::info!(
            "Transcribing {} bytes of {} audio (language: {})",
            audio.len(),
            content_type,
            language
        );
        let started = Instant::now();

        let mut params: Vec<(&str, &str)> = vec![
            ("model", self.model.as_str()),
            ("language", language),
            ("smart_format", "true"),
            ("punctuate", "true"),
            ("diarize", "false"),
            ("utterances", "true"),
            ("detect_language", "false"),
            ("filler_words", "false"),
            ("multichannel", "false"),
        ];
        // Caller options replace a default of the same name
        for (key, value) in options {
            match params.iter_mut().find(|(k, _)| *k == key.as_str()) {
                Some(slot) => slot.1 = value.as_str(),
                None => params.push((key.as_str(), value.as_str())),
            }
        }

        let response = self
            .client
            .post(&self.api_url)
            .query(&params)
            .header("Authorization", format!("Token {api_key}"))
            .header("Content-Type", content_type)
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Deepgram request failed: {}", e);
                if e.is_timeout() {
                    TranscriptionError::Timeout
                } else {
                    TranscriptionError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let message = response
                .json::<ListenErrorBody>()
                .await
                .ok()
                .and_then(|b| b.err_msg)
                .unwrap_or_else(|| status_message(code));
            tracing::error!("Deepgram API error {}: {}", code, message);
            return Err(TranscriptionError::Http {
                status: code,
                message,
            });
        }

        let body: ListenResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        let Some(channel) = body.results.channels.into_iter().next() else {
            return Err(TranscriptionError::NoSpeech);
        };
        let mut alternatives = channel.alternatives;
        alternatives.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut ranked = alternatives.into_iter();
        let best = match ranked.next() {
            Some(best) if !best.transcript.trim().is_empty() => best,
            _ => return Err(TranscriptionError::NoSpeech),
        };
        let others = ranked
            .filter(|a| !a.transcript.trim().is_empty() && a.confidence > ALTERNATIVE_MIN_CONFIDENCE)
            .take(MAX_ALTERNATIVES)
            .map(|a| TranscriptAlternative {
                transcript: a.transcript.trim().to_string(),
                confidence: a.confidence,
            })
            .collect();

        let transcript = best.transcript.trim().to_string();
        tracing::info!(
            "Transcription complete: {} chars, confidence {:.2}",
            transcript.chars().count(),
            best.confidence
        );

        Ok(TranscriptionResult {
            success: true,
            word_count: transcript.split_whitespace().count(),
            transcript,
            confidence: best.confidence,
            language_detected: channel
                .detected_language
                .unwrap_or_else(|| language.to_string()),
            processing_time: started.elapsed().as_secs_f64(),
            alternatives: others,
            metadata: AudioMetadata {
                model: self.model.clone(),
                audio_duration: body.metadata.duration,
                channels: body.metadata.channels,
            },
            timestamp: Utc::now(),
        })
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
