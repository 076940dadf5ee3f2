use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::AppState;
use crate::error::{AdvisorError, Result};
use crate::models::Language;
use crate::orchestrator::{
    AnalyzeResponse, ChatResponse, SessionContext, VoiceRequest, VoiceResponse, validate_message,
};
use crate::transcription;

const DEFAULT_AUDIO_TYPE: &str = "audio/webm";

#[derive(Debug, Default, Deserialize)]
pub struct ChatBody {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub language: Option<String>,
}

fn parse_body(payload: std::result::Result<Json<ChatBody>, JsonRejection>) -> Result<ChatBody> {
    payload.map(|Json(b)| b).map_err(|e| {
        tracing::warn!("Rejected chat body: {}", e);
        AdvisorError::Validation("No JSON data provided".to_string())
    })
}

pub(crate) fn parse_language(raw: Option<&str>) -> Result<Language> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Language::default()),
        Some(value) => Language::parse(value).ok_or_else(|| {
            AdvisorError::Validation("Language must be 'japanese' or 'english'".to_string())
        }),
    }
}

pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let body = parse_body(payload)?;
    let message = validate_message(body.message.as_deref(), state.config.chat.max_message_chars)?;
    let language = parse_language(body.language.as_deref())?;

    let response = state
        .orchestrator
        .handle_message(&message, body.session_id.as_deref(), language)
        .await;
    Ok(Json(response))
}

pub async fn analyze(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>> {
    let body = parse_body(payload)?;
    let message = validate_message(body.message.as_deref(), state.config.chat.max_message_chars)?;
    Ok(Json(state.orchestrator.analyze(&message).await))
}

pub async fn session_context(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionContext>> {
    Ok(Json(state.orchestrator.session_context(&id).await?))
}

/// Voice failures carry a machine-readable code next to the message
#[derive(Debug)]
pub struct VoiceFailure {
    status: StatusCode,
    error: String,
    code: String,
}

impl VoiceFailure {
    fn bad_request(code: &str, error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            code: code.to_string(),
        }
    }
}

impl IntoResponse for VoiceFailure {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("voice request failed: {} ({})", self.error, self.code);
        } else {
            tracing::warn!("voice request rejected: {} ({})", self.error, self.code);
        }
        let body = serde_json::json!({
            "success": false,
            "error": self.error,
            "error_code": self.code,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        (self.status, Json(body)).into_response()
    }
}

fn voice_options(model: &str) -> Vec<(String, String)> {
    [("model", model), ("smart_format", "true"), ("punctuate", "true")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

struct AudioUpload {
    file_name: Option<String>,
    content_type: String,
    bytes: Vec<u8>,
}

pub async fn voice(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Json<VoiceResponse>, VoiceFailure> {
    let mut audio: Option<AudioUpload> = None;
    let mut session_id = None;
    let mut language_code = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| VoiceFailure::bad_request("INVALID_FORM", format!("Invalid form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| DEFAULT_AUDIO_TYPE.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    VoiceFailure::bad_request("INVALID_FORM", format!("Invalid form data: {e}"))
                })?;
                audio = Some(AudioUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "session_id" | "language" => {
                let value = field.text().await.map_err(|e| {
                    VoiceFailure::bad_request("INVALID_FORM", format!("Invalid form data: {e}"))
                })?;
                let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                if name == "session_id" {
                    session_id = value;
                } else {
                    language_code = value;
                }
            }
            _ => {}
        }
    }

    let Some(audio) = audio else {
        return Err(VoiceFailure::bad_request("NO_AUDIO_FILE", "No audio file provided"));
    };
    if audio.file_name.as_deref().unwrap_or_default().is_empty() {
        return Err(VoiceFailure::bad_request("EMPTY_FILE", "Empty audio file"));
    }

    let check = transcription::validate_audio(
        &audio.content_type,
        audio.bytes.len() as u64,
        state.config.transcription.max_file_bytes,
    );
    if !check.valid {
        return Err(VoiceFailure::bad_request(
            "INVALID_AUDIO",
            format!("Invalid audio: {}", check.errors.join(", ")),
        ));
    }

    let request = VoiceRequest {
        audio: audio.bytes,
        content_type: audio.content_type,
        session_id,
        language_code: language_code
            .unwrap_or_else(|| state.config.transcription.default_language.clone()),
        options: voice_options(&state.config.transcription.model),
        validation_warnings: check.warnings,
    };

    state
        .orchestrator
        .handle_voice(request)
        .await
        .map(Json)
        .map_err(|e| VoiceFailure {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: format!("Transcription failed: {e}"),
            code: e.code(),
        })
}
