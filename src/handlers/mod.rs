/// HTTP surface of the advisor service
pub mod agriculture;
pub mod chat;
pub mod help;
pub mod weather;

#[cfg(test)]
mod test_handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::service::AdvisorService;

pub type AppState = AdvisorService;

/// Multipart framing on top of the largest accepted audio file
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.transcription.max_file_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/", get(help::health))
        .route("/api", get(help::docs))
        // Weather
        .route("/api/weather/current", get(weather::current))
        .route("/api/weather/forecast", get(weather::forecast))
        .route("/api/weather/historical", get(weather::historical))
        .route("/api/weather/locations/search", get(weather::search))
        // Chat
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/", post(chat::chat))
        .route("/api/chat/analyze", post(chat::analyze))
        .route("/api/chat/session/:id/context", get(chat::session_context))
        .route("/api/chat/capabilities", get(help::capabilities))
        .route("/api/chat/voice/status", get(help::voice_status))
        .route("/api/chat/voice/process", post(chat::voice))
        // Agriculture
        .route(
            "/api/agriculture/crops/recommendations",
            get(agriculture::crop_recommendations).post(agriculture::crop_recommendations_body),
        )
        .route("/api/agriculture/crops/analysis", post(agriculture::crop_analysis))
        .route(
            "/api/agriculture/seasonal/advice",
            get(agriculture::seasonal_advice).post(agriculture::seasonal_advice_body),
        )
        .route(
            "/api/agriculture/pest/risk-assessment",
            get(agriculture::pest_risk).post(agriculture::pest_risk_body),
        )
        .route(
            "/api/agriculture/irrigation/recommendations",
            get(agriculture::irrigation).post(agriculture::irrigation_body),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
