use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use super::AppState;
use crate::transcription;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.config.server.name,
        "version": state.config.server.version,
        "endpoints": {
            "weather": "/api/weather/current?city=Tokyo&country=JP",
            "forecast": "/api/weather/forecast?city=Tokyo&country=JP&days=3",
            "chat": "/api/chat/",
            "crops": "/api/agriculture/crops/recommendations?city=Tokyo&country=JP",
            "seasonal": "/api/agriculture/seasonal/advice?city=Tokyo&country=JP"
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn docs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.config.server.name,
        "description": "AI-powered agricultural assistant with weather integration",
        "version": state.config.server.version,
        "features": [
            "Query classification and routing",
            "Location extraction from natural language",
            "Real-time weather with agricultural analysis",
            "Weather forecasts and recent history",
            "Crop recommendations from current conditions",
            "Pest risk and irrigation guidance",
            "Seasonal farm planning",
            "Voice queries via speech-to-text",
            "Japanese and English responses"
        ],
        "endpoints": {
            "weather": {
                "current": "GET /api/weather/current?city=&country=",
                "forecast": "GET /api/weather/forecast?city=&country=&days=",
                "historical": "GET /api/weather/historical?city=&country=",
                "search": "GET /api/weather/locations/search?query=&limit="
            },
            "chat": {
                "message": "POST /api/chat/",
                "analyze": "POST /api/chat/analyze",
                "session_context": "GET /api/chat/session/<id>/context",
                "capabilities": "GET /api/chat/capabilities",
                "voice_status": "GET /api/chat/voice/status",
                "voice_process": "POST /api/chat/voice/process"
            },
            "agriculture": {
                "crop_recommendations": "GET|POST /api/agriculture/crops/recommendations (city, country, season)",
                "crop_analysis": "POST /api/agriculture/crops/analysis",
                "seasonal_advice": "GET|POST /api/agriculture/seasonal/advice (city, country, month)",
                "pest_risk": "GET|POST /api/agriculture/pest/risk-assessment (city, country, crop_type)",
                "irrigation": "GET|POST /api/agriculture/irrigation/recommendations (city, country, crop_type, soil_type)"
            }
        },
        "powered_by": {
            "weather": "Open-Meteo",
            "ai": "Google Gemini",
            "speech": "Deepgram"
        }
    }))
}

pub async fn capabilities() -> Json<Value> {
    Json(json!({
        "success": true,
        "capabilities": {
            "query_types": {
                "weather_dependent": {
                    "description": "Questions that depend on current local conditions",
                    "examples": [
                        "Should I water my crops today?",
                        "Is it safe to spray pesticides now?",
                        "Can I harvest today in Tokyo?"
                    ]
                },
                "general_knowledge": {
                    "description": "General farming facts and crop information",
                    "examples": [
                        "What crops are grown in Japan?",
                        "Which varieties of rice exist?",
                        "What is crop rotation?"
                    ]
                },
                "technical_advice": {
                    "description": "Diagnosis and treatment of specific problems",
                    "examples": [
                        "How do I treat tomato blight?",
                        "My rice leaves are turning yellow",
                        "Best fertilizer for sandy soil?"
                    ]
                },
                "seasonal_planning": {
                    "description": "Planning across months and seasons",
                    "examples": [
                        "What should I plant next spring?",
                        "How do I prepare fields for winter?",
                        "Plan my crop rotation for next year"
                    ]
                }
            },
            "features": {
                "intelligent_routing": true,
                "location_extraction": true,
                "weather_integration": true,
                "crop_recommendations": true,
                "session_memory": true,
                "voice_input": true,
                "multilingual_support": ["Japanese", "English"]
            }
        },
        "usage_tips": [
            "Mention a city to get advice for that location",
            "Ask about today or now for weather-aware answers",
            "Reuse session_id to keep your location between messages",
            "Set language to 'english' for English responses"
        ]
    }))
}

pub async fn voice_status(State(state): State<AppState>) -> Json<Value> {
    let cfg = &state.config.transcription;
    let status = transcription::service_status(
        state.orchestrator.transcriber().is_configured(),
        cfg,
    );
    let languages = transcription::supported_languages();

    Json(json!({
        "success": true,
        "voice_capabilities": {
            "transcription_service": status,
            "supported_languages": languages,
            "supported_formats": transcription::SUPPORTED_FORMATS,
            "max_file_size": format!("{}MB", cfg.max_file_bytes / (1024 * 1024)),
            "recommended_format": "audio/webm",
            "processing_timeout": format!("{} seconds", cfg.timeout_seconds)
        },
        "integration_features": {
            "voice_to_chat": true,
            "location_extraction_from_voice": true,
            "weather_context": true,
            "session_continuity": true,
            "confidence_warnings": true
        },
        "usage_examples": [
            "Record: 'Should I water my crops today in Tokyo?'",
            "Record: '東京で今日は水やりが必要ですか？'",
            "Send the recording as the 'audio' field with optional 'session_id' and 'language'"
        ],
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
