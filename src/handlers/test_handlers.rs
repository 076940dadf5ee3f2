use super::*;
use crate::config::Config;
use crate::error::AdvisorError;
use crate::intent::GeminiIntent;
use crate::location::GeminiLocation;
use crate::models::{Location, TranscriptionResult};
use crate::orchestrator::Orchestrator;
use crate::orchestrator::tests::snapshot;
use crate::session::InMemorySessionStore;
use crate::synth::{AdviceGenerator, GeminiSynth};
use crate::transcription::{MockTranscriptionGateway, TranscriptionError};
use crate::weather::{DailySummary, Forecast, MockWeatherGateway, WeatherGateway};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mockall::predicate::eq;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "agri-test-boundary";

/// Real fallback-mode model components around mocked providers
fn service(weather: MockWeatherGateway, transcriber: MockTranscriptionGateway) -> AdvisorService {
    let config = Config::default();
    let weather: Arc<dyn WeatherGateway> = Arc::new(weather);
    let advisor: Arc<dyn AdviceGenerator> = Arc::new(GeminiSynth::new(
        None,
        "primary".to_string(),
        "fallback".to_string(),
    ));
    let orchestrator = Orchestrator::new(
        Arc::new(GeminiIntent::new(None, "classifier".to_string())),
        Arc::new(GeminiLocation::new(None, "classifier".to_string())),
        weather.clone(),
        advisor.clone(),
        Arc::new(transcriber),
        Arc::new(InMemorySessionStore::new(
            config.session_ttl(),
            100,
            Location::new("Tokyo", "JP"),
        )),
        config.chat.location_confidence_threshold,
    );
    AdvisorService {
        config: Arc::new(config),
        orchestrator: Arc::new(orchestrator),
        weather,
        advisor,
    }
}

fn offline() -> AdvisorService {
    service(MockWeatherGateway::new(), MockTranscriptionGateway::new())
}

async fn send(state: AdvisorService, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// (field name, optional (filename, content type), bytes)
fn post_multipart(uri: &str, fields: &[(&str, Option<(&str, &str)>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, file, bytes) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((filename, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_docs() {
    let (status, body) = send(offline(), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "Agriculture Helper API");

    let (status, body) = send(offline(), get("/api")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["chat"]["voice_process"].is_string());
}

#[tokio::test]
async fn test_chat_weather_question_end_to_end() {
    let mut weather = MockWeatherGateway::new();
    weather
        .expect_current()
        .with(eq("Tokyo"), eq("JP"))
        .times(1)
        .returning(|_, _| Ok(snapshot("Tokyo, Japan", 24.0)));
    let state = service(weather, MockTranscriptionGateway::new());

    let (status, body) = send(
        state,
        post_json(
            "/api/chat/",
            serde_json::json!({"message": "Should I water my crops today in Tokyo?"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["query_intelligence"]["classification"]["query_type"],
        "weather_dependent"
    );
    assert_eq!(
        body["location_info"]["current_location"],
        serde_json::json!({"city": "Tokyo", "country": "JP"})
    );
    assert_eq!(body["weather"]["success"], true);
    assert!(!body["response"].as_str().unwrap().is_empty());
    assert_eq!(body["model_used"], "fallback-response");
    assert!(!body["crop_recommendations"].as_array().unwrap().is_empty());
    assert_eq!(body["message_count"], 1);
}

#[tokio::test]
async fn test_chat_without_trailing_slash_and_general_query() {
    let (status, body) = send(
        offline(),
        post_json(
            "/api/chat",
            serde_json::json!({"message": "What crops are grown in Asia?", "language": "english"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("weather").is_none());
    assert!(body.get("location_info").is_none());
    assert!(body["response"].as_str().unwrap().starts_with("Sorry"));
}

#[tokio::test]
async fn test_chat_validation_errors() {
    let (status, body) = send(
        offline(),
        post_json("/api/chat/", serde_json::json!({"message": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Message is required");

    let long = "a".repeat(1001);
    let (status, _) = send(
        offline(),
        post_json("/api/chat/", serde_json::json!({"message": long})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        offline(),
        post_json(
            "/api/chat/",
            serde_json::json!({"message": "hi", "language": "french"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Language must be 'japanese' or 'english'");

    let bad_json = Request::builder()
        .method("POST")
        .uri("/api/chat/")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(offline(), bad_json).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_analyze_has_no_side_effects() {
    let state = offline();
    let (status, body) = send(
        state.clone(),
        post_json(
            "/api/chat/analyze",
            serde_json::json!({"message": "Should I spray now in Paris?"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classification"]["query_type"], "weather_dependent");
    assert_eq!(body["capabilities_needed"]["weather_data"], true);
    assert_eq!(body["location_extraction"]["city"], "Paris");
}

#[tokio::test]
async fn test_session_context_lifecycle() {
    let state = offline();
    let (status, body) = send(state.clone(), get("/api/chat/session/missing/context")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");

    send(
        state.clone(),
        post_json(
            "/api/chat/",
            serde_json::json!({"message": "What is crop rotation?", "session_id": "farm-1"}),
        ),
    )
    .await;
    let (status, body) = send(state, get("/api/chat/session/farm-1/context")).await;
    assert_eq!(status, StatusCode::OK);
    let ctx = &body["session_context"];
    assert_eq!(ctx["session_id"], "farm-1");
    assert_eq!(ctx["statistics"]["total_queries"], 1);
    assert_eq!(
        ctx["statistics"]["query_type_distribution"]["seasonal_planning"],
        0
    );
}

#[tokio::test]
async fn test_forecast_unknown_city_and_bad_days() {
    let mut weather = MockWeatherGateway::new();
    weather
        .expect_forecast()
        .with(eq("InvalidCityXYZ"), eq("JP"), eq(3u32))
        .times(1)
        .returning(|_, _, days| {
            Ok(Forecast {
                location: "Tokyo, Japan".to_string(),
                forecast: (0..days)
                    .map(|d| DailySummary {
                        date: format!("2026-10-{:02}", d + 14),
                        temperature_max: Some(22.0),
                        temperature_min: Some(14.0),
                        description: "Clear sky".to_string(),
                        precipitation: Some(0.0),
                        wind_speed: Some(8.0),
                        weather_code: Some(0),
                    })
                    .collect(),
            })
        });
    let state = service(weather, MockTranscriptionGateway::new());

    let (status, body) = send(
        state.clone(),
        get("/api/weather/forecast?city=InvalidCityXYZ&days=3"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["location"], "Tokyo, Japan");
    assert_eq!(body["data"]["forecast"].as_array().unwrap().len(), 3);

    let (status, body) = send(state, get("/api/weather/forecast?days=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid days parameter");
}

#[tokio::test]
async fn test_weather_provider_failure_is_bad_gateway() {
    let mut weather = MockWeatherGateway::new();
    weather
        .expect_current()
        .with(eq("Tokyo"), eq("JP"))
        .returning(|_, _| Err(AdvisorError::upstream("open-meteo", "Weather API error: 503")));
    let (status, body) = send(
        service(weather, MockTranscriptionGateway::new()),
        get("/api/weather/current?city=%20%20&country=japan"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_location_search_requires_query() {
    let (status, body) = send(offline(), get("/api/weather/locations/search")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Query parameter is required");
}

#[tokio::test]
async fn test_voice_rejects_missing_and_unnamed_audio() {
    let (status, body) = send(
        offline(),
        post_multipart("/api/chat/voice/process", &[("session_id", None, b"s1")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "NO_AUDIO_FILE");

    let (status, body) = send(
        offline(),
        post_multipart(
            "/api/chat/voice/process",
            &[("audio", Some(("", "audio/webm")), b"abc")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "EMPTY_FILE");
}

#[tokio::test]
async fn test_voice_transcribes_then_chats() {
    let mut transcriber = MockTranscriptionGateway::new();
    transcriber
        .expect_transcribe()
        .withf(|audio, content_type, language, options| {
            audio.len() == 2048
                && content_type == "audio/wav"
                && language == "en"
                && options.contains(&("smart_format".to_string(), "true".to_string()))
        })
        .times(1)
        .returning(|_, _, _, _| {
            Ok(TranscriptionResult {
                success: true,
                transcript: "What is crop rotation?".to_string(),
                confidence: 0.95,
                language_detected: "en".to_string(),
                processing_time: 0.3,
                word_count: 4,
                alternatives: vec![],
                metadata: crate::models::AudioMetadata {
                    model: "nova-2".to_string(),
                    audio_duration: 1.8,
                    channels: 1,
                },
                timestamp: chrono::Utc::now(),
            })
        });
    let audio = vec![7u8; 2048];
    let (status, body) = send(
        service(MockWeatherGateway::new(), transcriber),
        post_multipart(
            "/api/chat/voice/process",
            &[
                ("audio", Some(("question.wav", "audio/wav")), &audio),
                ("language", None, b"en"),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transcription"]["transcript"], "What is crop rotation?");
    assert_eq!(body["chat_response"]["success"], true);
    assert_eq!(body["voice_metadata"]["audio_format"], "audio/wav");
    assert_eq!(body["capabilities_used"]["voice_transcription"], true);
    assert!(body.get("warnings").is_none());
}

#[tokio::test]
async fn test_voice_transcription_failure_is_server_error() {
    let mut transcriber = MockTranscriptionGateway::new();
    transcriber
        .expect_transcribe()
        .returning(|_, _, _, _| Err(TranscriptionError::NoApiKey));
    let (status, body) = send(
        service(MockWeatherGateway::new(), transcriber),
        post_multipart(
            "/api/chat/voice/process",
            &[("audio", Some(("q.webm", "audio/webm")), &[1u8; 4096])],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_code"], "NO_API_KEY");
    assert_eq!(
        body["error"],
        "Transcription failed: Deepgram API key not configured"
    );
}

#[tokio::test]
async fn test_capability_descriptors() {
    let mut transcriber = MockTranscriptionGateway::new();
    transcriber.expect_is_configured().return_const(false);
    let (status, body) = send(
        service(MockWeatherGateway::new(), transcriber),
        get("/api/chat/voice/status"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["voice_capabilities"]["transcription_service"]["status"],
        "not_configured"
    );
    assert_eq!(body["voice_capabilities"]["max_file_size"], "500MB");

    let (_, body) = send(offline(), get("/api/chat/capabilities")).await;
    assert_eq!(
        body["capabilities"]["query_types"]
            .as_object()
            .unwrap()
            .len(),
        4
    );
}

#[tokio::test]
async fn test_agriculture_lookups() {
    let mut weather = MockWeatherGateway::new();
    weather
        .expect_current()
        .returning(|_, _| Ok(snapshot("Tokyo, Japan", 32.0)));
    let state = service(weather, MockTranscriptionGateway::new());

    let (status, body) = send(
        state.clone(),
        get("/api/agriculture/pest/risk-assessment?crop_type=tomato"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["risk_factors"][0], "hot_weather");

    let (status, body) = send(
        state.clone(),
        get("/api/agriculture/irrigation/recommendations?soil_type=clay"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["frequency"], "twice_daily");
    assert_eq!(body["data"]["soil_adjustment"]["frequency"], "less_frequent");

    let (status, body) = send(
        state.clone(),
        get("/api/agriculture/seasonal/advice?month=7"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["season"], "summer");

    let (status, body) = send(
        state.clone(),
        get("/api/agriculture/seasonal/advice?month=13"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Month must be between 1 and 12");

    let (status, body) = send(
        state.clone(),
        get("/api/agriculture/crops/recommendations?city=Tokyo"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recommendations"][0]["crop"], "rice");

    let (status, body) = send(
        state.clone(),
        post_json(
            "/api/agriculture/crops/analysis",
            serde_json::json!({"crop_type": "Rice", "growth_stage": "ripening", "language": "english"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["known_pests"].as_array().unwrap().len(), 3);
    assert!(!body["data"]["analysis"].as_str().unwrap().is_empty());

    let (status, body) = send(
        state,
        post_json("/api/agriculture/crops/analysis", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "crop_type is required");
}

#[tokio::test]
async fn test_agriculture_lookups_accept_json_bodies() {
    let mut weather = MockWeatherGateway::new();
    weather
        .expect_current()
        .with(eq("Osaka"), eq("JP"))
        .returning(|_, _| Ok(snapshot("Osaka, Japan", 32.0)));
    let state = service(weather, MockTranscriptionGateway::new());

    let (status, body) = send(
        state.clone(),
        post_json(
            "/api/agriculture/seasonal/advice",
            serde_json::json!({"city": "Osaka", "month": 7}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["season"], "summer");

    let (status, body) = send(
        state.clone(),
        post_json(
            "/api/agriculture/seasonal/advice",
            serde_json::json!({"city": "Osaka", "month": 13}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Month must be between 1 and 12");

    let (status, body) = send(
        state.clone(),
        post_json(
            "/api/agriculture/pest/risk-assessment",
            serde_json::json!({"city": "Osaka", "crop_type": "tomato"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["crop_type"], "tomato");

    let (status, body) = send(
        state.clone(),
        post_json(
            "/api/agriculture/irrigation/recommendations",
            serde_json::json!({"city": "Osaka", "soil_type": "sand"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["soil_adjustment"]["frequency"], "more_frequent");

    let (status, body) = send(
        state,
        post_json(
            "/api/agriculture/crops/recommendations",
            serde_json::json!({"city": "Osaka", "season": "Summer"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["season"], "summer");
}
