use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::agriculture::{self, CropSuggestion};
use crate::error::{AdvisorError, Result};
use crate::intent::IntentClassifier;
use crate::location::LocationExtractor;
use crate::models::{
    Language, Location, LocationResolution, QueryClassification, QueryType, TranscriptAlternative,
    TranscriptionResult, WeatherReport,
};
use crate::session::{InputType, Session, SessionStatistics, SessionStore, VoiceInput};
use crate::synth::{AdviceGenerator, AdviceRequest};
use crate::transcription::{TranscriptionError, TranscriptionGateway};
use crate::weather::WeatherGateway;

const LOW_CONFIDENCE: f64 = 0.6;
const PROCESSING_CHAIN: [&str; 3] = [
    "deepgram_transcription",
    "query_classification",
    "ai_response",
];

/// Trim and bound a user message
pub fn validate_message(raw: Option<&str>, max_chars: usize) -> Result<String> {
    let message = raw.map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return Err(AdvisorError::Validation("Message is required".to_string()));
    }
    if message.chars().count() > max_chars {
        return Err(AdvisorError::Validation(format!(
            "Message too long (max {max_chars} characters)"
        )));
    }
    Ok(message.to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryIntelligence {
    pub classification: QueryClassification,
    pub context_type: QueryType,
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationInfo {
    pub current_location: Location,
    pub location_changed: bool,
    pub location_needed: bool,
    pub extraction: LocationResolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilitiesUsed {
    pub query_classification: bool,
    pub location_extraction: bool,
    pub weather_analysis: bool,
    pub agricultural_knowledge: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub voice_transcription: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationInfo {
    pub success: bool,
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Envelope returned for every processed chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub session_id: String,
    pub query_intelligence: QueryIntelligence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_info: Option<LocationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
    pub crop_recommendations: Vec<CropSuggestion>,
    pub model_used: String,
    pub message_count: u64,
    pub capabilities_used: CapabilitiesUsed,
    pub generation: GenerationInfo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CapabilitiesNeeded {
    pub weather_data: bool,
    pub location_context: bool,
    pub general_knowledge: bool,
    pub technical_expertise: bool,
    pub seasonal_planning: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub query: String,
    pub classification: QueryClassification,
    pub location_extraction: Option<LocationResolution>,
    pub capabilities_needed: CapabilitiesNeeded,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub session: Session,
    pub statistics: SessionStatistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub success: bool,
    pub session_context: SessionSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// A voice upload that already passed audio validation
#[derive(Debug, Clone)]
pub struct VoiceRequest {
    pub audio: Vec<u8>,
    pub content_type: String,
    pub session_id: Option<String>,
    pub language_code: String,
    /// Extra provider parameters, overriding defaults of the same name
    pub options: Vec<(String, String)>,
    pub validation_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionSummary {
    pub transcript: String,
    pub confidence: f64,
    pub language_detected: String,
    pub processing_time: f64,
    pub word_count: usize,
    pub alternatives: Vec<TranscriptAlternative>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub response: String,
    pub model_used: String,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceMetadata {
    pub audio_size_bytes: usize,
    pub audio_format: String,
    pub processing_chain: Vec<&'static str>,
    pub total_processing_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceResponse {
    pub success: bool,
    pub transcription: TranscriptionSummary,
    pub chat_response: ChatSummary,
    pub session_id: String,
    pub query_intelligence: QueryIntelligence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_info: Option<LocationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherReport>,
    pub crop_recommendations: Vec<CropSuggestion>,
    pub voice_metadata: VoiceMetadata,
    pub message_count: u64,
    pub capabilities_used: CapabilitiesUsed,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// How the message reached the pipeline
struct Origin<'a> {
    input_type: InputType,
    transcription: Option<&'a TranscriptionResult>,
}

pub struct Orchestrator {
    classifier: Arc<dyn IntentClassifier>,
    locator: Arc<dyn LocationExtractor>,
    weather: Arc<dyn WeatherGateway>,
    advisor: Arc<dyn AdviceGenerator>,
    transcriber: Arc<dyn TranscriptionGateway>,
    sessions: Arc<dyn SessionStore>,
    location_threshold: f64,
}

impl Orchestrator {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        locator: Arc<dyn LocationExtractor>,
        weather: Arc<dyn WeatherGateway>,
        advisor: Arc<dyn AdviceGenerator>,
        transcriber: Arc<dyn TranscriptionGateway>,
        sessions: Arc<dyn SessionStore>,
        location_threshold: f64,
    ) -> Self {
        Self {
            classifier,
            locator,
            weather,
            advisor,
            transcriber,
            sessions,
            location_threshold,
        }
    }

    pub fn transcriber(&self) -> &dyn TranscriptionGateway {
        self.transcriber.as_ref()
    }

    /// Full text pipeline; always yields an envelope once the message is valid
    pub async fn handle_message(
        &self,
        message: &str,
        session_id: Option<&str>,
        language: Language,
    ) -> ChatResponse {
        self.run(
            message,
            session_id,
            language,
            Origin {
                input_type: InputType::Text,
                transcription: None,
            },
        )
        .await
    }

    async fn run(
        &self,
        message: &str,
        session_id: Option<&str>,
        language: Language,
        origin: Origin<'_>,
    ) -> ChatResponse {
        let (session_id, handle) = self.sessions.get_or_create(session_id);
        // Held to the end so requests for one session run one at a time
        let mut session = handle.lock().await;

        let classification = self.classifier.classify(message).await;
        tracing::info!(
            "Session {}: classified as {} (confidence {:.2})",
            session_id,
            classification.query_type.as_str(),
            classification.confidence
        );
        session.record_query(
            message,
            &classification,
            origin.input_type,
            origin.transcription.map(|t| t.confidence),
        );
        if let Some(t) = origin.transcription {
            session.last_voice_input = Some(VoiceInput {
                transcript: t.transcript.clone(),
                confidence: t.confidence,
                audio_duration: t.metadata.audio_duration,
                timestamp: t.timestamp,
            });
        }

        let location_info = if classification.needs_location {
            let extraction = self.locator.extract(message).await;
            let location_changed = match extraction.accepted(self.location_threshold) {
                Some(location) => session.apply_location(location),
                None => false,
            };
            if location_changed {
                tracing::info!(
                    "Session {}: location changed to {}, {}",
                    session_id,
                    session.current_location.city,
                    session.current_location.country
                );
            }
            Some(LocationInfo {
                current_location: session.current_location.clone(),
                location_changed,
                location_needed: true,
                extraction,
            })
        } else {
            None
        };

        let weather = if classification.needs_weather {
            let here = &session.current_location;
            Some(match self.weather.current(&here.city, &here.country).await {
                Ok(snapshot) => WeatherReport::from_snapshot(snapshot),
                Err(e) => {
                    tracing::warn!("Weather unavailable for {}: {}", here.city, e);
                    WeatherReport::failed(e.to_string())
                }
            })
        } else {
            None
        };

        self.finish(
            message,
            &session_id,
            &session,
            language,
            classification,
            location_info,
            weather,
            origin,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        message: &str,
        session_id: &str,
        session: &Session,
        language: Language,
        classification: QueryClassification,
        location_info: Option<LocationInfo>,
        weather: Option<WeatherReport>,
        origin: Origin<'_>,
    ) -> ChatResponse {
        let conditions = weather.as_ref().and_then(|w| w.data.as_ref());
        let advice = self
            .advisor
            .generate(&AdviceRequest {
                message,
                intent: Some(classification.query_type),
                location: location_info.as_ref().map(|info| &info.current_location),
                weather: conditions,
                language,
            })
            .await;
        if !advice.success {
            tracing::warn!(
                "Session {}: advice generation failed: {:?}",
                session_id,
                advice.error
            );
        }

        let crop_recommendations = match conditions {
            Some(c) if classification.query_type.wants_crop_suggestions() => {
                agriculture::suggest_crops(c.temperature)
            }
            _ => Vec::new(),
        };

        ChatResponse {
            success: true,
            response: advice.advice,
            session_id: session_id.to_string(),
            query_intelligence: QueryIntelligence {
                context_type: classification.query_type,
                reasoning: classification.reasoning.clone(),
                classification,
            },
            capabilities_used: CapabilitiesUsed {
                query_classification: true,
                location_extraction: location_info.is_some(),
                weather_analysis: weather.as_ref().is_some_and(|w| w.success),
                agricultural_knowledge: true,
                voice_transcription: origin.transcription.is_some(),
            },
            location_info,
            weather,
            crop_recommendations,
            model_used: advice
                .model_used
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            message_count: session.message_count,
            generation: GenerationInfo {
                success: advice.success,
                model_used: advice.model_used,
                error: advice.error,
            },
            timestamp: Utc::now(),
        }
    }

    /// Classification and location extraction only; never touches sessions
    pub async fn analyze(&self, message: &str) -> AnalyzeResponse {
        let classification = self.classifier.classify(message).await;
        let location_extraction = if classification.needs_location {
            Some(self.locator.extract(message).await)
        } else {
            None
        };
        let query_type = classification.query_type;

        AnalyzeResponse {
            success: true,
            query: message.to_string(),
            capabilities_needed: CapabilitiesNeeded {
                weather_data: classification.needs_weather,
                location_context: classification.needs_location,
                general_knowledge: query_type == QueryType::GeneralKnowledge,
                technical_expertise: query_type == QueryType::TechnicalAdvice,
                seasonal_planning: query_type == QueryType::SeasonalPlanning,
            },
            classification,
            location_extraction,
            timestamp: Utc::now(),
        }
    }

    pub async fn session_context(&self, session_id: &str) -> Result<SessionContext> {
        let handle = self
            .sessions
            .get(session_id)
            .ok_or_else(|| AdvisorError::NotFound("Session not found".to_string()))?;
        let session = handle.lock().await.clone();
        let statistics = session.statistics();
        Ok(SessionContext {
            success: true,
            session_context: SessionSnapshot {
                session,
                statistics,
            },
            timestamp: Utc::now(),
        })
    }

    /// Transcribe, then run the transcript through the text pipeline
    pub async fn handle_voice(
        &self,
        request: VoiceRequest,
    ) -> std::result::Result<VoiceResponse, TranscriptionError> {
        let started = Instant::now();
        let transcription = self
            .transcriber
            .transcribe(
                &request.audio,
                &request.content_type,
                &request.language_code,
                &request.options,
            )
            .await?;
        tracing::info!(
            "Voice transcript ({:.2} confidence): {}",
            transcription.confidence,
            transcription.transcript
        );

        let mut warnings = Vec::new();
        if transcription.confidence < LOW_CONFIDENCE {
            warnings.push(format!(
                "Low transcription confidence ({:.2}). Please speak clearly or try again.",
                transcription.confidence
            ));
        }
        warnings.extend(request.validation_warnings);

        let chat = self
            .run(
                &transcription.transcript,
                request.session_id.as_deref(),
                Language::from_voice_code(&request.language_code),
                Origin {
                    input_type: InputType::Voice,
                    transcription: Some(&transcription),
                },
            )
            .await;

        Ok(VoiceResponse {
            success: true,
            transcription: TranscriptionSummary {
                transcript: transcription.transcript,
                confidence: transcription.confidence,
                language_detected: transcription.language_detected,
                processing_time: transcription.processing_time,
                word_count: transcription.word_count,
                alternatives: transcription.alternatives,
            },
            chat_response: ChatSummary {
                response: chat.response,
                model_used: chat.model_used,
                success: chat.generation.success,
            },
            session_id: chat.session_id,
            query_intelligence: chat.query_intelligence,
            location_info: chat.location_info,
            weather: chat.weather,
            crop_recommendations: chat.crop_recommendations,
            voice_metadata: VoiceMetadata {
                audio_size_bytes: request.audio.len(),
                audio_format: request.content_type,
                processing_chain: PROCESSING_CHAIN.to_vec(),
                total_processing_time: started.elapsed().as_secs_f64(),
            },
            message_count: chat.message_count,
            capabilities_used: chat.capabilities_used,
            timestamp: Utc::now(),
            warnings,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assessment;
    use crate::intent::MockIntentClassifier;
    use crate::location::MockLocationExtractor;
    use crate::models::{
        AdviceResult, AudioMetadata, CurrentConditions, Scope, WeatherSnapshot,
    };
    use crate::session::InMemorySessionStore;
    use crate::transcription::MockTranscriptionGateway;
    use crate::weather::MockWeatherGateway;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every advice request and answers with a fixed result
    pub(crate) struct StubAdvisor {
        result: AdviceResult,
        pub(crate) seen: Mutex<Vec<(String, Option<Location>, bool, Language)>>,
    }

    impl StubAdvisor {
        pub(crate) fn answering(advice: &str) -> Self {
            Self {
                result: AdviceResult {
                    success: true,
                    advice: advice.to_string(),
                    model_used: Some("stub-model".to_string()),
                    error: None,
                },
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                result: AdviceResult {
                    success: false,
                    advice: crate::synth::UNAVAILABLE_ADVICE.to_string(),
                    model_used: None,
                    error: Some("All models failed".to_string()),
                },
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AdviceGenerator for StubAdvisor {
        async fn generate(&self, request: &AdviceRequest<'_>) -> AdviceResult {
            self.seen.lock().unwrap().push((
                request.message.to_string(),
                request.location.cloned(),
                request.weather.is_some(),
                request.language,
            ));
            self.result.clone()
        }
    }

    pub(crate) fn classification(
        query_type: QueryType,
        needs_location: bool,
        needs_weather: bool,
    ) -> QueryClassification {
        QueryClassification {
            query_type,
            needs_weather,
            needs_location,
            scope: if needs_location { Scope::Local } else { Scope::Global },
            topics: vec!["irrigation".to_string()],
            confidence: 0.9,
            reasoning: Some("test".to_string()),
        }
    }

    pub(crate) fn resolution(city: &str, country: &str, confidence: f64) -> LocationResolution {
        LocationResolution {
            has_location: true,
            city: Some(city.to_string()),
            country: Some(country.to_string()),
            confidence,
            extracted_phrase: Some(city.to_string()),
        }
    }

    pub(crate) fn snapshot(label: &str, temperature: f64) -> WeatherSnapshot {
        assessment::snapshot(CurrentConditions {
            location: label.to_string(),
            temperature,
            feels_like: temperature,
            humidity: 65.0,
            description: "Partly cloudy".to_string(),
            wind_speed: 3.0,
            wind_direction: 90.0,
            pressure: 1010.0,
            precipitation: 0.0,
            soil_temperature: None,
            soil_moisture: None,
            weather_code: 2,
            timestamp: Utc::now(),
        })
    }

    fn transcription(transcript: &str, confidence: f64) -> TranscriptionResult {
        TranscriptionResult {
            success: true,
            transcript: transcript.to_string(),
            confidence,
            language_detected: "en".to_string(),
            processing_time: 0.4,
            word_count: transcript.split_whitespace().count(),
            alternatives: vec![],
            metadata: AudioMetadata {
                model: "nova-2".to_string(),
                audio_duration: 2.5,
                channels: 1,
            },
            timestamp: Utc::now(),
        }
    }

    struct Parts {
        classifier: MockIntentClassifier,
        locator: MockLocationExtractor,
        weather: MockWeatherGateway,
        transcriber: MockTranscriptionGateway,
    }

    impl Parts {
        fn new() -> Self {
            Self {
                classifier: MockIntentClassifier::new(),
                locator: MockLocationExtractor::new(),
                weather: MockWeatherGateway::new(),
                transcriber: MockTranscriptionGateway::new(),
            }
        }

        fn build(self, advisor: Arc<StubAdvisor>) -> (Orchestrator, Arc<InMemorySessionStore>) {
            let sessions = Arc::new(InMemorySessionStore::new(
                Duration::from_secs(3600),
                100,
                Location::new("Tokyo", "JP"),
            ));
            let orchestrator = Orchestrator::new(
                Arc::new(self.classifier),
                Arc::new(self.locator),
                Arc::new(self.weather),
                advisor,
                Arc::new(self.transcriber),
                sessions.clone(),
                0.6,
            );
            (orchestrator, sessions)
        }
    }

    #[test]
    fn test_validate_message() {
        assert_eq!(validate_message(Some("  hi  "), 10).unwrap(), "hi");
        assert!(matches!(
            validate_message(Some("   "), 10),
            Err(AdvisorError::Validation(m)) if m == "Message is required"
        ));
        assert!(validate_message(None, 10).is_err());
        assert!(validate_message(Some(&"a".repeat(11)), 10).is_err());
    }

    #[tokio::test]
    async fn test_weather_dependent_query_runs_every_stage() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::WeatherDependent, true, true));
        parts
            .locator
            .expect_extract()
            .times(1)
            .returning(|_| resolution("Tokyo", "JP", 0.8));
        parts
            .weather
            .expect_current()
            .with(eq("Tokyo"), eq("JP"))
            .times(1)
            .returning(|_, _| Ok(snapshot("Tokyo, Japan", 22.0)));
        let advisor = Arc::new(StubAdvisor::answering("Water early in the morning."));
        let (orchestrator, _) = parts.build(advisor.clone());

        let r = orchestrator
            .handle_message("Should I water my crops today in Tokyo?", None, Language::English)
            .await;

        assert!(r.success);
        assert_eq!(r.response, "Water early in the morning.");
        assert_eq!(r.query_intelligence.context_type, QueryType::WeatherDependent);
        let info = r.location_info.unwrap();
        assert_eq!(info.current_location, Location::new("Tokyo", "JP"));
        assert!(!info.location_changed);
        assert!(r.weather.unwrap().success);
        assert_eq!(r.crop_recommendations[0].crop, "tomato");
        assert_eq!(r.model_used, "stub-model");
        assert_eq!(r.message_count, 1);
        assert!(r.capabilities_used.weather_analysis);

        let seen = advisor.seen.lock().unwrap();
        assert!(seen[0].2, "weather context passed to advice");
    }

    #[tokio::test]
    async fn test_general_query_skips_location_and_weather() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::GeneralKnowledge, false, false));
        parts.locator.expect_extract().times(0);
        parts.weather.expect_current().times(0);
        let (orchestrator, _) = parts.build(Arc::new(StubAdvisor::answering("Rice, wheat.")));

        let r = orchestrator
            .handle_message("What crops are grown in Asia?", Some("s1"), Language::Japanese)
            .await;
        assert!(r.location_info.is_none());
        assert!(r.weather.is_none());
        assert!(r.crop_recommendations.is_empty());
        assert!(!r.capabilities_used.location_extraction);
        assert_eq!(r.session_id, "s1");
    }

    #[tokio::test]
    async fn test_new_location_archived_once_across_messages() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::TechnicalAdvice, true, false));
        parts
            .locator
            .expect_extract()
            .times(2)
            .returning(|_| resolution("mumbai ", "in", 0.9));
        let (orchestrator, sessions) = parts.build(Arc::new(StubAdvisor::answering("ok")));

        let first = orchestrator
            .handle_message("Pests in Mumbai", Some("s"), Language::English)
            .await;
        assert!(first.location_info.as_ref().unwrap().location_changed);
        let second = orchestrator
            .handle_message("Pests in Mumbai", Some("s"), Language::English)
            .await;
        let info = second.location_info.unwrap();
        assert!(!info.location_changed);
        assert_eq!(info.current_location, Location::new("mumbai", "IN"));

        let session = sessions.get("s").unwrap();
        let session = session.lock().await;
        assert_eq!(session.location_history.len(), 1);
        assert_eq!(session.location_history[0].location.city, "Tokyo");
        assert_eq!(session.message_count, 2);
    }

    #[tokio::test]
    async fn test_low_confidence_location_ignored() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::WeatherDependent, true, true));
        parts
            .locator
            .expect_extract()
            .returning(|_| resolution("Paris", "FR", 0.6));
        parts
            .weather
            .expect_current()
            .with(eq("Tokyo"), eq("JP"))
            .returning(|_, _| Ok(snapshot("Tokyo, Japan", 18.0)));
        let (orchestrator, _) = parts.build(Arc::new(StubAdvisor::answering("ok")));

        let r = orchestrator
            .handle_message("Maybe paris?", None, Language::English)
            .await;
        assert_eq!(r.location_info.unwrap().current_location.city, "Tokyo");
    }

    #[tokio::test]
    async fn test_weather_failure_still_answers_without_crops() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::SeasonalPlanning, false, true));
        parts
            .weather
            .expect_current()
            .returning(|_, _| Err(AdvisorError::upstream("open-meteo", "Weather API error: 503")));
        let advisor = Arc::new(StubAdvisor::answering("Plan for autumn."));
        let (orchestrator, _) = parts.build(advisor.clone());

        let r = orchestrator
            .handle_message("Plan my winter", None, Language::English)
            .await;
        let weather = r.weather.unwrap();
        assert!(!weather.success);
        assert!(weather.error.unwrap().contains("503"));
        assert!(r.crop_recommendations.is_empty());
        assert!(!r.capabilities_used.weather_analysis);
        assert_eq!(r.response, "Plan for autumn.");
        assert!(!advisor.seen.lock().unwrap()[0].2);
    }

    #[tokio::test]
    async fn test_advice_failure_keeps_session_mutations() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::TechnicalAdvice, true, false));
        parts
            .locator
            .expect_extract()
            .returning(|_| resolution("London", "GB", 0.95));
        let (orchestrator, sessions) = parts.build(Arc::new(StubAdvisor::failing()));

        let r = orchestrator
            .handle_message("Blight in London", Some("keep"), Language::English)
            .await;
        assert!(r.success);
        assert!(!r.generation.success);
        assert_eq!(r.model_used, "unknown");
        assert_eq!(r.response, crate::synth::UNAVAILABLE_ADVICE);

        let session = sessions.get("keep").unwrap();
        let session = session.lock().await;
        assert_eq!(session.query_history.len(), 1);
        assert_eq!(session.current_location.city, "London");
    }

    #[tokio::test]
    async fn test_analyze_reports_needed_capabilities() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::TechnicalAdvice, true, false));
        parts
            .locator
            .expect_extract()
            .returning(|_| resolution("Delhi", "IN", 0.8));
        let (orchestrator, sessions) = parts.build(Arc::new(StubAdvisor::answering("unused")));

        let r = orchestrator.analyze("Fix blight in Delhi").await;
        assert!(r.capabilities_needed.technical_expertise);
        assert!(r.capabilities_needed.location_context);
        assert!(!r.capabilities_needed.weather_data);
        assert_eq!(r.location_extraction.unwrap().city.as_deref(), Some("Delhi"));
        assert!(sessions.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_messages_on_new_session_both_recorded() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::GeneralKnowledge, false, false));
        let advisor = Arc::new(StubAdvisor::answering("Rotate legumes with cereals."));
        let (orchestrator, sessions) = parts.build(advisor);

        let (a, b) = tokio::join!(
            orchestrator.handle_message("What is crop rotation?", Some("twin"), Language::English),
            orchestrator.handle_message("Which crops fix nitrogen?", Some("twin"), Language::English),
        );
        assert_eq!(a.session_id, "twin");
        assert_eq!(b.session_id, "twin");
        let mut counts = [a.message_count, b.message_count];
        counts.sort();
        assert_eq!(counts, [1, 2]);

        let handle = sessions.get("twin").unwrap();
        let session = handle.lock().await;
        assert_eq!(session.message_count, 2);
        assert_eq!(session.query_history.len(), 2);
    }

    #[tokio::test]
    async fn test_session_context_statistics_and_missing_session() {
        let mut parts = Parts::new();
        parts
            .classifier
            .expect_classify()
            .returning(|_| classification(QueryType::GeneralKnowledge, false, false));
        let (orchestrator, _) = parts.build(Arc::new(StubAdvisor::answering("ok")));

        orchestrator
            .handle_message("What is loam?", Some("ctx"), Language::English)
            .await;
        let ctx = orchestrator.session_context("ctx").await.unwrap();
        let stats = &ctx.session_context.statistics;
        assert_eq!(stats.total_queries, 1);
        assert_eq!(stats.query_type_distribution["general_knowledge"], 1);
        assert_eq!(stats.query_type_distribution["technical_advice"], 0);

        let err = orchestrator.session_context("nope").await.unwrap_err();
        assert!(matches!(err, AdvisorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_voice_runs_pipeline_on_transcript() {
        let mut parts = Parts::new();
        parts
            .transcriber
            .expect_transcribe()
            .times(1)
            .returning(|_, _, _, _| Ok(transcription("What crops grow well?", 0.42)));
        parts
            .classifier
            .expect_classify()
            .with(eq("What crops grow well?"))
            .returning(|_| classification(QueryType::GeneralKnowledge, false, false));
        let advisor = Arc::new(StubAdvisor::answering("Try rice."));
        let (orchestrator, sessions) = parts.build(advisor.clone());

        let r = orchestrator
            .handle_voice(VoiceRequest {
                audio: vec![1; 2048],
                content_type: "audio/webm".to_string(),
                session_id: Some("v".to_string()),
                language_code: "en".to_string(),
                options: vec![],
                validation_warnings: vec!["Very small audio file - may not contain speech".into()],
            })
            .await
            .unwrap();

        assert_eq!(r.transcription.transcript, "What crops grow well?");
        assert_eq!(r.chat_response.response, "Try rice.");
        assert_eq!(r.voice_metadata.audio_size_bytes, 2048);
        assert_eq!(r.voice_metadata.processing_chain.len(), 3);
        assert!(r.capabilities_used.voice_transcription);
        assert_eq!(r.warnings.len(), 2);
        assert!(r.warnings[0].starts_with("Low transcription confidence (0.42)"));
        assert_eq!(advisor.seen.lock().unwrap()[0].3, Language::English);

        let session = sessions.get("v").unwrap();
        let session = session.lock().await;
        assert_eq!(session.query_history[0].input_type, InputType::Voice);
        assert_eq!(session.query_history[0].confidence, Some(0.42));
        assert_eq!(
            session.last_voice_input.as_ref().unwrap().audio_duration,
            2.5
        );
    }

    #[tokio::test]
    async fn test_voice_transcription_error_stops_pipeline() {
        let mut parts = Parts::new();
        parts
            .transcriber
            .expect_transcribe()
            .returning(|_, _, _, _| Err(TranscriptionError::NoSpeech));
        parts.classifier.expect_classify().times(0);
        let (orchestrator, sessions) = parts.build(Arc::new(StubAdvisor::answering("unused")));

        let err = orchestrator
            .handle_voice(VoiceRequest {
                audio: vec![0; 10],
                content_type: "audio/webm".to_string(),
                session_id: None,
                language_code: "ja".to_string(),
                options: vec![],
                validation_warnings: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NO_SPEECH");
        assert!(sessions.is_empty());
    }
}
