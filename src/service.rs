use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::intent::{GeminiIntent, IntentClassifier};
use crate::location::{GeminiLocation, LocationExtractor};
use crate::models::Location;
use crate::orchestrator::Orchestrator;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::synth::{AdviceGenerator, GeminiSynth};
use crate::transcription::{DeepgramGateway, TranscriptionGateway};
use crate::transport::{GeminiTransport, Transport};
use crate::weather::{OpenMeteoGateway, WeatherGateway};

/// Everything the HTTP layer needs, built once at startup
#[derive(Clone)]
pub struct AdvisorService {
    pub config: Arc<Config>,
    pub orchestrator: Arc<Orchestrator>,
    pub weather: Arc<dyn WeatherGateway>,
    pub advisor: Arc<dyn AdviceGenerator>,
}

impl AdvisorService {
    pub fn new(config: Config) -> Result<Self> {
        tracing::info!("Service::new() - Starting initialization");

        let transport: Option<Arc<dyn Transport>> = match config.gemini.api_key.clone() {
            Some(api_key) => {
                tracing::info!("Service::new() - Creating Gemini transport");
                Some(Arc::new(GeminiTransport::new(
                    api_key,
                    config.gemini.base_url.clone(),
                    config.gemini_timeout(),
                )?))
            }
            None => {
                tracing::warn!("Service::new() - No Gemini API key, model-backed stages use fallbacks");
                None
            }
        };

        let classifier: Arc<dyn IntentClassifier> = Arc::new(GeminiIntent::new(
            transport.clone(),
            config.gemini.classifier_model.clone(),
        ));
        let locator: Arc<dyn LocationExtractor> = Arc::new(GeminiLocation::new(
            transport.clone(),
            config.gemini.classifier_model.clone(),
        ));
        let advisor: Arc<dyn AdviceGenerator> = Arc::new(GeminiSynth::new(
            transport,
            config.gemini.primary_model.clone(),
            config.gemini.fallback_model.clone(),
        ));
        tracing::info!("Service::new() - Model-backed components created");

        let weather: Arc<dyn WeatherGateway> = Arc::new(OpenMeteoGateway::new(&config.weather)?);
        tracing::info!("Service::new() - Weather gateway created");

        let transcriber: Arc<dyn TranscriptionGateway> =
            Arc::new(DeepgramGateway::new(&config.transcription)?);
        tracing::info!(
            "Service::new() - Transcription gateway created (configured: {})",
            transcriber.is_configured()
        );

        let default = &config.weather.default_location;
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
            config.session_ttl(),
            config.session.max_sessions,
            Location::new(default.city.clone(), default.country.clone()),
        ));

        let orchestrator = Arc::new(Orchestrator::new(
            classifier,
            locator,
            weather.clone(),
            advisor.clone(),
            transcriber,
            sessions,
            config.chat.location_confidence_threshold,
        ));

        tracing::info!("Service::new() - Service initialization complete");
        Ok(Self {
            config: Arc::new(config),
            orchestrator,
            weather,
            advisor,
        })
    }
}
