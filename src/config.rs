use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the advisor service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub weather: WeatherConfig,
    pub transcription: TranscriptionConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub classifier_model: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub forecast_url: String,
    pub geocoding_url: String,
    pub archive_url: String,
    pub default_location: DefaultLocation,
}

/// Location used when a session has none yet and when geocoding misses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultLocation {
    pub city: String,
    pub country: String,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub default_language: String,
    pub timeout_seconds: u64,
    pub max_file_bytes: u64,
}

impl TranscriptionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub max_message_chars: usize,
    pub location_confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_ttl_seconds: u64,
    pub max_sessions: usize,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!(
                "No .env file found in any expected location - continuing with env vars only"
            );
        }

        let config_path =
            env::var("AGRI_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => Self::from_yaml(&contents).unwrap_or_else(|e| {
                    tracing::error!(
                        "Failed to parse config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }),
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        // Validate configuration - log warnings but don't fail
        for warning in config.validate() {
            tracing::warn!("Config validation warning: {} - continuing anyway", warning);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str::<Config>(contents)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = var("AGRI_BIND") {
            self.server.bind = bind;
        } else if let Some(port) = var("PORT") {
            if let Ok(port_num) = port.parse::<u16>() {
                self.server.bind = format!("0.0.0.0:{port_num}");
            }
        }

        // Gemini overrides
        if let Some(api_key) = var("GEMINI_API_KEY")
            .or_else(|| var("GOOGLE_API_KEY"))
            .filter(|k| !k.trim().is_empty())
        {
            self.gemini.api_key = Some(api_key);
        }
        if let Some(url) = var("GEMINI_BASE_URL") {
            self.gemini.base_url = url;
        }
        if let Some(model) = var("GEMINI_PRIMARY_MODEL") {
            self.gemini.primary_model = model;
        }
        if let Some(model) = var("GEMINI_FALLBACK_MODEL") {
            self.gemini.fallback_model = model;
        }
        if let Some(model) = var("GEMINI_CLASSIFIER_MODEL") {
            self.gemini.classifier_model = model;
        }

        // Open-Meteo serves each API from its own host
        if let Some(url) = var("OPENMETEO_FORECAST_URL") {
            self.weather.forecast_url = url;
        }
        if let Some(url) = var("OPENMETEO_GEOCODING_URL") {
            self.weather.geocoding_url = url;
        }
        if let Some(url) = var("OPENMETEO_ARCHIVE_URL") {
            self.weather.archive_url = url;
        }

        // Deepgram overrides
        if let Some(api_key) = var("DEEPGRAM_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.transcription.api_key = Some(api_key);
        }
        if let Some(model) = var("DEEPGRAM_MODEL") {
            self.transcription.model = model;
        }

        // Session overrides
        if let Some(ttl_secs) = var("AGRI_SESSION_TTL_SECONDS").and_then(|t| t.parse().ok()) {
            self.session.idle_ttl_seconds = ttl_secs;
        }
        if let Some(max_sessions) = var("AGRI_MAX_SESSIONS").and_then(|m| m.parse().ok()) {
            self.session.max_sessions = max_sessions;
        }
    }

    /// Collect validation warnings; an empty list means the config is sane
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.gemini.api_key.is_none() {
            warnings.push(
                "GEMINI_API_KEY not set - classification, location extraction and advice will use fallbacks"
                    .to_string(),
            );
        }
        if self.transcription.api_key.is_none() {
            warnings.push("DEEPGRAM_API_KEY not set - voice transcription disabled".to_string());
        }
        if !(0.0..=1.0).contains(&self.chat.location_confidence_threshold) {
            warnings.push(
                "chat.location_confidence_threshold must be between 0.0 and 1.0".to_string(),
            );
        }
        if self.chat.max_message_chars == 0 {
            warnings.push("chat.max_message_chars cannot be 0".to_string());
        }
        if self.session.max_sessions == 0 {
            warnings.push("session.max_sessions cannot be 0".to_string());
        }
        if self.transcription.timeout_seconds == 0 {
            warnings.push("transcription.timeout_seconds cannot be 0".to_string());
        }

        warnings
    }

    pub fn gemini_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini.timeout_seconds)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.idle_ttl_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "Agriculture Helper API".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                bind: "127.0.0.1:5000".to_string(),
            },
            gemini: GeminiConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                classifier_model: "gemini-2.5-flash".to_string(),
                primary_model: "gemini-2.5-flash".to_string(),
                fallback_model: "gemini-2.0-flash".to_string(),
                timeout_seconds: 60,
            },
            weather: WeatherConfig {
                forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
                geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
                archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
                default_location: DefaultLocation {
                    city: "Tokyo".to_string(),
                    country: "JP".to_string(),
                    label: "Tokyo, Japan".to_string(),
                    latitude: 35.6762,
                    longitude: 139.6503,
                },
            },
            transcription: TranscriptionConfig {
                api_key: None,
                api_url: "https://api.deepgram.com/v1/listen".to_string(),
                model: "nova-2".to_string(),
                default_language: "ja".to_string(),
                timeout_seconds: 30,
                max_file_bytes: 500 * 1024 * 1024,
            },
            chat: ChatConfig {
                max_message_chars: 1000,
                location_confidence_threshold: 0.6,
            },
            session: SessionConfig {
                idle_ttl_seconds: 60 * 60 * 24,
                max_sessions: 10_000,
            },
        }
    }
}
