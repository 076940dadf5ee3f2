use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intent category of an agricultural query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    WeatherDependent,
    GeneralKnowledge,
    TechnicalAdvice,
    SeasonalPlanning,
}

impl QueryType {
    pub const ALL: [QueryType; 4] = [
        QueryType::GeneralKnowledge,
        QueryType::TechnicalAdvice,
        QueryType::WeatherDependent,
        QueryType::SeasonalPlanning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::WeatherDependent => "weather_dependent",
            QueryType::GeneralKnowledge => "general_knowledge",
            QueryType::TechnicalAdvice => "technical_advice",
            QueryType::SeasonalPlanning => "seasonal_planning",
        }
    }

    /// Crop suggestions are only attached for these intents
    pub fn wants_crop_suggestions(&self) -> bool {
        matches!(self, QueryType::WeatherDependent | QueryType::SeasonalPlanning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Regional,
    Global,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClassification {
    pub query_type: QueryType,
    pub needs_weather: bool,
    pub needs_location: bool,
    pub scope: Scope,
    pub topics: Vec<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Output of location extraction for a single message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResolution {
    pub has_location: bool,
    pub city: Option<String>,
    pub country: Option<String>,
    pub confidence: f64,
    pub extracted_phrase: Option<String>,
}

impl LocationResolution {
    pub fn none() -> Self {
        Self {
            has_location: false,
            city: None,
            country: None,
            confidence: 0.0,
            extracted_phrase: None,
        }
    }

    /// Resolved location if found with both parts present and confidence above `threshold`
    pub fn accepted(&self, threshold: f64) -> Option<Location> {
        if !self.has_location || self.confidence <= threshold {
            return None;
        }
        match (&self.city, &self.country) {
            (Some(city), Some(country)) if !city.trim().is_empty() => Some(Location {
                city: city.trim().to_string(),
                country: country.trim().to_uppercase(),
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Japanese,
    English,
}

impl Language {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "japanese" => Some(Language::Japanese),
            "english" => Some(Language::English),
            _ => None,
        }
    }

    /// Voice requests carry a provider language code rather than a name
    pub fn from_voice_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("ja") {
            Language::Japanese
        } else {
            Language::English
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PestRisk {
    Low,
    Medium,
    High,
}

/// Raw meteorological readings for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub pressure: f64,
    pub precipitation: f64,
    pub soil_temperature: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub weather_code: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgriculturalAssessment {
    pub suitable_for_fieldwork: bool,
    pub irrigation_needed: bool,
    pub pest_risk: PestRisk,
    pub recommendations: Vec<String>,
}

/// Current conditions together with the assessment derived from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    #[serde(flatten)]
    pub conditions: CurrentConditions,
    pub agricultural_analysis: AgriculturalAssessment,
}

/// Weather outcome as embedded in chat responses
#[derive(Debug, Clone, Serialize)]
pub struct WeatherReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CurrentConditions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agricultural_analysis: Option<AgriculturalAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WeatherReport {
    pub fn from_snapshot(snapshot: WeatherSnapshot) -> Self {
        Self {
            success: true,
            data: Some(snapshot.conditions),
            agricultural_analysis: Some(snapshot.agricultural_analysis),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            agricultural_analysis: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdviceResult {
    pub success: bool,
    pub advice: String,
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptAlternative {
    pub transcript: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub model: String,
    pub audio_duration: f64,
    pub channels: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub success: bool,
    pub transcript: String,
    pub confidence: f64,
    pub language_detected: String,
    pub processing_time: f64,
    pub word_count: usize,
    pub alternatives: Vec<TranscriptAlternative>,
    pub metadata: AudioMetadata,
    pub timestamp: DateTime<Utc>,
}

// Gemini generateContent wire format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part { text: text.into() }],
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Model id goes into the URL path, not the body
    #[serde(skip)]
    pub model: String,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            model: model.into(),
            contents: vec![Content::user(prompt)],
            generation_config: config,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Text of the first candidate, None when absent or blank
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts: vec![Part { text: text.into() }],
                }),
            }],
        }
    }
}
