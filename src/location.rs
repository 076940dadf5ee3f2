use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::error::{AdvisorError, Result};
use crate::intent::structured_reply;
use crate::models::{GenerateRequest, GenerationConfig, LocationResolution};
use crate::transport::Transport;

const LOCATION_KEYS: [&str; 5] = [
    "has_location",
    "city",
    "country",
    "confidence",
    "extracted_phrase",
];

/// Cities recognised without a model, checked in this order
const KNOWN_CITIES: [(&str, &str, &str); 10] = [
    ("mumbai", "Mumbai", "IN"),
    ("delhi", "Delhi", "IN"),
    ("london", "London", "GB"),
    ("paris", "Paris", "FR"),
    ("berlin", "Berlin", "DE"),
    ("tokyo", "Tokyo", "JP"),
    ("new york", "New York", "US"),
    ("bangkok", "Bangkok", "TH"),
    ("sydney", "Sydney", "AU"),
    ("cairo", "Cairo", "EG"),
];

static PHRASE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bin\s+([A-Za-z][A-Za-z\s]+?)(?:\s*,|\s*\?|\s*$)",
        r"(?i)about\s+([A-Za-z][A-Za-z\s]+?)(?:\s*,|\s*\?|\s*$)",
        r"(?i)weather\s+in\s+([A-Za-z][A-Za-z\s]+?)(?:\s*,|\s*\?|\s*$)",
        r"(?i)farming\s+in\s+([A-Za-z][A-Za-z\s]+?)(?:\s*,|\s*\?|\s*$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid location phrase regex"))
    .collect()
});

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocationExtractor: Send + Sync {
    /// Never fails: returns `has_location = false` when nothing is recognised
    async fn extract(&self, message: &str) -> LocationResolution;
}

pub struct GeminiLocation {
    tx: Option<Arc<dyn Transport>>,
    model: String,
}

impl GeminiLocation {
    pub fn new(tx: Option<Arc<dyn Transport>>, model: String) -> Self {
        Self { tx, model }
    }

    async fn extract_with_model(
        &self,
        tx: &dyn Transport,
        message: &str,
    ) -> Result<LocationResolution> {
        let request = GenerateRequest::prompt(
            self.model.clone(),
            extraction_prompt(message),
            GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 200,
                top_p: None,
                response_mime_type: Some("application/json".to_string()),
            },
        );

        let response = tx.generate(&request).await?;
        let raw = response.text().ok_or_else(|| {
            AdvisorError::Internal("Gemini returned no text for location extraction".to_string())
        })?;

        let value = structured_reply(&raw, &LOCATION_KEYS)?;
        let mut resolution: LocationResolution = serde_json::from_value(value).map_err(|e| {
            AdvisorError::Internal(format!(
                "Failed to deserialize location JSON: {e}. Raw: {raw}"
            ))
        })?;
        resolution.confidence = resolution.confidence.clamp(0.0, 1.0);
        Ok(resolution)
    }
}

#[async_trait]
impl LocationExtractor for GeminiLocation {
    async fn extract(&self, message: &str) -> LocationResolution {
        let Some(tx) = self.tx.as_deref() else {
            return fallback_extraction(message);
        };

        match self.extract_with_model(tx, message).await {
            Ok(resolution) => {
                tracing::info!(
                    "Location extracted: {:?}, {:?} (confidence: {})",
                    resolution.city,
                    resolution.country,
                    resolution.confidence
                );
                resolution
            }
            Err(e) => {
                tracing::warn!("Location extraction failed, using dictionary fallback: {}", e);
                fallback_extraction(message)
            }
        }
    }
}

/// Dictionary lookup first (0.8), then phrase patterns cross-checked against it (0.7)
pub fn fallback_extraction(message: &str) -> LocationResolution {
    let lowered = message.to_lowercase();

    if let Some((key, city, country)) = KNOWN_CITIES.iter().find(|(k, _, _)| lowered.contains(k)) {
        return LocationResolution {
            has_location: true,
            city: Some(city.to_string()),
            country: Some(country.to_string()),
            confidence: 0.8,
            extracted_phrase: Some(title_case(key)),
        };
    }

    for pattern in PHRASE_PATTERNS.iter() {
        let Some(captured) = pattern.captures(message).and_then(|c| c.get(1)) else {
            continue;
        };
        let phrase = captured.as_str().trim();
        let normalized = phrase
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if let Some((_, city, country)) = KNOWN_CITIES.iter().find(|(k, _, _)| *k == normalized) {
            return LocationResolution {
                has_location: true,
                city: Some(city.to_string()),
                country: Some(country.to_string()),
                confidence: 0.7,
                extracted_phrase: Some(phrase.to_string()),
            };
        }
    }

    LocationResolution::none()
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn extraction_prompt(message: &str) -> String {
    format!(
        r#"Analyze this user message and extract location information for weather/agricultural queries.

User message: "{message}"

Rules:
1. Look for city names, country names, or location references
2. Focus on locations relevant to weather/farming context
3. Return JSON format only, no additional text
4. If no clear location found, set has_location to false

Required JSON format:
{{
    "has_location": boolean,
    "city": "city name or null",
    "country": "2-letter country code or null",
    "confidence": float between 0.0 and 1.0,
    "extracted_phrase": "original location phrase from message or null"
}}

Examples:
- "How's farming in Mumbai?" -> {{"has_location": true, "city": "Mumbai", "country": "IN", "confidence": 0.9, "extracted_phrase": "Mumbai"}}
- "Tell me about agriculture in London, UK" -> {{"has_location": true, "city": "London", "country": "GB", "confidence": 0.95, "extracted_phrase": "London, UK"}}
- "What crops grow well?" -> {{"has_location": false, "city": null, "country": null, "confidence": 0.0, "extracted_phrase": null}}
"#
    )
}
