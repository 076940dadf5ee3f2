use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

use crate::error::{AdvisorError, Result};
use crate::models::{GenerateRequest, GenerationConfig, QueryClassification, QueryType, Scope};
use crate::transport::Transport;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON block regex"));

const CLASSIFICATION_KEYS: [&str; 6] = [
    "query_type",
    "needs_weather",
    "needs_location",
    "scope",
    "topics",
    "confidence",
];

const IMMEDIACY_KEYWORDS: [&str; 7] = [
    "should i",
    "today",
    "now",
    "water",
    "irrigate",
    "spray",
    "harvest today",
];

const KNOWLEDGE_KEYWORDS: [&str; 6] = [
    "what",
    "which crops",
    "grown in",
    "types of",
    "varieties",
    "generally",
];

/// Pull the outermost `{...}` block out of a model reply and check it carries `required` keys
pub(crate) fn structured_reply(raw: &str, required: &[&str]) -> Result<serde_json::Value> {
    let json_text = JSON_BLOCK
        .find(raw)
        .map(|m| m.as_str())
        .unwrap_or_else(|| raw.trim());
    let value: serde_json::Value = serde_json::from_str(json_text).map_err(|e| {
        AdvisorError::Internal(format!("Failed to deserialize model JSON: {e}. Raw: {raw}"))
    })?;
    let object = value
        .as_object()
        .ok_or_else(|| AdvisorError::Internal(format!("Model reply is not an object. Raw: {raw}")))?;
    if let Some(missing) = required.iter().find(|k| !object.contains_key(**k)) {
        return Err(AdvisorError::Internal(format!(
            "Model reply missing required field '{missing}'"
        )));
    }
    Ok(value)
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Never fails: a deterministic classification is returned when the model path does
    async fn classify(&self, message: &str) -> QueryClassification;
}

pub struct GeminiIntent {
    tx: Option<Arc<dyn Transport>>,
    model: String,
}

impl GeminiIntent {
    pub fn new(tx: Option<Arc<dyn Transport>>, model: String) -> Self {
        Self { tx, model }
    }

    async fn classify_with_model(
        &self,
        tx: &dyn Transport,
        message: &str,
    ) -> Result<QueryClassification> {
        let request = GenerateRequest::prompt(
            self.model.clone(),
            classification_prompt(message),
            GenerationConfig {
                temperature: 0.1,
                max_output_tokens: 300,
                top_p: None,
                response_mime_type: Some("application/json".to_string()),
            },
        );

        let response = tx.generate(&request).await?;
        let raw = response.text().ok_or_else(|| {
            AdvisorError::Internal("Gemini returned no text for classification".to_string())
        })?;

        let value = structured_reply(&raw, &CLASSIFICATION_KEYS)?;
        if !value["confidence"].is_number() {
            return Err(AdvisorError::Internal(format!(
                "Classification confidence is not numeric. Raw: {raw}"
            )));
        }
        let mut classification: QueryClassification =
            serde_json::from_value(value).map_err(|e| {
                AdvisorError::Internal(format!(
                    "Failed to deserialize classification JSON: {e}. Raw: {raw}"
                ))
            })?;
        classification.confidence = classification.confidence.clamp(0.0, 1.0);
        Ok(classification)
    }
}

#[async_trait]
impl IntentClassifier for GeminiIntent {
    async fn classify(&self, message: &str) -> QueryClassification {
        tracing::info!("Classifying query: {}", message);

        let Some(tx) = self.tx.as_deref() else {
            return fallback_classification(message);
        };

        match self.classify_with_model(tx, message).await {
            Ok(classification) => {
                tracing::info!(
                    "Query classified: {} (confidence: {})",
                    classification.query_type.as_str(),
                    classification.confidence
                );
                classification
            }
            Err(e) => {
                tracing::warn!("Query classification failed, using keyword fallback: {}", e);
                fallback_classification(message)
            }
        }
    }
}

/// Keyword classification, checked in order: immediacy terms, then enumerative terms
pub fn fallback_classification(message: &str) -> QueryClassification {
    let lowered = message.to_lowercase();

    if IMMEDIACY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return QueryClassification {
            query_type: QueryType::WeatherDependent,
            needs_weather: true,
            needs_location: true,
            scope: Scope::Local,
            topics: vec!["weather".to_string()],
            confidence: 0.7,
            reasoning: Some("Pattern-based classification".to_string()),
        };
    }

    let (topic, confidence, reasoning) = if KNOWLEDGE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        ("crops", 0.6, "Pattern-based classification")
    } else {
        ("agriculture", 0.5, "Default classification")
    };

    QueryClassification {
        query_type: QueryType::GeneralKnowledge,
        needs_weather: false,
        needs_location: false,
        scope: Scope::Global,
        topics: vec![topic.to_string()],
        confidence,
        reasoning: Some(reasoning.to_string()),
    }
}

fn classification_prompt(message: &str) -> String {
    format!(
        r#"Analyze this agricultural query and classify it to determine the best response strategy.

User query: "{message}"

Classify the query and return ONLY valid JSON in this exact format:
{{
    "query_type": "weather_dependent" | "general_knowledge" | "technical_advice" | "seasonal_planning",
    "needs_weather": boolean,
    "needs_location": boolean,
    "scope": "local" | "regional" | "global",
    "topics": ["topic1", "topic2"],
    "confidence": float_between_0_and_1,
    "reasoning": "brief explanation"
}}

Query Type Definitions:
- "weather_dependent": Requires current weather data (irrigation, daily farm work, immediate pest risks)
- "general_knowledge": Broad agricultural facts, crop information, farming practices
- "technical_advice": Specific problems, diseases, fertilizers, techniques
- "seasonal_planning": Long-term planning, planting schedules, crop rotation

Examples:
- "Should I water my crops today?" -> weather_dependent, needs_weather=true, needs_location=true
- "What crops are grown in India during winter?" -> general_knowledge, needs_weather=false, needs_location=false
- "How to control aphids in tomatoes?" -> technical_advice, needs_weather=false, needs_location=false
- "When to plant wheat in Punjab?" -> seasonal_planning, needs_weather=false, needs_location=true
"#
    )
}
