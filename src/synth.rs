use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{
    AdviceResult, CurrentConditions, GenerateRequest, GenerationConfig, Language, Location,
    QueryType,
};
use crate::prompts::{self, PromptContext, PromptTemplate};
use crate::transport::Transport;

pub const UNAVAILABLE_ADVICE: &str = "AI models are temporarily unavailable";
pub const FALLBACK_MODEL_MARKER: &str = "fallback-response";

/// Everything the advice prompt can draw on
#[derive(Debug, Clone, Copy)]
pub struct AdviceRequest<'a> {
    pub message: &'a str,
    /// None selects the comprehensive template
    pub intent: Option<QueryType>,
    pub location: Option<&'a Location>,
    pub weather: Option<&'a CurrentConditions>,
    pub language: Language,
}

#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    async fn generate(&self, request: &AdviceRequest<'_>) -> AdviceResult;
}

pub struct GeminiSynth {
    tx: Option<Arc<dyn Transport>>,
    model_primary: String,
    model_fallback: String,
}

impl GeminiSynth {
    pub fn new(tx: Option<Arc<dyn Transport>>, model_primary: String, model_fallback: String) -> Self {
        Self {
            tx,
            model_primary,
            model_fallback,
        }
    }
}

#[async_trait]
impl AdviceGenerator for GeminiSynth {
    async fn generate(&self, request: &AdviceRequest<'_>) -> AdviceResult {
        let template = PromptTemplate::for_intent(request.intent);
        tracing::info!(
            "Generating advice with template {} (v{}) for: {}",
            template.name(),
            prompts::TEMPLATE_VERSION,
            request.message
        );

        let Some(tx) = self.tx.as_deref() else {
            tracing::warn!("No generative backend configured - returning guidance text");
            return AdviceResult {
                success: true,
                advice: unconfigured_guidance(request.message, request.language),
                model_used: Some(FALLBACK_MODEL_MARKER.to_string()),
                error: None,
            };
        };

        let prompt = prompts::render(
            template,
            request.language,
            request.message,
            PromptContext {
                location: request.location,
                weather: request.weather,
            },
        );

        for model in [&self.model_primary, &self.model_fallback] {
            let req = GenerateRequest::prompt(
                model.clone(),
                prompt.clone(),
                GenerationConfig {
                    temperature: 0.7,
                    max_output_tokens: 700,
                    top_p: Some(0.9),
                    response_mime_type: None,
                },
            );

            match tx.generate(&req).await {
                Ok(response) => match response.text() {
                    Some(advice) => {
                        return AdviceResult {
                            success: true,
                            advice,
                            model_used: Some(model.clone()),
                            error: None,
                        };
                    }
                    None => tracing::warn!("Model {} returned empty text", model),
                },
                Err(e) => tracing::error!("Model {} failed: {}", model, e),
            }
        }

        AdviceResult {
            success: false,
            advice: UNAVAILABLE_ADVICE.to_string(),
            model_used: None,
            error: Some("All models failed".to_string()),
        }
    }
}

fn unconfigured_guidance(message: &str, language: Language) -> String {
    match language {
        Language::Japanese => format!(
            "申し訳ございませんが、AIサービスに一時的な問題が発生しています。\n\n\
             「{message}」について：\n\n\
             基本的なガイダンス:\n\
             ・地域の農業普及センターに相談することをお勧めします\n\
             ・農業関連の信頼できるウェブサイトで情報を確認してください\n\
             ・地元の農家や農業組合からアドバイスを求めてください\n\n\
             後ほど再度お試しください。\n\n\
             ---\n\
             [English] Sorry for the temporary AI service issue. For \"{message}\", we recommend consulting local agricultural extension services, checking reliable agricultural websites, or seeking advice from local farmers and agricultural cooperatives."
        ),
        Language::English => format!(
            "Sorry, there's a temporary AI service issue.\n\n\
             For your question about \"{message}\":\n\n\
             Basic guidance:\n\
             - Consult local agricultural extension services\n\
             - Check reliable agricultural websites\n\
             - Seek advice from local farmers and cooperatives\n\n\
             Please try again later."
        ),
    }
}
