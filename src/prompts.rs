//! Advice prompt templates.
//!
//! Template text is plain data keyed by (template, language). Rendering only
//! stitches the role line, the available context, the question and the
//! aspect list together.

use crate::models::{CurrentConditions, Language, Location, QueryType};

/// Bumped whenever template wording changes
pub const TEMPLATE_VERSION: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    WeatherDependent,
    GeneralKnowledge,
    TechnicalAdvice,
    SeasonalPlanning,
    Comprehensive,
}

impl PromptTemplate {
    /// No intent selects the comprehensive template
    pub fn for_intent(intent: Option<QueryType>) -> Self {
        match intent {
            Some(QueryType::WeatherDependent) => PromptTemplate::WeatherDependent,
            Some(QueryType::GeneralKnowledge) => PromptTemplate::GeneralKnowledge,
            Some(QueryType::TechnicalAdvice) => PromptTemplate::TechnicalAdvice,
            Some(QueryType::SeasonalPlanning) => PromptTemplate::SeasonalPlanning,
            None => PromptTemplate::Comprehensive,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PromptTemplate::WeatherDependent => "weather_dependent",
            PromptTemplate::GeneralKnowledge => "general_knowledge",
            PromptTemplate::TechnicalAdvice => "technical_advice",
            PromptTemplate::SeasonalPlanning => "seasonal_planning",
            PromptTemplate::Comprehensive => "comprehensive",
        }
    }
}

struct TemplateText {
    role: &'static str,
    question_label: &'static str,
    aspects_intro: &'static str,
    aspects: &'static [&'static str],
    closing: &'static str,
}

const JA_CLOSING: &str = "実践的なアドバイスを500文字以内で提供し、最後に英語の要約も追加してください。";
const EN_CLOSING: &str = "Provide practical advice, under 400 words.";

fn template_text(template: PromptTemplate, language: Language) -> TemplateText {
    match (template, language) {
        (PromptTemplate::WeatherDependent, Language::Japanese) => TemplateText {
            role: "あなたは農業気象の専門家です。現在の天候条件を詳細に分析し、すぐに役立つ農業アドバイスを提供してください。",
            question_label: "質問",
            aspects_intro: "以下の観点から具体的なアドバイスを提供してください：",
            aspects: &[
                "現在の天候が農作物に与える影響",
                "今日実行すべき緊急作業",
                "今週の推奨作業スケジュール",
                "天候に基づくリスク評価",
                "病害虫発生の可能性",
                "灌漑・水管理の調整",
                "天候変化への準備対策",
            ],
            closing: JA_CLOSING,
        },
        (PromptTemplate::WeatherDependent, Language::English) => TemplateText {
            role: "You are an agricultural meteorology expert. Analyze current weather conditions in detail and provide immediate agricultural advice.",
            question_label: "Question",
            aspects_intro: "Provide specific advice covering:",
            aspects: &[
                "Current weather impact on crops",
                "Urgent tasks to perform today",
                "Recommended work schedule this week",
                "Weather-based risk assessment",
                "Pest and disease probability",
                "Irrigation and water management adjustments",
                "Preparation for weather changes",
            ],
            closing: EN_CLOSING,
        },
        (PromptTemplate::GeneralKnowledge, Language::Japanese) => TemplateText {
            role: "あなたは農業の百科事典的な専門家です。以下の質問に対して、包括的で詳細な農業知識を提供してください。",
            question_label: "質問",
            aspects_intro: "以下の観点から詳しく回答してください：",
            aspects: &[
                "基本的な農業知識と事実",
                "作物の種類、品種、特徴",
                "栽培方法と技術",
                "地域による違いや適応性",
                "歴史的背景や文化的側面",
                "現代の農業技術との関連",
            ],
            closing: JA_CLOSING,
        },
        (PromptTemplate::GeneralKnowledge, Language::English) => TemplateText {
            role: "You are an encyclopedic agricultural expert. Provide comprehensive and detailed agricultural knowledge for this question.",
            question_label: "Question",
            aspects_intro: "Address these aspects thoroughly:",
            aspects: &[
                "Fundamental agricultural knowledge and facts",
                "Crop types, varieties, and characteristics",
                "Cultivation methods and techniques",
                "Regional differences and adaptations",
                "Historical background and cultural aspects",
                "Modern agricultural technology connections",
            ],
            closing: EN_CLOSING,
        },
        (PromptTemplate::TechnicalAdvice, Language::Japanese) => TemplateText {
            role: "あなたは農業技術の専門家です。以下の技術的問題に対して、科学的根拠に基づいた具体的な解決策を提供してください。",
            question_label: "技術的課題",
            aspects_intro: "以下の要素を含む詳細な回答をしてください：",
            aspects: &[
                "問題の科学的分析と原因",
                "段階的な解決方法",
                "必要な資材・薬剤・設備",
                "実施時期とスケジュール",
                "予防策と管理方法",
                "コスト効果と代替手段",
                "リスク管理と安全対策",
            ],
            closing: JA_CLOSING,
        },
        (PromptTemplate::TechnicalAdvice, Language::English) => TemplateText {
            role: "You are an agricultural technology expert. Provide scientifically-based, specific solutions for this technical challenge.",
            question_label: "Technical challenge",
            aspects_intro: "Include these detailed elements:",
            aspects: &[
                "Scientific analysis and root causes",
                "Step-by-step solution methods",
                "Required materials, chemicals, equipment",
                "Implementation timing and schedule",
                "Prevention strategies and management",
                "Cost-effectiveness and alternatives",
                "Risk management and safety measures",
            ],
            closing: EN_CLOSING,
        },
        (PromptTemplate::SeasonalPlanning, Language::Japanese) => TemplateText {
            role: "あなたは農業計画の専門家です。季節と時期に関する農業計画について、包括的なアドバイスを提供してください。",
            question_label: "計画相談",
            aspects_intro: "以下の要素を含む詳細な計画を提示してください：",
            aspects: &[
                "最適なタイミングと季節スケジュール",
                "地域の気候特性による調整",
                "作物ローテーションと輪作計画",
                "各段階での作業内容",
                "リスク管理と代替計画",
                "市場性と経済性の考慮",
                "持続可能性と環境配慮",
            ],
            closing: JA_CLOSING,
        },
        (PromptTemplate::SeasonalPlanning, Language::English) => TemplateText {
            role: "You are an agricultural planning expert. Provide comprehensive seasonal planning and timing advice.",
            question_label: "Planning inquiry",
            aspects_intro: "Include these detailed planning elements:",
            aspects: &[
                "Optimal timing and seasonal schedules",
                "Regional climate adjustments",
                "Crop rotation and succession planning",
                "Stage-specific activities",
                "Risk management and contingency plans",
                "Market considerations and economics",
                "Sustainability and environmental factors",
            ],
            closing: EN_CLOSING,
        },
        (PromptTemplate::Comprehensive, Language::Japanese) => TemplateText {
            role: "あなたは総合的な農業アドバイザーです。以下の質問に対して、あらゆる角度から包括的な農業アドバイスを提供してください。",
            question_label: "質問",
            aspects_intro: "以下の全ての観点から総合的に回答してください：",
            aspects: &[
                "一般的な農業知識",
                "技術的な解決方法",
                "季節・時期的な考慮事項",
                "天候・環境要因",
                "地域特性への適応",
                "経済的・実用的側面",
                "持続可能性と将来性",
            ],
            closing: JA_CLOSING,
        },
        (PromptTemplate::Comprehensive, Language::English) => TemplateText {
            role: "You are a comprehensive agricultural advisor. Provide holistic agricultural advice covering all relevant aspects for this question.",
            question_label: "Question",
            aspects_intro: "Address all relevant aspects comprehensively:",
            aspects: &[
                "General agricultural knowledge",
                "Technical solutions",
                "Seasonal and timing considerations",
                "Weather and environmental factors",
                "Regional adaptations",
                "Economic and practical aspects",
                "Sustainability and future considerations",
            ],
            closing: EN_CLOSING,
        },
    }
}

/// Context available to a prompt; either part may be missing
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptContext<'a> {
    pub location: Option<&'a Location>,
    pub weather: Option<&'a CurrentConditions>,
}

pub fn render(
    template: PromptTemplate,
    language: Language,
    message: &str,
    ctx: PromptContext<'_>,
) -> String {
    let text = template_text(template, language);
    let mut sections = vec![text.role.to_string()];

    if let Some(location) = ctx.location {
        sections.push(location_block(location, language));
    }
    if let Some(weather) = ctx.weather {
        sections.push(weather_block(weather, language));
    }

    sections.push(format!("{}: {}", text.question_label, message));

    let aspects = text
        .aspects
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a))
        .collect::<Vec<_>>()
        .join("\n");
    sections.push(format!("{}\n{}", text.aspects_intro, aspects));
    sections.push(text.closing.to_string());

    sections.join("\n\n")
}

fn location_block(location: &Location, language: Language) -> String {
    match language {
        Language::Japanese => format!("場所: {}, {}", location.city, location.country),
        Language::English => format!("Location context: {}, {}", location.city, location.country),
    }
}

fn weather_block(w: &CurrentConditions, language: Language) -> String {
    match language {
        Language::Japanese => format!(
            "現在の気象情報:\n- 場所: {}\n- 気温: {}°C (体感温度: {}°C)\n- 湿度: {}%\n- 天候: {}\n- 風速: {} m/s\n- 降水量: {}mm",
            w.location, w.temperature, w.feels_like, w.humidity, w.description, w.wind_speed, w.precipitation
        ),
        Language::English => format!(
            "Current weather:\n- Location: {}\n- Temperature: {}°C (feels like {}°C)\n- Humidity: {}%\n- Conditions: {}\n- Wind speed: {} m/s\n- Precipitation: {}mm",
            w.location, w.temperature, w.feels_like, w.humidity, w.description, w.wind_speed, w.precipitation
        ),
    }
}
