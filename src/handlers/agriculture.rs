use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use chrono::Datelike;
use serde::{Deserialize, Deserializer, Serialize};

use super::chat::parse_language;
use super::{AppState, Envelope};
use crate::agriculture::{
    self, CropRecommendation, IrrigationPlan, PestAssessment, Season, SeasonalAdvice,
};
use crate::error::{AdvisorError, Result};
use crate::models::{Location, WeatherSnapshot};
use crate::synth::AdviceRequest;
use crate::weather::sanitize_location;

#[derive(Debug, Default, Deserialize)]
pub struct FieldQuery {
    pub city: Option<String>,
    pub country: Option<String>,
    pub season: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub month: Option<String>,
    pub crop_type: Option<String>,
    pub soil_type: Option<String>,
}

impl FieldQuery {
    fn crop(&self) -> Option<&str> {
        self.crop_type.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    fn soil(&self) -> Option<&str> {
        self.soil_type.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Query strings carry text, JSON bodies may carry a bare number
fn text_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(Option::<Raw>::deserialize(d)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

fn field_body(payload: std::result::Result<Json<FieldQuery>, JsonRejection>) -> Result<FieldQuery> {
    payload
        .map(|Json(q)| q)
        .map_err(|_| AdvisorError::Validation("No JSON data provided".to_string()))
}

fn current_month() -> u32 {
    chrono::Local::now().month()
}

async fn conditions_for(
    state: &AppState,
    city: Option<&str>,
    country: Option<&str>,
) -> Result<(Location, WeatherSnapshot)> {
    let (city, country) =
        sanitize_location(city, country, &state.config.weather.default_location);
    let snapshot = state.weather.current(&city, &country).await?;
    Ok((Location::new(city, country), snapshot))
}

#[derive(Debug, Serialize)]
pub struct CropRecommendations {
    pub location: String,
    pub season: String,
    pub current_temperature: f64,
    pub current_humidity: f64,
    pub recommendations: Vec<CropRecommendation>,
}

pub async fn crop_recommendations(
    State(state): State<AppState>,
    Query(q): Query<FieldQuery>,
) -> Result<Json<Envelope<CropRecommendations>>> {
    let (_, snapshot) = conditions_for(&state, q.city.as_deref(), q.country.as_deref()).await?;
    let month = current_month();
    let season = q
        .season
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Season::for_month(month).as_str().to_string());

    let c = &snapshot.conditions;
    tracing::info!("Crop recommendations for {} at {}°C", c.location, c.temperature);
    Ok(Json(Envelope::ok(CropRecommendations {
        recommendations: agriculture::recommend_crops(c, month),
        location: c.location.clone(),
        season,
        current_temperature: c.temperature,
        current_humidity: c.humidity,
    })))
}

#[derive(Debug, Serialize)]
pub struct SeasonalAdviceData {
    pub location: String,
    #[serde(flatten)]
    pub advice: SeasonalAdvice,
    pub weather: WeatherSnapshot,
}

pub async fn seasonal_advice(
    State(state): State<AppState>,
    Query(q): Query<FieldQuery>,
) -> Result<Json<Envelope<SeasonalAdviceData>>> {
    let month = match q.month.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        None => current_month(),
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| {
                AdvisorError::Validation("Month must be between 1 and 12".to_string())
            })?,
    };

    let (_, snapshot) = conditions_for(&state, q.city.as_deref(), q.country.as_deref()).await?;
    let advice = agriculture::seasonal_advice(&snapshot, month);
    Ok(Json(Envelope::ok(SeasonalAdviceData {
        location: snapshot.conditions.location.clone(),
        advice,
        weather: snapshot,
    })))
}

#[derive(Debug, Serialize)]
pub struct PestRiskData {
    pub location: String,
    #[serde(flatten)]
    pub assessment: PestAssessment,
}

pub async fn pest_risk(
    State(state): State<AppState>,
    Query(q): Query<FieldQuery>,
) -> Result<Json<Envelope<PestRiskData>>> {
    let (_, snapshot) = conditions_for(&state, q.city.as_deref(), q.country.as_deref()).await?;
    let assessment = agriculture::assess_pests(&snapshot.conditions, q.crop());
    Ok(Json(Envelope::ok(PestRiskData {
        location: snapshot.conditions.location,
        assessment,
    })))
}

#[derive(Debug, Serialize)]
pub struct IrrigationData {
    pub location: String,
    #[serde(flatten)]
    pub plan: IrrigationPlan,
}

pub async fn irrigation(
    State(state): State<AppState>,
    Query(q): Query<FieldQuery>,
) -> Result<Json<Envelope<IrrigationData>>> {
    let (_, snapshot) = conditions_for(&state, q.city.as_deref(), q.country.as_deref()).await?;
    let plan = agriculture::irrigation_plan(&snapshot, q.crop(), q.soil());
    Ok(Json(Envelope::ok(IrrigationData {
        location: snapshot.conditions.location,
        plan,
    })))
}

// POST forms of the lookups take the same fields as a JSON body

pub async fn crop_recommendations_body(
    state: State<AppState>,
    payload: std::result::Result<Json<FieldQuery>, JsonRejection>,
) -> Result<Json<Envelope<CropRecommendations>>> {
    crop_recommendations(state, Query(field_body(payload)?)).await
}

pub async fn seasonal_advice_body(
    state: State<AppState>,
    payload: std::result::Result<Json<FieldQuery>, JsonRejection>,
) -> Result<Json<Envelope<SeasonalAdviceData>>> {
    seasonal_advice(state, Query(field_body(payload)?)).await
}

pub async fn pest_risk_body(
    state: State<AppState>,
    payload: std::result::Result<Json<FieldQuery>, JsonRejection>,
) -> Result<Json<Envelope<PestRiskData>>> {
    pest_risk(state, Query(field_body(payload)?)).await
}

pub async fn irrigation_body(
    state: State<AppState>,
    payload: std::result::Result<Json<FieldQuery>, JsonRejection>,
) -> Result<Json<Envelope<IrrigationData>>> {
    irrigation(state, Query(field_body(payload)?)).await
}

#[derive(Debug, Default, Deserialize)]
pub struct CropAnalysisBody {
    pub crop_type: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub growth_stage: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CropAnalysis {
    pub crop_type: String,
    pub growth_stage: Option<String>,
    pub location: String,
    pub analysis: String,
    pub model_used: Option<String>,
    pub known_growth_stages: Vec<String>,
    pub known_pests: Vec<String>,
    pub weather: WeatherSnapshot,
}

pub async fn crop_analysis(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CropAnalysisBody>, JsonRejection>,
) -> Result<Json<Envelope<CropAnalysis>>> {
    let Json(body) =
        payload.map_err(|_| AdvisorError::Validation("No JSON data provided".to_string()))?;
    let crop_type = body
        .crop_type
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AdvisorError::Validation("crop_type is required".to_string()))?
        .to_string();
    let growth_stage = body
        .growth_stage
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let language = parse_language(body.language.as_deref())?;

    let (location, snapshot) =
        conditions_for(&state, body.city.as_deref(), body.country.as_deref()).await?;

    let message = match &growth_stage {
        Some(stage) => format!(
            "Analyze current growing conditions for {crop_type} at the {stage} stage and advise on care."
        ),
        None => format!("Analyze current growing conditions for {crop_type} and advise on care."),
    };
    let advice = state
        .advisor
        .generate(&AdviceRequest {
            message: &message,
            intent: None,
            location: Some(&location),
            weather: Some(&snapshot.conditions),
            language,
        })
        .await;
    if !advice.success {
        tracing::warn!("Crop analysis for {} degraded: {:?}", crop_type, advice.error);
    }

    let profile = agriculture::crop(&crop_type);
    Ok(Json(Envelope::ok(CropAnalysis {
        known_growth_stages: profile
            .map(|p| p.growth_stages.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        known_pests: profile
            .map(|p| p.pests.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
        crop_type,
        growth_stage,
        location: snapshot.conditions.location.clone(),
        analysis: advice.advice,
        model_used: advice.model_used,
        weather: snapshot,
    })))
}
