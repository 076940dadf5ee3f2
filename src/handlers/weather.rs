use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{AppState, Envelope};
use crate::error::{AdvisorError, Result};
use crate::models::WeatherSnapshot;
use crate::weather::{
    self, Forecast, HISTORICAL_DAYS, Historical, MAX_FORECAST_DAYS, MAX_SEARCH_RESULTS, PlaceMatch,
};

const DEFAULT_FORECAST_DAYS: u32 = 3;
const DEFAULT_SEARCH_LIMIT: u32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub city: Option<String>,
    pub country: Option<String>,
    pub days: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub locations: Vec<PlaceMatch>,
    pub query: String,
}

/// Parse an optional integer parameter and clamp it into `min..=max`
pub(crate) fn bounded(
    raw: Option<&str>,
    default: u32,
    min: u32,
    max: u32,
    name: &str,
) -> Result<u32> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default);
    };
    let value: i64 = raw
        .parse()
        .map_err(|_| AdvisorError::Validation(format!("Invalid {name} parameter")))?;
    Ok(value.clamp(i64::from(min), i64::from(max)) as u32)
}

pub async fn current(
    State(state): State<AppState>,
    Query(q): Query<LocationQuery>,
) -> Result<Json<Envelope<WeatherSnapshot>>> {
    let (city, country) = weather::sanitize_location(
        q.city.as_deref(),
        q.country.as_deref(),
        &state.config.weather.default_location,
    );
    let snapshot = state.weather.current(&city, &country).await?;
    Ok(Json(Envelope::ok(snapshot)))
}

pub async fn forecast(
    State(state): State<AppState>,
    Query(q): Query<LocationQuery>,
) -> Result<Json<Envelope<Forecast>>> {
    let (city, country) = weather::sanitize_location(
        q.city.as_deref(),
        q.country.as_deref(),
        &state.config.weather.default_location,
    );
    let days = bounded(
        q.days.as_deref(),
        DEFAULT_FORECAST_DAYS,
        1,
        MAX_FORECAST_DAYS,
        "days",
    )?;
    let forecast = state.weather.forecast(&city, &country, days).await?;
    Ok(Json(Envelope::ok(forecast)))
}

pub async fn historical(
    State(state): State<AppState>,
    Query(q): Query<LocationQuery>,
) -> Result<Json<Envelope<Historical>>> {
    let (city, country) = weather::sanitize_location(
        q.city.as_deref(),
        q.country.as_deref(),
        &state.config.weather.default_location,
    );
    let history = state
        .weather
        .historical(&city, &country, HISTORICAL_DAYS)
        .await?;
    Ok(Json(Envelope::ok(history)))
}

pub async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let query = q.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(AdvisorError::Validation(
            "Query parameter is required".to_string(),
        ));
    }
    let limit = bounded(
        q.limit.as_deref(),
        DEFAULT_SEARCH_LIMIT,
        1,
        MAX_SEARCH_RESULTS,
        "limit",
    )?;
    let found = state.weather.search_locations(query, limit).await?;
    Ok(Json(SearchResponse {
        success: true,
        locations: found.locations,
        query: found.query,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_parameters() {
        assert_eq!(bounded(None, 3, 1, 16, "days").unwrap(), 3);
        assert_eq!(bounded(Some("20"), 3, 1, 16, "days").unwrap(), 16);
        assert_eq!(bounded(Some("-4"), 3, 1, 16, "days").unwrap(), 1);
        assert_eq!(bounded(Some(" 7 "), 3, 1, 16, "days").unwrap(), 7);
        let err = bounded(Some("abc"), 3, 1, 16, "days").unwrap_err();
        assert_eq!(err.to_string(), "Invalid days parameter");
    }
}
