use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::assessment;
use crate::config::{DefaultLocation, WeatherConfig};
use crate::error::{AdvisorError, Result};
use crate::models::{CurrentConditions, WeatherSnapshot};

const PROVIDER: &str = "open-meteo";
pub const MAX_FORECAST_DAYS: u32 = 16;
pub const MAX_SEARCH_RESULTS: u32 = 10;
pub const HISTORICAL_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

/// One day of forecast or archive data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: String,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    pub description: String,
    pub precipitation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    pub weather_code: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: String,
    pub forecast: Vec<DailySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Historical {
    pub location: String,
    pub historical_data: Vec<DailySummary>,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceMatch {
    pub name: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub admin1: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSearch {
    pub locations: Vec<PlaceMatch>,
    pub query: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherGateway: Send + Sync {
    /// Never fails: an unknown city or provider error yields the default location
    async fn resolve_coordinates(&self, city: &str, country: &str) -> Coordinates;

    async fn current(&self, city: &str, country: &str) -> Result<WeatherSnapshot>;

    /// `days` is clamped to 1..=16
    async fn forecast(&self, city: &str, country: &str, days: u32) -> Result<Forecast>;

    /// Trailing window of `days` ending today
    async fn historical(&self, city: &str, country: &str, days: u32) -> Result<Historical>;

    /// `limit` is clamped to 1..=10
    async fn search_locations(&self, query: &str, limit: u32) -> Result<LocationSearch>;
}

/// Human description for an Open-Meteo WMO weather code
pub fn describe(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown weather condition",
    }
}

/// Normalise city/country query parameters, replacing unusable values with the defaults
pub fn sanitize_location(
    city: Option<&str>,
    country: Option<&str>,
    default: &DefaultLocation,
) -> (String, String) {
    let city = city
        .map(str::trim)
        .filter(|c| !c.is_empty() && c.chars().count() <= 100)
        .unwrap_or(&default.city)
        .to_string();
    let country = country
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty() && c.chars().count() <= 3)
        .unwrap_or_else(|| default.country.clone());
    (city, country)
}

// Open-Meteo wire format
#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<GeocodingResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
    #[serde(default)]
    hourly: Option<SoilBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    apparent_temperature: f64,
    #[serde(default)]
    precipitation: Option<f64>,
    weather_code: i64,
    surface_pressure: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
}

#[derive(Debug, Deserialize)]
struct SoilBlock {
    #[serde(default)]
    soil_temperature_0cm: Vec<Option<f64>>,
    #[serde(default)]
    soil_moisture_0_1cm: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    weather_code: Vec<Option<i64>>,
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

impl DailyBlock {
    fn into_days(self) -> Vec<DailySummary> {
        let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();
        (0..self.time.len())
            .map(|i| {
                let weather_code = self.weather_code.get(i).copied().flatten();
                DailySummary {
                    date: self.time[i].clone(),
                    temperature_max: at(&self.temperature_2m_max, i),
                    temperature_min: at(&self.temperature_2m_min, i),
                    description: weather_code
                        .map_or("Unknown weather condition", describe)
                        .to_string(),
                    precipitation: at(&self.precipitation_sum, i),
                    wind_speed: at(&self.wind_speed_10m_max, i),
                    weather_code,
                }
            })
            .collect()
    }
}

pub struct OpenMeteoGateway {
    client: Client,
    forecast_url: String,
    geocoding_url: String,
    archive_url: String,
    default: DefaultLocation,
}

impl OpenMeteoGateway {
    pub fn new(cfg: &WeatherConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            forecast_url: cfg.forecast_url.clone(),
            geocoding_url: cfg.geocoding_url.clone(),
            archive_url: cfg.archive_url.clone(),
            default: cfg.default_location.clone(),
        })
    }

    fn default_coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.default.latitude,
            longitude: self.default.longitude,
            label: self.default.label.clone(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AdvisorError::upstream(PROVIDER, format!("{context} API error: {e}")))?;
        response.json::<T>().await.map_err(|e| {
            AdvisorError::upstream(PROVIDER, format!("Invalid response format: {e}"))
        })
    }

    async fn geocode(&self, name: &str, count: u32) -> Result<GeocodingResponse> {
        self.get_json(
            &self.geocoding_url,
            &[
                ("name", name.to_string()),
                ("count", count.to_string()),
                ("language", "en".to_string()),
                ("format", "json".to_string()),
            ],
            "Geocoding",
        )
        .await
    }

    async fn daily(
        &self,
        url: &str,
        coords: &Coordinates,
        fields: &str,
        window: &[(&str, String)],
        context: &str,
    ) -> Result<Vec<DailySummary>> {
        let mut query = vec![
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            ("daily", fields.to_string()),
            ("timezone", "auto".to_string()),
        ];
        query.extend(window.iter().cloned());
        let response: DailyResponse = self.get_json(url, &query, context).await?;
        Ok(response.daily.into_days())
    }
}

#[async_trait]
impl WeatherGateway for OpenMeteoGateway {
    async fn resolve_coordinates(&self, city: &str, country: &str) -> Coordinates {
        match self.geocode(city, 5).await {
            Ok(response) => {
                let preferred = response
                    .results
                    .iter()
                    .position(|r| {
                        r.country_code
                            .as_deref()
                            .is_some_and(|cc| cc.eq_ignore_ascii_case(country))
                    })
                    .unwrap_or(0);
                match response.results.into_iter().nth(preferred) {
                    Some(hit) => Coordinates {
                        latitude: hit.latitude,
                        longitude: hit.longitude,
                        label: format!("{}, {}", hit.name, hit.country.unwrap_or_default()),
                    },
                    None => {
                        tracing::warn!(
                            "No geocoding match for {}, {} - using default location",
                            city,
                            country
                        );
                        self.default_coordinates()
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Geocoding failed for {}: {} - using default location", city, e);
                self.default_coordinates()
            }
        }
    }

    async fn current(&self, city: &str, country: &str) -> Result<WeatherSnapshot> {
        tracing::info!("Fetching current weather for {}, {}", city, country);
        let coords = self.resolve_coordinates(city, country).await;

        let response: CurrentResponse = self
            .get_json(
                &self.forecast_url,
                &[
                    ("latitude", coords.latitude.to_string()),
                    ("longitude", coords.longitude.to_string()),
                    (
                        "current",
                        "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,surface_pressure,wind_speed_10m,wind_direction_10m"
                            .to_string(),
                    ),
                    ("hourly", "soil_temperature_0cm,soil_moisture_0_1cm".to_string()),
                    ("timezone", "auto".to_string()),
                    ("forecast_days", "1".to_string()),
                ],
                "Weather",
            )
            .await?;

        let now = response.current;
        let (soil_temperature, soil_moisture) = match response.hourly {
            Some(soil) => (
                soil.soil_temperature_0cm.first().copied().flatten(),
                soil.soil_moisture_0_1cm.first().copied().flatten(),
            ),
            None => (None, None),
        };

        Ok(assessment::snapshot(CurrentConditions {
            location: coords.label,
            temperature: now.temperature_2m,
            feels_like: now.apparent_temperature,
            humidity: now.relative_humidity_2m,
            description: describe(now.weather_code).to_string(),
            wind_speed: now.wind_speed_10m,
            wind_direction: now.wind_direction_10m,
            pressure: now.surface_pressure,
            precipitation: now.precipitation.unwrap_or(0.0),
            soil_temperature,
            soil_moisture,
            weather_code: now.weather_code,
            timestamp: Utc::now(),
        }))
    }

    async fn forecast(&self, city: &str, country: &str, days: u32) -> Result<Forecast> {
        let days = days.clamp(1, MAX_FORECAST_DAYS);
        tracing::info!("Fetching {}-day forecast for {}, {}", days, city, country);
        let coords = self.resolve_coordinates(city, country).await;

        let forecast = self
            .daily(
                &self.forecast_url,
                &coords,
                "temperature_2m_max,temperature_2m_min,weather_code,precipitation_sum,wind_speed_10m_max",
                &[("forecast_days", days.to_string())],
                "Forecast",
            )
            .await?;

        Ok(Forecast {
            location: coords.label,
            forecast,
        })
    }

    async fn historical(&self, city: &str, country: &str, days: u32) -> Result<Historical> {
        let coords = self.resolve_coordinates(city, country).await;
        let end = Utc::now().date_naive();
        let start = end - ChronoDuration::days(i64::from(days.max(1)));
        tracing::info!("Fetching historical weather for {} from {} to {}", city, start, end);

        let mut historical_data = self
            .daily(
                &self.archive_url,
                &coords,
                "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code",
                &[
                    ("start_date", start.to_string()),
                    ("end_date", end.to_string()),
                ],
                "Historical weather",
            )
            .await?;
        // The archive reports no wind
        for day in &mut historical_data {
            day.wind_speed = None;
        }

        Ok(Historical {
            location: coords.label,
            historical_data,
            period: format!("{start} to {end}"),
        })
    }

    async fn search_locations(&self, query: &str, limit: u32) -> Result<LocationSearch> {
        let limit = limit.clamp(1, MAX_SEARCH_RESULTS);
        let response = self.geocode(query, limit).await?;
        let locations = response
            .results
            .into_iter()
            .take(limit as usize)
            .map(|r| PlaceMatch {
                name: r.name,
                country: r.country.unwrap_or_default(),
                latitude: r.latitude,
                longitude: r.longitude,
                admin1: r.admin1.unwrap_or_default(),
                timezone: r.timezone.unwrap_or_default(),
            })
            .collect();
        Ok(LocationSearch {
            locations,
            query: query.to_string(),
        })
    }
}
