use crate::error::{AdvisorError, Result};
use crate::models::{AgriculturalAssessment, CurrentConditions, PestRisk, WeatherSnapshot};

/// Derive fieldwork, irrigation and pest guidance from current readings.
///
/// Every rule only adds. Once a flag is raised or a recommendation appended, a
/// later rule never clears it.
pub fn assess(c: &CurrentConditions) -> Result<AgriculturalAssessment> {
    for (name, value) in [
        ("temperature", c.temperature),
        ("humidity", c.humidity),
        ("wind_speed", c.wind_speed),
        ("precipitation", c.precipitation),
    ] {
        if !value.is_finite() {
            return Err(AdvisorError::Internal(format!(
                "Cannot assess weather with non-finite {name}"
            )));
        }
    }

    let mut a = AgriculturalAssessment {
        suitable_for_fieldwork: true,
        irrigation_needed: false,
        pest_risk: PestRisk::Low,
        recommendations: Vec::new(),
    };

    // Temperature
    let temp = c.temperature;
    if temp < 5.0 {
        a.suitable_for_fieldwork = false;
        a.recommendations.push("Too cold for most field activities".into());
    } else if temp > 35.0 {
        a.suitable_for_fieldwork = false;
        a.recommendations
            .push("Too hot - avoid heavy fieldwork during day".into());
    } else if temp < 10.0 {
        a.recommendations
            .push("Cold weather - protect sensitive plants".into());
    } else if temp > 30.0 {
        a.recommendations
            .push("Hot weather - ensure adequate watering".into());
    }

    // Humidity
    if c.humidity < 40.0 {
        a.irrigation_needed = true;
        a.recommendations.push("Low humidity - consider irrigation".into());
    } else if c.humidity > 80.0 {
        a.pest_risk = PestRisk::High;
        a.recommendations
            .push("High humidity - monitor for fungal diseases".into());
    }

    // Wind
    if c.wind_speed > 10.0 {
        a.recommendations
            .push("High winds - avoid spraying pesticides".into());
        if c.wind_speed > 15.0 {
            a.suitable_for_fieldwork = false;
            a.recommendations
                .push("Very strong winds - postpone outdoor work".into());
        }
    }

    // Precipitation
    let rain = c.precipitation;
    if rain > 0.0 {
        if rain < 2.0 {
            a.recommendations
                .push("Light rain - good for recently planted crops".into());
        } else if rain < 10.0 {
            a.recommendations
                .push("Moderate rain - avoid heavy machinery use".into());
        } else {
            a.suitable_for_fieldwork = false;
            a.recommendations.push("Heavy rain - postpone fieldwork".into());
        }
    }

    // Weather code families
    if c.weather_code >= 95 {
        a.suitable_for_fieldwork = false;
        a.recommendations
            .push("Thunderstorm conditions - stay indoors".into());
    } else if (71..=77).contains(&c.weather_code) {
        a.suitable_for_fieldwork = false;
        a.recommendations
            .push("Snow conditions - protect crops from frost".into());
    }

    // Soil, when reported
    if let Some(soil_temp) = c.soil_temperature.filter(|v| v.is_finite()) {
        if soil_temp < 5.0 {
            a.recommendations.push("Soil too cold for planting".into());
        } else if soil_temp > 30.0 {
            a.recommendations
                .push("Very warm soil - good for germination".into());
        }
    }
    if let Some(moisture) = c.soil_moisture.filter(|v| v.is_finite()) {
        if moisture < 0.1 {
            a.irrigation_needed = true;
            a.recommendations
                .push("Dry soil - irrigation recommended".into());
        } else if moisture > 0.4 {
            a.recommendations
                .push("High soil moisture - good for crops".into());
        }
    }

    Ok(a)
}

/// Stand-in used when `assess` fails, built from temperature and humidity only
pub fn minimal_assessment(c: &CurrentConditions) -> AgriculturalAssessment {
    let mut recommendations = Vec::new();
    if c.temperature > 30.0 {
        recommendations.push("Hot weather - avoid heavy work during day".to_string());
    }
    if c.humidity > 80.0 {
        recommendations.push("High humidity - monitor for fungal diseases".to_string());
    }
    if c.humidity < 40.0 {
        recommendations.push("Low humidity - increase irrigation".to_string());
    }

    AgriculturalAssessment {
        suitable_for_fieldwork: true,
        irrigation_needed: c.humidity < 40.0 || c.temperature > 30.0,
        pest_risk: if c.humidity > 80.0 {
            PestRisk::High
        } else {
            PestRisk::Low
        },
        recommendations,
    }
}

/// Attach an assessment to readings; never leaves the snapshot without one
pub fn snapshot(conditions: CurrentConditions) -> WeatherSnapshot {
    let agricultural_analysis = assess(&conditions).unwrap_or_else(|e| {
        tracing::warn!("Agricultural assessment failed, using minimal assessment: {}", e);
        minimal_assessment(&conditions)
    });
    WeatherSnapshot {
        conditions,
        agricultural_analysis,
    }
}
