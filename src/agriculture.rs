use serde::Serialize;

use crate::models::{CurrentConditions, PestRisk, WeatherSnapshot};

const MAX_SUGGESTIONS: usize = 5;

/// Reference data for one crop
#[derive(Debug)]
pub struct CropProfile {
    pub name: &'static str,
    pub min_temp: f64,
    pub max_temp: f64,
    pub optimal_temp: f64,
    pub growth_stages: &'static [&'static str],
    pub pests: &'static [&'static str],
    pub plant_months: &'static [u32],
    pub harvest_months: &'static [u32],
}

pub const CROPS: [CropProfile; 5] = [
    CropProfile {
        name: "rice",
        min_temp: 20.0,
        max_temp: 35.0,
        optimal_temp: 25.0,
        growth_stages: &["seedling", "vegetative", "reproductive", "ripening"],
        pests: &["stem_borer", "blast_disease", "brown_planthopper"],
        plant_months: &[4, 5],
        harvest_months: &[9, 10],
    },
    CropProfile {
        name: "wheat",
        min_temp: 5.0,
        max_temp: 25.0,
        optimal_temp: 15.0,
        growth_stages: &["germination", "tillering", "stem_extension", "flowering", "grain_filling"],
        pests: &["aphids", "rust_disease", "powdery_mildew"],
        plant_months: &[9, 10, 11],
        harvest_months: &[6, 7],
    },
    CropProfile {
        name: "corn",
        min_temp: 18.0,
        max_temp: 35.0,
        optimal_temp: 25.0,
        growth_stages: &["emergence", "vegetative", "pollination", "grain_filling", "maturity"],
        pests: &["corn_borer", "armyworm", "leaf_blight"],
        plant_months: &[4, 5, 6],
        harvest_months: &[9, 10],
    },
    CropProfile {
        name: "tomato",
        min_temp: 15.0,
        max_temp: 30.0,
        optimal_temp: 22.0,
        growth_stages: &["seedling", "vegetative", "flowering", "fruiting", "harvest"],
        pests: &["whitefly", "aphids", "blight", "hornworm"],
        plant_months: &[3, 4, 5],
        harvest_months: &[7, 8, 9],
    },
    CropProfile {
        name: "potato",
        min_temp: 10.0,
        max_temp: 25.0,
        optimal_temp: 18.0,
        growth_stages: &["planting", "emergence", "vegetative", "tuber_formation", "maturity"],
        pests: &["colorado_beetle", "late_blight", "aphids"],
        plant_months: &[3, 4],
        harvest_months: &[7, 8],
    },
];

pub fn crop(name: &str) -> Option<&'static CropProfile> {
    let name = name.trim().to_lowercase();
    CROPS.iter().find(|c| c.name == name)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropSuggestion {
    pub crop: String,
    pub suitability_score: f64,
    pub reason: String,
}

/// Crops whose temperature range covers `temperature`, best first
pub fn suggest_crops(temperature: f64) -> Vec<CropSuggestion> {
    let mut suggestions: Vec<CropSuggestion> = CROPS
        .iter()
        .filter(|c| (c.min_temp..=c.max_temp).contains(&temperature))
        .map(|c| CropSuggestion {
            crop: c.name.to_string(),
            suitability_score: (100.0 - (temperature - c.optimal_temp).abs() * 5.0).max(0.0),
            reason: format!(
                "Current temperature ({temperature}°C) is suitable for {}",
                c.name
            ),
        })
        .collect();
    suggestions.sort_by(|a, b| b.suitability_score.total_cmp(&a.suitability_score));
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantingTiming {
    pub planting_months: Vec<u32>,
    pub harvest_months: Vec<u32>,
    pub plant_now: bool,
    pub harvest_now: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropRecommendation {
    #[serde(flatten)]
    pub suggestion: CropSuggestion,
    pub growth_stages: Vec<String>,
    pub pest_susceptibility: Vec<String>,
    pub expected_yield: Level,
    pub pest_risk: Level,
    pub water_requirements: Level,
    pub planting_timing: Option<PlantingTiming>,
}

fn expected_yield(profile: Option<&CropProfile>, temperature: f64) -> Level {
    let Some(c) = profile else {
        return Level::Medium;
    };
    if !(c.min_temp..=c.max_temp).contains(&temperature) {
        Level::Low
    } else if (temperature - c.optimal_temp).abs() <= 3.0 {
        Level::High
    } else {
        Level::Medium
    }
}

fn crop_pest_level(c: &CurrentConditions) -> Level {
    if c.humidity > 90.0 && c.temperature > 25.0 {
        Level::High
    } else if c.humidity > 80.0 || c.temperature > 30.0 {
        Level::Medium
    } else {
        Level::Low
    }
}

fn water_level(c: &CurrentConditions) -> Level {
    if c.temperature > 30.0 || c.humidity < 40.0 {
        Level::High
    } else if c.temperature < 15.0 {
        Level::Low
    } else {
        Level::Medium
    }
}

/// Crop suggestions enriched with stages, pests, yield outlook and timing for `month`
pub fn recommend_crops(c: &CurrentConditions, month: u32) -> Vec<CropRecommendation> {
    suggest_crops(c.temperature)
        .into_iter()
        .map(|suggestion| {
            let profile = crop(&suggestion.crop);
            CropRecommendation {
                growth_stages: profile
                    .map(|p| p.growth_stages.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default(),
                pest_susceptibility: profile
                    .map(|p| p.pests.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default(),
                expected_yield: expected_yield(profile, c.temperature),
                pest_risk: crop_pest_level(c),
                water_requirements: water_level(c),
                planting_timing: profile.map(|p| PlantingTiming {
                    planting_months: p.plant_months.to_vec(),
                    harvest_months: p.harvest_months.to_vec(),
                    plant_now: p.plant_months.contains(&month),
                    harvest_now: p.harvest_months.contains(&month),
                }),
                suggestion,
            }
        })
        .collect()
}

struct PestPattern {
    name: &'static str,
    pests: &'static [&'static str],
    prevention: &'static [&'static str],
    applies: fn(&CurrentConditions) -> bool,
}

const PEST_PATTERNS: [PestPattern; 4] = [
    PestPattern {
        name: "high_humidity",
        pests: &["fungal_diseases", "slug", "snail", "powdery_mildew"],
        prevention: &["improve_ventilation", "reduce_watering", "apply_fungicide"],
        applies: |c| c.humidity > 80.0,
    },
    PestPattern {
        name: "hot_weather",
        pests: &["spider_mites", "aphids", "whitefly", "thrips"],
        prevention: &["increase_watering", "provide_shade", "release_beneficial_insects"],
        applies: |c| c.temperature > 30.0,
    },
    PestPattern {
        name: "wet_conditions",
        pests: &["root_rot", "damping_off", "bacterial_diseases"],
        prevention: &["improve_drainage", "reduce_irrigation", "apply_copper_spray"],
        applies: |c| c.precipitation > 10.0,
    },
    PestPattern {
        name: "cool_moist",
        pests: &["gray_mold", "downy_mildew", "black_spot"],
        prevention: &["increase_spacing", "improve_airflow", "preventive_spraying"],
        applies: |c| c.temperature < 20.0 && c.humidity > 70.0,
    },
];

const MONITORING: [&str; 4] = [
    "Check plants daily for early signs of pests",
    "Monitor weather forecasts for risk conditions",
    "Inspect undersides of leaves for eggs",
    "Look for changes in plant color or growth",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PestAssessment {
    pub overall_risk: PestRisk,
    pub risk_factors: Vec<String>,
    pub potential_pests: Vec<String>,
    pub prevention_measures: Vec<String>,
    pub monitoring_recommendations: Vec<String>,
    pub crop_type: Option<String>,
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

pub fn assess_pests(c: &CurrentConditions, crop_type: Option<&str>) -> PestAssessment {
    let mut risk_factors = Vec::new();
    let mut potential_pests = Vec::new();
    let mut prevention_measures = Vec::new();

    for pattern in PEST_PATTERNS.iter().filter(|p| (p.applies)(c)) {
        risk_factors.push(pattern.name.to_string());
        for pest in pattern.pests {
            push_unique(&mut potential_pests, pest);
        }
        for step in pattern.prevention {
            push_unique(&mut prevention_measures, step);
        }
    }

    if let Some(profile) = crop_type.and_then(crop) {
        for pest in profile.pests {
            push_unique(&mut potential_pests, pest);
        }
    }

    let overall_risk = match potential_pests.len() {
        n if n > 5 => PestRisk::High,
        n if n > 2 => PestRisk::Medium,
        _ => PestRisk::Low,
    };

    PestAssessment {
        overall_risk,
        risk_factors,
        potential_pests,
        prevention_measures,
        monitoring_recommendations: MONITORING.iter().map(|s| s.to_string()).collect(),
        crop_type: crop_type.map(str::to_string),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoilAdjustment {
    pub frequency: &'static str,
    pub amount: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrrigationPlan {
    pub irrigation_needed: bool,
    pub water_amount: &'static str,
    pub frequency: &'static str,
    pub timing: &'static str,
    pub method: &'static str,
    pub notes: Vec<String>,
    pub soil_adjustment: Option<SoilAdjustment>,
    pub crop_type: Option<String>,
    pub soil_type: Option<String>,
}

/// Irrigation schedule from a snapshot; later adjustments override earlier ones
pub fn irrigation_plan(
    snapshot: &WeatherSnapshot,
    crop_type: Option<&str>,
    soil_type: Option<&str>,
) -> IrrigationPlan {
    let c = &snapshot.conditions;
    let mut plan = IrrigationPlan {
        irrigation_needed: snapshot.agricultural_analysis.irrigation_needed,
        water_amount: "medium",
        frequency: "daily",
        timing: "early_morning",
        method: "drip_irrigation",
        notes: Vec::new(),
        soil_adjustment: None,
        crop_type: crop_type.map(str::to_string),
        soil_type: soil_type.map(str::to_string),
    };

    if c.temperature > 30.0 {
        plan.water_amount = "high";
        plan.frequency = "twice_daily";
        plan.notes.push("High temperature increases water needs".into());
    } else if c.temperature < 15.0 {
        plan.water_amount = "low";
        plan.frequency = "every_other_day";
        plan.notes.push("Cool weather reduces water needs".into());
    }

    if c.precipitation > 10.0 {
        plan.irrigation_needed = false;
        plan.notes.push("Recent rainfall provides adequate moisture".into());
    } else if c.precipitation > 5.0 {
        plan.water_amount = "low";
        plan.notes.push("Recent light rain reduces irrigation needs".into());
    }

    if c.humidity < 40.0 {
        plan.water_amount = "high";
        plan.notes.push("Low humidity increases evaporation".into());
    } else if c.humidity > 80.0 {
        plan.frequency = "as_needed";
        plan.notes.push("High humidity reduces water loss".into());
    }

    if c.wind_speed > 15.0 {
        plan.notes
            .push("Strong winds increase water loss - irrigate more frequently".into());
    }

    plan.soil_adjustment = soil_type.and_then(|soil| match soil.trim().to_lowercase().as_str() {
        "clay" => Some(SoilAdjustment {
            frequency: "less_frequent",
            amount: "more_per_session",
        }),
        "sand" | "sandy" => Some(SoilAdjustment {
            frequency: "more_frequent",
            amount: "less_per_session",
        }),
        "loam" => Some(SoilAdjustment {
            frequency: "moderate",
            amount: "moderate",
        }),
        _ => None,
    });

    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub fn for_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }

    pub fn tasks(&self) -> &'static [&'static str] {
        match self {
            Season::Spring => &[
                "Prepare seed beds and planting areas",
                "Check and repair irrigation systems",
                "Apply pre-planting fertilizers",
                "Start seedling production",
                "Plan crop rotation schedule",
            ],
            Season::Summer => &[
                "Monitor irrigation and water management",
                "Implement pest and disease control",
                "Side-dress crops with nitrogen",
                "Harvest early summer crops",
                "Maintain equipment and tools",
            ],
            Season::Autumn => &[
                "Harvest main season crops",
                "Prepare fields for winter cover crops",
                "Store seeds and equipment properly",
                "Plan next year crop selections",
                "Apply compost and organic matter",
            ],
            Season::Winter => &[
                "Plan crop rotations for next year",
                "Maintain and repair equipment",
                "Attend agricultural education programs",
                "Order seeds and supplies",
                "Analyze previous season performance",
            ],
        }
    }

    pub fn priorities(&self) -> &'static [&'static str] {
        match self {
            Season::Spring => &["Soil preparation", "Seed planting", "Irrigation setup"],
            Season::Summer => &["Pest monitoring", "Water management", "Nutrient application"],
            Season::Autumn => &["Harvest planning", "Storage preparation", "Field cleanup"],
            Season::Winter => &[
                "Equipment maintenance",
                "Planning for next season",
                "Education and training",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalAdvice {
    pub season: Season,
    pub month: u32,
    pub seasonal_tasks: Vec<String>,
    pub priority_tasks: Vec<String>,
    pub weather_considerations: Vec<String>,
    pub crops_to_plant: Vec<String>,
    pub crops_to_harvest: Vec<String>,
}

pub fn seasonal_advice(snapshot: &WeatherSnapshot, month: u32) -> SeasonalAdvice {
    let season = Season::for_month(month);
    SeasonalAdvice {
        season,
        month,
        seasonal_tasks: season.tasks().iter().map(|s| s.to_string()).collect(),
        priority_tasks: season.priorities().iter().map(|s| s.to_string()).collect(),
        weather_considerations: snapshot.agricultural_analysis.recommendations.clone(),
        crops_to_plant: CROPS
            .iter()
            .filter(|c| c.plant_months.contains(&month))
            .map(|c| c.name.to_string())
            .collect(),
        crops_to_harvest: CROPS
            .iter()
            .filter(|c| c.harvest_months.contains(&month))
            .map(|c| c.name.to_string())
            .collect(),
    }
}
