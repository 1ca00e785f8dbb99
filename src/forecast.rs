// Forecast record types handed back to callers and stored in the cache

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const MIN_TEMP_FIELD: &str = "Min_Temp";
pub const MAX_TEMP_FIELD: &str = "Max_Temp";

// Temperature scale used when restricting Min/Max temperature fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(format!(
                "unknown unit system '{}', expected 'metric' or 'imperial'",
                other
            )),
        }
    }
}

// Parsed three-day forecast for one feed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub location: String,
    pub image: Option<FeedImage>,
    pub current: DayEntry,
    pub day1: DayEntry,
    pub day2: DayEntry,
}

impl ForecastRecord {
    // Entries in feed order: current, day1, day2
    pub fn days(&self) -> [&DayEntry; 3] {
        [&self.current, &self.day1, &self.day2]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedImage {
    pub url: String,
    pub title: String,
    pub link: String,
}

// One forecast day.
//
// `fields` holds the `label: value` pairs found in the description, with
// spaces in labels replaced by underscores (`Wind Speed` becomes
// `Wind_Speed`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DayEntry {
    pub title: String,
    pub description: String,
    pub link: Option<String>,
    pub published: Option<DateTime<FixedOffset>>,
    pub fields: HashMap<String, String>,
}

impl DayEntry {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }

    pub fn min_temp(&self) -> Option<&str> {
        self.field(MIN_TEMP_FIELD)
    }

    pub fn max_temp(&self) -> Option<&str> {
        self.field(MAX_TEMP_FIELD)
    }
}
