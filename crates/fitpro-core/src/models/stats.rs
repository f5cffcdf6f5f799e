use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::user::deserialize_optional_id;
use crate::utils::{parse_timestamp, serialize_optional_local_iso};

/// A stored body measurement. Height is in centimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub body_fat_percentage: Option<f64>,
    pub measurement_date: Option<String>,
    pub bmi: Option<f64>,
}

impl UserStats {
    /// BMI as reported by the server, or computed from weight and height.
    pub fn bmi(&self) -> Option<f64> {
        self.bmi.or_else(|| match (self.weight, self.height) {
            (Some(weight), Some(height)) => calculate_bmi(weight, height),
            _ => None,
        })
    }

    pub fn measured_at(&self) -> Option<NaiveDateTime> {
        self.measurement_date.as_deref().and_then(parse_timestamp)
    }
}

/// BMI = weight(kg) / height(m)^2
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if height_cm <= 0.0 {
        return None;
    }
    let meters = height_cm / 100.0;
    Some(weight_kg / (meters * meters))
}

/// Body of `POST /api/stats`. Absent values are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_fat_percentage: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_local_iso"
    )]
    pub measurement_date: Option<NaiveDateTime>,
}

impl RecordStats {
    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn body_fat_percentage(mut self, percent: f64) -> Self {
        self.body_fat_percentage = Some(percent);
        self
    }

    /// Record the measurement time as the wall-clock time of `at`'s zone.
    /// The server stores it without an offset.
    pub fn measured_at<Tz: TimeZone>(mut self, at: &DateTime<Tz>) -> Self {
        self.measurement_date = Some(at.naive_local());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.weight.is_none() && self.height.is_none() && self.body_fat_percentage.is_none()
    }
}
