use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::user::deserialize_optional_id;
use crate::utils::serialize_optional_local_iso;

/// Summary shown on the home dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct WorkoutStats {
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub total_workouts: u64,
    pub last_workout_date: Option<String>,
    pub last_workout_muscle_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct WorkoutHistory {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    pub workout_date: Option<String>,
    pub muscle_group: Option<String>,
    pub duration_minutes: Option<u32>,
    pub calories_burned: Option<u32>,
    #[serde(default, alias = "isCompleted")]
    pub completed: bool,
    /// Exercise name to repetitions
    #[serde(default)]
    pub exercises: BTreeMap<String, u32>,
}

/// Body of `POST /api/workouts`. The server fills in the date when omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    pub muscle_group: String,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<u32>,
    pub completed: bool,
    pub exercises: BTreeMap<String, u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_optional_local_iso"
    )]
    pub workout_date: Option<NaiveDateTime>,
}

impl NewWorkout {
    pub fn new(muscle_group: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            muscle_group: muscle_group.into(),
            duration_minutes,
            calories_burned: None,
            completed: true,
            exercises: BTreeMap::new(),
            workout_date: None,
        }
    }

    pub fn exercise(mut self, name: impl Into<String>, reps: u32) -> Self {
        self.exercises.insert(name.into(), reps);
        self
    }

    /// Date the workout as the wall-clock time of `at`'s zone
    pub fn performed_at<Tz: TimeZone>(mut self, at: &DateTime<Tz>) -> Self {
        self.workout_date = Some(at.naive_local());
        self
    }
}
