//! Identity and fitness profile types.
//!
//! `gender`, `fitnessLevel` and `fitnessGoals` are closed enumerations on the
//! client even though the API transports them as plain strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum FitnessLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for FitnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessLevel::Beginner => write!(f, "Beginner"),
            FitnessLevel::Intermediate => write!(f, "Intermediate"),
            FitnessLevel::Advanced => write!(f, "Advanced"),
        }
    }
}

impl FromStr for FitnessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(FitnessLevel::Beginner),
            "intermediate" => Ok(FitnessLevel::Intermediate),
            "advanced" => Ok(FitnessLevel::Advanced),
            other => Err(format!("unknown fitness level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    Strength,
    WeightLoss,
    MuscleGain,
}

impl fmt::Display for FitnessGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessGoal::Strength => write!(f, "Strength"),
            FitnessGoal::WeightLoss => write!(f, "Weight Loss"),
            FitnessGoal::MuscleGain => write!(f, "Muscle Gain"),
        }
    }
}

impl FromStr for FitnessGoal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "strength" => Ok(FitnessGoal::Strength),
            "weight_loss" => Ok(FitnessGoal::WeightLoss),
            "muscle_gain" => Ok(FitnessGoal::MuscleGain),
            other => Err(format!("unknown fitness goal '{}'", other)),
        }
    }
}

/// Fitness attributes attached to a user once onboarding is complete.
///
/// `age`, `weight` (lbs) and `height` (total inches) travel as strings; the
/// backend sometimes answers with numbers, which are accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub age: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub weight: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub height: String,
    pub gender: Gender,
    pub fitness_level: FitnessLevel,
    pub fitness_goals: FitnessGoal,
}

impl Profile {
    /// Height in whole inches, if the stored value is numeric.
    pub fn height_inches(&self) -> Option<u32> {
        self.height.trim().parse().ok()
    }
}

/// The authenticated identity. A missing `profile` means onboarding has not
/// been completed yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl User {
    pub fn has_profile(&self) -> bool {
        self.profile.is_some()
    }
}

// Helper to deserialize a string or number as String
fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrNumberVisitor;

    impl<'de> de::Visitor<'de> for StringOrNumberVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumberVisitor)
}

// Same as above, for optional identifiers
pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct OptionalIdVisitor;

    impl<'de> de::Visitor<'de> for OptionalIdVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or null")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            if v.is_empty() {
                Ok(None)
            } else {
                Ok(Some(v.to_string()))
            }
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(OptionalIdVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_from_login_response() {
        let json = r#"{"age":"30","weight":"70","height":"170","gender":"male","fitnessLevel":"beginner","fitnessGoals":"strength"}"#;
        let profile: Profile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(profile.age, "30");
        assert_eq!(profile.height, "170");
        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.fitness_level, FitnessLevel::Beginner);
        assert_eq!(profile.fitness_goals, FitnessGoal::Strength);
    }

    #[test]
    fn test_profile_accepts_numeric_fields() {
        let json = r#"{"age":30,"weight":165.5,"height":68,"gender":"female","fitnessLevel":"advanced","fitnessGoals":"weight_loss"}"#;
        let profile: Profile = serde_json::from_str(json).expect("profile should parse");
        assert_eq!(profile.age, "30");
        assert_eq!(profile.weight, "165.5");
        assert_eq!(profile.height_inches(), Some(68));
        assert_eq!(profile.fitness_goals, FitnessGoal::WeightLoss);
    }

    #[test]
    fn test_profile_serializes_wire_names() {
        let profile = Profile {
            age: "41".to_string(),
            weight: "180".to_string(),
            height: "70".to_string(),
            gender: Gender::Female,
            fitness_level: FitnessLevel::Intermediate,
            fitness_goals: FitnessGoal::MuscleGain,
        };
        let value = serde_json::to_value(&profile).expect("serialize");
        assert_eq!(value["fitnessLevel"], "intermediate");
        assert_eq!(value["fitnessGoals"], "muscle_gain");
        assert_eq!(value["gender"], "female");
        assert_eq!(value["age"], "41");
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let json = r#"{"age":"30","weight":"70","height":"170","gender":"male","fitnessLevel":"elite","fitnessGoals":"strength"}"#;
        assert!(serde_json::from_str::<Profile>(json).is_err());
    }

    #[test]
    fn test_enum_from_str() {
        assert_eq!("Weight Loss".parse::<FitnessGoal>(), Ok(FitnessGoal::WeightLoss));
        assert_eq!("muscle-gain".parse::<FitnessGoal>(), Ok(FitnessGoal::MuscleGain));
        assert_eq!("F".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!("ADVANCED".parse::<FitnessLevel>(), Ok(FitnessLevel::Advanced));
        assert!("other".parse::<Gender>().is_err());
    }

    #[test]
    fn test_user_without_profile_round_trips_through_storage_format() {
        let user = User {
            id: None,
            email: "a@b.com".to_string(),
            username: "abc".to_string(),
            profile: None,
        };
        let json = serde_json::to_string(&user).expect("serialize");
        assert_eq!(json, r#"{"email":"a@b.com","username":"abc"}"#);
        let back: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, user);
        assert!(!back.has_profile());
    }
}
