//! Input validation for the auth, profile and measurement forms.
//!
//! Forms are checked before anything is sent to the API, so a rejected form
//! never touches the session.

use std::borrow::Cow;

use chrono::{DateTime, TimeZone};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{FitnessGoal, FitnessLevel, Gender, Profile, RecordStats};

#[derive(Clone, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LoginForm {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Clone, Validate)]
pub struct SignupForm {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(
        length(min = 6, message = "Password must be at least 6 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
    #[validate(
        length(min = 3, max = 30, message = "Username must be 3-30 characters"),
        custom(function = "validate_username_chars")
    )]
    pub username: String,
}

impl SignupForm {
    pub fn new(email: &str, password: &str, username: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
            username: username.trim().to_string(),
        }
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if has_letter && has_digit {
        Ok(())
    } else {
        Err(ValidationError::new("weak_password")
            .with_message(Cow::from("Password must contain a letter and a number")))
    }
}

fn validate_username_chars(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_chars")
            .with_message(Cow::from("Username may only contain letters, numbers, '_' and '.'")))
    }
}

/// Profile setup/edit form. Height is entered as feet and inches and stored
/// as total inches; weight is in pounds.
#[derive(Debug, Clone, Validate)]
pub struct ProfileForm {
    #[validate(range(min = 13, max = 120, message = "Age must be between 13 and 120"))]
    pub age: u32,
    #[validate(range(min = 50.0, max = 1000.0, message = "Weight must be between 50 and 1000 lbs"))]
    pub weight_lbs: f64,
    #[validate(range(min = 4, max = 11, message = "Feet must be between 4 and 11"))]
    pub height_feet: u32,
    #[validate(range(max = 11, message = "Inches must be between 0 and 11"))]
    pub height_inches: u32,
    pub gender: Gender,
    pub fitness_level: FitnessLevel,
    pub fitness_goals: FitnessGoal,
}

impl Default for ProfileForm {
    fn default() -> Self {
        Self {
            age: 30,
            weight_lbs: 160.0,
            height_feet: 5,
            height_inches: 8,
            gender: Gender::Male,
            fitness_level: FitnessLevel::Beginner,
            fitness_goals: FitnessGoal::Strength,
        }
    }
}

impl ProfileForm {
    /// Prefill the form from an existing profile (edit mode). Unparseable
    /// values fall back to the defaults.
    pub fn from_profile(profile: &Profile) -> Self {
        let defaults = Self::default();
        let total_inches = profile
            .height_inches()
            .unwrap_or(defaults.height_feet * 12 + defaults.height_inches);
        Self {
            age: profile.age.trim().parse().unwrap_or(defaults.age),
            weight_lbs: profile.weight.trim().parse().unwrap_or(defaults.weight_lbs),
            height_feet: total_inches / 12,
            height_inches: total_inches % 12,
            gender: profile.gender,
            fitness_level: profile.fitness_level,
            fitness_goals: profile.fitness_goals,
        }
    }

    pub fn into_profile(self) -> Result<Profile, ValidationErrors> {
        self.validate()?;
        Ok(Profile {
            age: self.age.to_string(),
            weight: self.weight_lbs.to_string(),
            height: (self.height_feet * 12 + self.height_inches).to_string(),
            gender: self.gender,
            fitness_level: self.fitness_level,
            fitness_goals: self.fitness_goals,
        })
    }
}

/// New body measurement. Height is in centimeters.
#[derive(Debug, Clone, Default, Validate)]
#[validate(schema(function = "require_any_measurement"))]
pub struct MeasurementForm {
    #[validate(range(min = 20.0, max = 1500.0, message = "Weight is out of range"))]
    pub weight: Option<f64>,
    #[validate(range(min = 50.0, max = 300.0, message = "Height must be between 50 and 300 cm"))]
    pub height: Option<f64>,
    #[validate(range(min = 1.0, max = 75.0, message = "Body fat must be between 1 and 75%"))]
    pub body_fat_percentage: Option<f64>,
}

fn require_any_measurement(form: &MeasurementForm) -> Result<(), ValidationError> {
    if form.weight.is_none() && form.height.is_none() && form.body_fat_percentage.is_none() {
        Err(ValidationError::new("empty_measurement")
            .with_message(Cow::from("Enter at least one measurement")))
    } else {
        Ok(())
    }
}

impl MeasurementForm {
    /// Build the request, stamping it with `at` in its local time zone
    pub fn into_request<Tz: TimeZone>(self, at: &DateTime<Tz>) -> Result<RecordStats, ValidationErrors> {
        self.validate()?;
        Ok(RecordStats {
            weight: self.weight,
            height: self.height,
            body_fat_percentage: self.body_fat_percentage,
            measurement_date: None,
        }
        .measured_at(at))
    }
}
