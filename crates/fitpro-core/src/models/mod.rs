//! Data models for FitPro entities.
//!
//! - `User`, `Profile` and the profile enumerations
//! - `UserStats`, `RecordStats`: body measurements
//! - `WorkoutStats`, `WorkoutHistory`, `NewWorkout`: workout tracking

pub mod stats;
pub mod user;
pub mod workout;

pub use stats::{calculate_bmi, RecordStats, UserStats};
pub use user::{FitnessGoal, FitnessLevel, Gender, Profile, User};
pub use workout::{NewWorkout, WorkoutHistory, WorkoutStats};
