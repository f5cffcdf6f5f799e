use std::io::{self, Write};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use tracing::warn;
use validator::Validate;

use fitpro_core::auth::{LoginForm, MeasurementForm, ProfileForm, SignupForm};
use fitpro_core::models::{NewWorkout, UserStats, WorkoutHistory};
use fitpro_core::utils::{format_height, format_measurement, format_optional};
use fitpro_core::{Config, SessionState, SessionStore};

/// Dispatch one command. `args` excludes the program name.
pub async fn run(store: &SessionStore, config: &mut Config, args: &[&str]) -> Result<()> {
    match args {
        ["login"] => {
            let email = match config.last_email.clone() {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            login(store, config, &email).await
        }
        ["login", email] => login(store, config, email).await,
        ["signup", email, username] => signup(store, config, email, username).await,
        ["logout"] => {
            store.logout().await?;
            println!("Logged out");
            print_route(store);
            Ok(())
        }
        ["status"] => status(store).await,
        ["profile", pairs @ ..] => profile(store, pairs).await,
        ["stats", "record", pairs @ ..] => record_stats(store, pairs).await,
        ["stats", "latest"] => {
            require_session(store)?;
            match store.api().get_latest_stats().await? {
                Some(stats) => print_stats(&[stats]),
                None => println!("No measurements recorded yet"),
            }
            Ok(())
        }
        ["stats", "history"] => {
            require_session(store)?;
            print_stats(&store.api().get_stats_history().await?);
            Ok(())
        }
        ["stats", "progress"] | ["stats", "progress", "weight"] => {
            require_session(store)?;
            print_stats(&store.api().get_weight_progress().await?);
            Ok(())
        }
        ["stats", "progress", "bodyfat"] => {
            require_session(store)?;
            print_stats(&store.api().get_body_fat_progress().await?);
            Ok(())
        }
        ["workouts"] => {
            require_session(store)?;
            print_workouts(&store.api().get_workout_history().await?);
            Ok(())
        }
        ["workouts", "stats"] => {
            require_session(store)?;
            let stats = store.api().get_workout_stats().await?;
            println!("Streak:         {} days", stats.streak);
            println!("Total workouts: {}", stats.total_workouts);
            println!(
                "Last workout:   {} ({})",
                format_optional(&stats.last_workout_date, "never"),
                format_optional(&stats.last_workout_muscle_group, "-")
            );
            Ok(())
        }
        ["workouts", "log", group, minutes, exercises @ ..] => {
            log_workout(store, group, minutes, exercises).await
        }
        _ => bail!("Unknown command: {} (try --help)", args.join(" ")),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn read_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

fn print_route(store: &SessionStore) {
    println!("-> {}", store.state().route());
}

fn require_session(store: &SessionStore) -> Result<()> {
    if store.state().is_authenticated() {
        Ok(())
    } else {
        bail!("Not logged in. Run `fitpro login` first.")
    }
}

fn remember_email(config: &mut Config, email: &str) {
    config.last_email = Some(email.to_string());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
}

async fn login(store: &SessionStore, config: &mut Config, email: &str) -> Result<()> {
    let password = read_password("Password: ")?;
    let form = LoginForm::new(email, &password);
    form.validate()?;

    let user = store.login(&form.email, &form.password).await?;
    remember_email(config, &form.email);
    println!("Welcome back, {}", user.username);
    print_route(store);
    Ok(())
}

async fn signup(
    store: &SessionStore,
    config: &mut Config,
    email: &str,
    username: &str,
) -> Result<()> {
    let password = read_password("Choose a password: ")?;
    let confirm = read_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    let form = SignupForm::new(email, &password, username);
    form.validate()?;

    let user = store
        .signup(&form.email, &form.password, &form.username)
        .await?;
    remember_email(config, &form.email);
    println!("Account created for {}", user.username);
    print_route(store);
    Ok(())
}

async fn status(store: &SessionStore) -> Result<()> {
    match store.state() {
        SessionState::Authenticated(user) => {
            println!("Logged in as {} <{}>", user.username, user.email);
            match &user.profile {
                Some(profile) => {
                    let height = profile
                        .height_inches()
                        .map(format_height)
                        .unwrap_or_else(|| profile.height.clone());
                    println!(
                        "Profile: age {}, {} lbs, {}, {}, {}, goal {}",
                        profile.age,
                        profile.weight,
                        height,
                        profile.gender,
                        profile.fitness_level,
                        profile.fitness_goals
                    );
                }
                None => println!("Profile: not set up"),
            }
        }
        _ => println!("Not logged in"),
    }
    print_route(store);
    Ok(())
}

async fn profile(store: &SessionStore, pairs: &[&str]) -> Result<()> {
    let mut form = match store.current_user().await {
        Some(user) => user
            .profile
            .as_ref()
            .map(ProfileForm::from_profile)
            .unwrap_or_default(),
        None => bail!("Not logged in. Run `fitpro login` first."),
    };

    for (key, value) in parse_pairs(pairs)? {
        match key {
            "age" => form.age = parse_value(key, value)?,
            "weight" => form.weight_lbs = parse_value(key, value)?,
            "feet" => form.height_feet = parse_value(key, value)?,
            "inches" => form.height_inches = parse_value(key, value)?,
            "gender" => form.gender = value.parse().map_err(|e: String| anyhow!(e))?,
            "level" => form.fitness_level = value.parse().map_err(|e: String| anyhow!(e))?,
            "goal" => form.fitness_goals = value.parse().map_err(|e: String| anyhow!(e))?,
            _ => bail!("Unknown profile field: {}", key),
        }
    }

    let profile = form.into_profile()?;
    store.update_profile(&profile).await?;
    println!("Profile saved");
    print_route(store);
    Ok(())
}

async fn record_stats(store: &SessionStore, pairs: &[&str]) -> Result<()> {
    require_session(store)?;
    let mut form = MeasurementForm::default();
    for (key, value) in parse_pairs(pairs)? {
        match key {
            "weight" => form.weight = Some(parse_value(key, value)?),
            "height" => form.height = Some(parse_value(key, value)?),
            "bodyfat" => form.body_fat_percentage = Some(parse_value(key, value)?),
            _ => bail!("Unknown measurement: {}", key),
        }
    }

    let request = form.into_request(&chrono::Local::now())?;
    let saved = store.api().record_stats(&request).await?;
    println!("Measurement saved");
    print_stats(&[saved]);
    Ok(())
}

async fn log_workout(
    store: &SessionStore,
    group: &str,
    minutes: &str,
    exercises: &[&str],
) -> Result<()> {
    require_session(store)?;
    let mut workout = NewWorkout::new(group.to_string(), parse_value("minutes", minutes)?)
        .performed_at(&chrono::Local::now());
    for (name, reps) in parse_pairs(exercises)? {
        workout = workout.exercise(name, parse_value(name, reps)?);
    }

    let saved = store.api().save_workout(&workout).await?;
    println!("Workout saved");
    print_workouts(&[saved]);
    Ok(())
}

fn parse_pairs<'a>(pairs: &[&'a str]) -> Result<Vec<(&'a str, &'a str)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| anyhow!("Expected key=value, got {:?}", pair))
        })
        .collect()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid value for {}: {:?}", key, value))
}

fn print_stats(entries: &[UserStats]) {
    if entries.is_empty() {
        println!("No measurements");
        return;
    }
    println!(
        "{:<20} {:>10} {:>10} {:>9} {:>6}",
        "Date", "Weight", "Height", "Body fat", "BMI"
    );
    for stats in entries {
        let date = stats
            .measured_at()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:>10} {:>10} {:>9} {:>6}",
            date,
            format_measurement(stats.weight, "kg"),
            format_measurement(stats.height, "cm"),
            format_measurement(stats.body_fat_percentage, "%"),
            stats
                .bmi()
                .map(|b| format!("{:.1}", b))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_workouts(entries: &[WorkoutHistory]) {
    if entries.is_empty() {
        println!("No workouts logged");
        return;
    }
    for workout in entries {
        let exercises: Vec<String> = workout
            .exercises
            .iter()
            .map(|(name, reps)| format!("{} x{}", name, reps))
            .collect();
        println!(
            "{}  {:<12} {:>4} min  {}{}",
            format_optional(&workout.workout_date, "-"),
            format_optional(&workout.muscle_group, "-"),
            workout
                .duration_minutes
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
            exercises.join(", "),
            if workout.completed { "" } else { " (incomplete)" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs(&["age=30", " weight = 165.5 "]).expect("pairs");
        assert_eq!(pairs, vec![("age", "30"), ("weight", "165.5")]);
    }

    #[test]
    fn test_parse_pairs_rejects_malformed() {
        assert!(parse_pairs(&["age"]).is_err());
        assert!(parse_pairs(&["age="]).is_err());
        assert!(parse_pairs(&["=30"]).is_err());
    }

    #[test]
    fn test_parse_value() {
        let age: u32 = parse_value("age", "30").expect("number");
        assert_eq!(age, 30);
        assert!(parse_value::<u32>("age", "thirty").is_err());
    }
}
