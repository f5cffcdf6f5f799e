//! HTTP-level tests for `ApiClient` against a mock backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone};
use fitpro_core::api::{ApiClient, ApiError, ApiEvent, ExpiryHook};
use fitpro_core::models::RecordStats;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records the tokens it is told about
#[derive(Default)]
struct RecordingHook {
    expired: Mutex<Vec<String>>,
}

impl RecordingHook {
    fn expired(&self) -> Vec<String> {
        self.expired.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExpiryHook for RecordingHook {
    async fn session_expired(&self, token: &str) {
        // Yield first so a hook that is not awaited would finish too late
        tokio::task::yield_now().await;
        if let Ok(mut expired) = self.expired.lock() {
            expired.push(token.to_string());
        }
    }
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), Duration::from_secs(5)).expect("client builds")
}

fn authorization_headers(requests: &[wiremock::Request], request_path: &str) -> Vec<Option<String>> {
    requests
        .iter()
        .filter(|r| r.url.path() == request_path)
        .map(|r| {
            r.headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}

#[tokio::test]
async fn test_login_is_sent_without_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_partial_json(json!({"email": "a@b.com", "password": "Secret1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "T2",
            "username": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.arm("OLD".to_string()).await;

    let auth = client.login("a@b.com", "Secret1").await.expect("login succeeds");
    assert_eq!(auth.token, "T2");
    assert_eq!(auth.profile, None);

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(authorization_headers(&requests, "/auth/login"), vec![None]);
}

#[tokio::test]
async fn test_protected_request_carries_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workouts/stats"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "streak": 4,
            "totalWorkouts": 20,
            "lastWorkoutDate": "2024-05-01T18:00:00",
            "lastWorkoutMuscleGroup": "legs"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.arm("T1".to_string()).await;

    let stats = client.get_workout_stats().await.expect("stats");
    assert_eq!(stats.streak, 4);
    assert_eq!(stats.total_workouts, 20);
    assert_eq!(stats.last_workout_muscle_group.as_deref(), Some("legs"));
}

#[tokio::test]
async fn test_unarmed_client_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let history = client.get_stats_history().await.expect("history");
    assert!(history.is_empty());

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(authorization_headers(&requests, "/api/stats/history"), vec![None]);
}

#[tokio::test]
async fn test_unauthorized_emits_one_expiry_and_disarms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workouts/stats"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut events = client.subscribe();
    client.arm("T1".to_string()).await;

    let result = client.get_workout_stats().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(!client.is_armed().await);

    match events.try_recv() {
        Ok(ApiEvent::SessionExpired { token }) => assert_eq!(token, "T1"),
        other => panic!("expected SessionExpired, got {:?}", other),
    }

    // Follow-up requests go out without a token and do not re-announce
    let result = client.get_workout_stats().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_concurrent_unauthorized_responses_expire_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workouts"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;

    let client = Arc::new(client_for(&server));
    let mut events = client.subscribe();
    client.arm("T1".to_string()).await;

    let calls = (0..4).map(|_| {
        let client = Arc::clone(&client);
        async move { client.get_workout_history().await }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ApiError::Unauthorized))));
    assert!(matches!(
        events.try_recv(),
        Ok(ApiEvent::SessionExpired { .. })
    ));
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_rejected_credentials_do_not_expire_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut events = client.subscribe();
    client.arm("T1".to_string()).await;

    let result = client.login("a@b.com", "wrong").await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(client.is_armed().await);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_forbidden_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users/profile"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut events = client.subscribe();
    client.arm("T1".to_string()).await;

    let profile = serde_json::from_value(json!({
        "age": "30",
        "weight": "165",
        "height": "70",
        "gender": "male",
        "fitnessLevel": "beginner",
        "fitnessGoals": "strength"
    }))
    .expect("profile");
    let result = client.update_profile(&profile).await;

    match result {
        Err(ApiError::AccessDenied(body)) => assert_eq!(body, "Forbidden"),
        other => panic!("expected AccessDenied, got {:?}", other),
    }
    assert!(client.is_armed().await);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_latest_stats_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/latest"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.arm("T1".to_string()).await;
    assert!(client.get_latest_stats().await.expect("no error").is_none());
}

#[tokio::test]
async fn test_latest_stats_parses_measurement() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "weight": 72.5,
            "height": 180.0,
            "bodyFatPercentage": 18.2,
            "measurementDate": "2024-03-10T09:15:00",
            "bmi": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.arm("T1".to_string()).await;
    let stats = client
        .get_latest_stats()
        .await
        .expect("no error")
        .expect("stats present");
    assert_eq!(stats.id.as_deref(), Some("7"));
    assert_eq!(stats.body_fat_percentage, Some(18.2));
    assert!(stats.bmi().is_some());
}

#[tokio::test]
async fn test_record_stats_sends_local_wall_clock_date() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/stats"))
        .and(body_partial_json(json!({
            "weight": 72.0,
            "measurementDate": "2024-03-10T09:15:00.000Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s1",
            "weight": 72.0,
            "measurementDate": "2024-03-10T09:15:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.arm("T1".to_string()).await;

    let utc_minus_5 = FixedOffset::west_opt(5 * 3600).expect("offset");
    let at = utc_minus_5
        .with_ymd_and_hms(2024, 3, 10, 9, 15, 0)
        .single()
        .expect("unambiguous");
    let request = RecordStats::default().weight(72.0).measured_at(&at);

    let saved = client.record_stats(&request).await.expect("recorded");
    assert_eq!(saved.weight, Some(72.0));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workouts/stats"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client =
        ApiClient::new(&server.uri(), Duration::from_millis(200)).expect("client builds");
    let result = client.get_workout_stats().await;
    assert!(matches!(result, Err(ApiError::Timeout)), "got {:?}", result);
    assert!(result.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_malformed_body_keeps_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workouts/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.get_workout_stats().await {
        Err(ApiError::InvalidResponse { body, .. }) => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected InvalidResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/progress/weight"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get_weight_progress().await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_expiry_hook_runs_before_error_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workouts/stats"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let hook = Arc::new(RecordingHook::default());
    let weak = Arc::downgrade(&hook);
    client.set_expiry_hook(weak);

    // Rejected credentials are not an expiry
    assert!(client.login("a@b.com", "wrong").await.is_err());
    assert!(hook.expired().is_empty());

    client.arm("T1".to_string()).await;
    let result = client.get_workout_stats().await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert_eq!(hook.expired(), vec!["T1".to_string()]);

    // Unauthenticated 401s have no session to end
    let _ = client.get_workout_stats().await;
    assert_eq!(hook.expired(), vec!["T1".to_string()]);
}
