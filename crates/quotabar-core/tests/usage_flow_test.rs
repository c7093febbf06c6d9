//! End-to-end test of the poll → reconcile → persist loop
//!
//! Drives the Claude provider against a mock API and feeds every result
//! through a reconciler backed by a real state file.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use quotabar_core::services::usage::{
    ClaudeUsageProvider, JsonFileStore, RefreshTrend, UsageCategory, UsageProvider,
    UsageReconciler, UsageSettings,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CYCLE_A: &str = "2025-03-01T15:00:00Z";
const CYCLE_B: &str = "2025-03-01T20:00:00Z";

fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

struct Harness {
    server: MockServer,
    provider: ClaudeUsageProvider,
    state_dir: TempDir,
    alerts: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let provider = ClaudeUsageProvider::with_credentials_path("/nonexistent/creds.json".into())
            .without_system_store()
            .with_manual_token(Some("test-token".to_string()))
            .with_base_url(server.uri());
        Self {
            server,
            provider,
            state_dir: TempDir::new().unwrap(),
            alerts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn reconciler(&self, settings: Option<UsageSettings>) -> UsageReconciler {
        let store = JsonFileStore::open(self.state_dir.path().join("state.json")).unwrap();
        let sink = Arc::clone(&self.alerts);
        let notifier = move |title: &str, _body: &str| {
            sink.lock().unwrap().push(title.to_string());
        };
        match settings {
            Some(settings) => UsageReconciler::new(settings, store, notifier),
            None => UsageReconciler::load(store, notifier),
        }
    }

    async fn respond(&self, status: u16, five_hour: f64, resets_at: &str) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path("/api/oauth/usage"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "five_hour": { "utilization": five_hour, "resets_at": resets_at },
                "seven_day": { "utilization": 5.0, "resets_at": "2025-03-07T00:00:00Z" }
            })))
            .mount(&self.server)
            .await;
    }

    async fn poll(
        &self,
        reconciler: &mut UsageReconciler,
        minutes: i64,
    ) -> quotabar_core::services::usage::ReconcileOutcome {
        let result = self.provider.fetch_usage().await;
        reconciler.reconcile(result, t(minutes))
    }

    fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

fn adaptive() -> UsageSettings {
    UsageSettings {
        adaptive_polling: true,
        ..UsageSettings::default()
    }
}

#[tokio::test]
async fn test_cycle_history_and_alerts_across_polls() {
    let h = Harness::start().await;
    let mut r = h.reconciler(Some(UsageSettings::default()));

    h.respond(200, 40.0, CYCLE_A).await;
    h.poll(&mut r, 0).await;
    assert_eq!(r.cycle_marker(), Some(CYCLE_A));
    assert!(r.history().is_empty());

    h.respond(200, 60.0, CYCLE_A).await;
    h.poll(&mut r, 60).await;
    h.respond(200, 92.0, CYCLE_A).await;
    let outcome = h.poll(&mut r, 120).await;

    assert_eq!(r.history().len(), 2);
    assert!(outcome.display.rate.is_some());
    assert_eq!(h.alerts(), vec!["Usage above 80%", "Usage above 90%"]);

    // New window: history and fired thresholds start over
    h.respond(200, 0.0, CYCLE_B).await;
    let outcome = h.poll(&mut r, 300).await;
    assert_eq!(r.cycle_marker(), Some(CYCLE_B));
    assert!(r.history().is_empty());
    assert!(outcome.display.rate.is_none());
    assert!(r.alert_state().fired_thresholds().is_empty());
    assert!(h.alerts().contains(&"5-hour limit reset".to_string()));
}

#[tokio::test]
async fn test_adaptive_polling_speeds_up_then_backs_off() {
    let h = Harness::start().await;
    let mut r = h.reconciler(Some(adaptive()));

    h.respond(200, 10.0, CYCLE_A).await;
    assert_eq!(h.poll(&mut r, 0).await.next_interval, Duration::from_secs(300));
    assert_eq!(h.poll(&mut r, 5).await.next_interval, Duration::from_secs(300));

    h.respond(200, 20.0, CYCLE_A).await;
    let outcome = h.poll(&mut r, 10).await;
    assert_eq!(outcome.next_interval, Duration::from_secs(120));
    assert_eq!(outcome.display.refresh_trend, Some(RefreshTrend::Up));

    h.respond(200, 30.0, CYCLE_A).await;
    assert_eq!(h.poll(&mut r, 12).await.next_interval, Duration::from_secs(60));

    // Two unchanged polls per step back toward base
    assert_eq!(h.poll(&mut r, 13).await.next_interval, Duration::from_secs(60));
    assert_eq!(h.poll(&mut r, 14).await.next_interval, Duration::from_secs(120));
}

#[tokio::test]
async fn test_failed_poll_keeps_last_values() {
    let h = Harness::start().await;
    let mut r = h.reconciler(Some(UsageSettings::default()));

    h.respond(200, 42.0, CYCLE_A).await;
    h.poll(&mut r, 0).await;

    h.server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/usage"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&h.server)
        .await;
    let outcome = h.poll(&mut r, 5).await;

    let error = outcome.display.error.as_ref().unwrap();
    assert_eq!(error.token, "rate limit?");
    assert!(error.emphasized);
    assert_eq!(
        outcome.display.category(UsageCategory::FiveHour).unwrap().percent,
        42
    );
    assert_eq!(outcome.display.status_text(), "42% · rate limit?");
    assert_eq!(r.cycle_marker(), Some(CYCLE_A));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let h = Harness::start().await;

    {
        let mut r = h.reconciler(Some(adaptive()));
        h.respond(200, 50.0, CYCLE_A).await;
        h.poll(&mut r, 0).await;
        h.respond(200, 85.0, CYCLE_A).await;
        h.poll(&mut r, 5).await;
        assert_eq!(h.alerts(), vec!["Usage above 80%"]);
    }

    let mut r = h.reconciler(None);
    assert!(r.settings().adaptive_polling);
    assert_eq!(r.cycle_marker(), Some(CYCLE_A));
    assert_eq!(r.history().len(), 1);
    assert!(r.last_fetch().is_some());

    // Already fired in this cycle
    h.poll(&mut r, 10).await;
    assert_eq!(h.alerts(), vec!["Usage above 80%"]);
}
