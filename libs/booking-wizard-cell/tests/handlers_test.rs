use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::services::{AppointmentStore, ConfirmationCodeGenerator, InMemoryAppointmentRepository};
use booking_wizard_cell::router::{booking_routes, BookingState};
use booking_wizard_cell::services::WizardServices;
use scheduling_cell::models::{Slot, SlotLookup};
use scheduling_cell::services::{clinic_today, SlotProvider};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use staff_cell::services::{InMemoryStaffDirectory, StaffMatcher};

struct MorningSlots;

#[async_trait]
impl SlotProvider for MorningSlots {
    async fn list_available_slots(&self, date: NaiveDate, service_name: &str) -> SlotLookup {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        SlotLookup::found(date, service_name, vec![Slot { time, datetime: NaiveDateTime::new(date, time) }])
    }
}

fn next_weekday() -> NaiveDate {
    clinic_today()
        .iter_days()
        .skip(1)
        .find(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .unwrap()
}

struct TestApp {
    router: Router,
    token: String,
}

impl TestApp {
    fn new() -> Self {
        let test_config = TestConfig::default();
        let services = WizardServices {
            slots: Arc::new(MorningSlots),
            staff: Arc::new(StaffMatcher::new(Arc::new(InMemoryStaffDirectory::new()))),
            appointments: Arc::new(AppointmentStore::new(
                Arc::new(InMemoryAppointmentRepository::new()),
                ConfirmationCodeGenerator::default(),
            )),
        };
        let state = Arc::new(BookingState::with_services(test_config.to_arc(), services));
        let user = TestUser::patient("patient@example.com");

        Self {
            router: booking_routes(state),
            token: JwtTestUtils::create_test_token(&user, &test_config.jwt_secret, None),
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>, signed_in: bool) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if signed_in {
            builder = builder.header("Authorization", format!("Bearer {}", self.token));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Walk a fresh session up to the review step anonymously.
    async fn session_at_review(&self) -> String {
        let (status, view) = self.call(Method::POST, "/", None, false).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = view["session_id"].as_str().unwrap().to_string();

        let info = json!({
            "first_name": "Ana",
            "last_name": "Lopez",
            "email": "ana@example.com",
            "phone": "555-0100",
            "service_name": "IV Therapy"
        });
        let steps = [
            (Method::PUT, "info", Some(info)),
            (Method::POST, "advance", None),
            (Method::POST, "date", Some(json!({ "date": next_weekday() }))),
            (Method::POST, "slot", Some(json!({ "time": "09:00" }))),
            (Method::POST, "advance", None),
            (Method::POST, "staff", Some(json!({ "staff_id": null }))),
        ];

        for (method, action, body) in steps {
            let (status, view) = self.call(method, &format!("/{}/{}", id, action), body, false).await;
            assert_eq!(status, StatusCode::OK, "{} failed: {}", action, view);
        }
        id
    }
}

#[tokio::test]
async fn test_wizard_steps_work_without_sign_in() {
    let app = TestApp::new();
    let id = app.session_at_review().await;

    let (status, view) = app.call(Method::GET, &format!("/{}", id), None, false).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["step"], "review");
    assert_eq!(view["step_number"], 4);
    assert_eq!(view["draft"]["time"], "09:00");
}

#[tokio::test]
async fn test_advance_with_blank_fields_is_bad_request() {
    let app = TestApp::new();
    let (_, view) = app.call(Method::POST, "/", None, false).await;
    let id = view["session_id"].as_str().unwrap();

    let (status, body) = app.call(Method::POST, &format!("/{}/advance", id), None, false).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "first_name is required");
}

#[tokio::test]
async fn test_anonymous_submit_returns_pending_token() {
    let app = TestApp::new();
    let id = app.session_at_review().await;

    let (status, view) = app.call(Method::POST, &format!("/{}/submit", id), None, false).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(view["appointment"].is_null());
    let token = view["pending_submission"]["token"].clone();
    assert!(token.is_string());

    let (status, view) = app
        .call(Method::POST, &format!("/{}/resume", id), Some(json!({ "token": token })), true)
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["step"], "submitted");
    assert!(view["appointment"]["confirmation_code"].as_str().unwrap().starts_with("SWC-"));
}

#[tokio::test]
async fn test_signed_in_submit_creates_appointment() {
    let app = TestApp::new();
    let id = app.session_at_review().await;

    let (status, view) = app.call(Method::POST, &format!("/{}/submit", id), None, true).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(view["appointment"]["status"], "pending");
    assert_eq!(view["appointment"]["service_type"], "IV Therapy");
}

#[tokio::test]
async fn test_invalid_token_is_rejected_even_for_wizard_steps() {
    let app = TestApp::new();
    let response = app.router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/")
                .header("Authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let app = TestApp::new();
    let (status, _) = app
        .call(Method::GET, &format!("/{}", uuid::Uuid::new_v4()), None, false)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
