use assert_matches::assert_matches;
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "secret".to_string(),
        scheduler_base_url: String::new(),
        scheduler_user_id: String::new(),
        scheduler_api_key: String::new(),
        confirmation_code_prefix: "SWC-".to_string(),
        booking_horizon_months: 3,
        booking_success_reset_secs: 5,
        booking_session_ttl_secs: 1800,
        booking_submission_timeout_secs: 30,
        bind_addr: "127.0.0.1:0".to_string(),
    }
}

#[tokio::test]
async fn test_request_sends_api_key_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .and(query_param("is_active", "eq.true"))
        .and(header("apikey", "test-anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "s1"}])))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let rows: Vec<Value> = client
        .request(Method::GET, "/rest/v1/staff?is_active=eq.true", Some("user-token"), None)
        .await
        .expect("request should succeed");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "s1");
}

#[tokio::test]
async fn test_conflict_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value"))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let err = client
        .request_returning(Method::POST, "/rest/v1/appointments", None, json!({"a": 1}))
        .await
        .expect_err("409 should fail");

    assert!(SupabaseError::is_conflict(&err));
    assert!(!SupabaseError::is_unique_violation(&err, "confirmation_code"));
    assert_matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Conflict(_)));
}

#[tokio::test]
async fn test_unique_violation_reads_postgrest_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_confirmation_code_key\"",
            "details": "Key (confirmation_code)=(SWC-ABC123) already exists.",
            "hint": null
        })))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let err = client
        .request_returning(Method::POST, "/rest/v1/appointments", None, json!({"a": 1}))
        .await
        .expect_err("409 should fail");

    assert!(SupabaseError::is_unique_violation(&err, "confirmation_code"));
    assert!(!SupabaseError::is_unique_violation(&err, "email"));

    let body = err.downcast_ref::<SupabaseError>().and_then(SupabaseError::postgrest_error).unwrap();
    assert_eq!(body.code.as_deref(), Some("23505"));
}

#[tokio::test]
async fn test_server_error_is_not_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let err = client
        .request::<Value>(Method::GET, "/rest/v1/staff", None, None)
        .await
        .expect_err("503 should fail");

    assert!(!SupabaseError::is_conflict(&err));
    assert_matches!(
        err.downcast_ref::<SupabaseError>(),
        Some(SupabaseError::Api { status: 503, .. })
    );
}

#[tokio::test]
async fn test_rpc_posts_arguments() {
    let server = MockServer::start().await;
    let args = json!({"service_name": "IV Therapy"});
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_available_staff"))
        .and(body_json(args.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let rows: Vec<Value> = client
        .rpc("get_available_staff", None, args)
        .await
        .expect("rpc should succeed");

    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_upsert_merges_on_conflict_column() {
    let server = MockServer::start().await;
    let body = json!({"service_id": "s-1", "gender_preference": "female_only"});
    Mock::given(method("POST"))
        .and(path("/rest/v1/service_gender_preferences"))
        .and(query_param("on_conflict", "service_id"))
        .and(header("prefer", "resolution=merge-duplicates,return=representation"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([body.clone()])))
        .expect(1)
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let rows = client
        .upsert("service_gender_preferences", "service_id", None, body.clone())
        .await
        .expect("upsert should succeed");

    assert_eq!(rows, vec![body]);
}

#[tokio::test]
async fn test_delete_returns_removed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/staff_services"))
        .and(query_param("staff_id", "eq.a"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = SupabaseClient::new(&config_for(&server));
    let rows = client
        .delete_returning("/rest/v1/staff_services?staff_id=eq.a", None)
        .await
        .expect("delete should succeed");

    assert!(rows.is_empty());
}
