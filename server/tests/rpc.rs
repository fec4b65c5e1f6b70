mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use platform_authz::rpc::FacilityRoleRequest;
use platform_authz::{GuardMode, Role};
use platform_db::procedures;
use serde_json::{Value, json};
use server::http::build_router;
use tower::ServiceExt;

use common::TestApp;

const EFFECTIVE_ROLE: &str = "/rpc/get_effective_role_for_facility";
const ASSIGN: &str = "/rpc/assign_facility_role";
const REVOKE: &str = "/rpc/revoke_facility_role";

async fn call(
    app: &TestApp,
    path: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = build_router(app.state.clone())
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_check_is_public() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let request = Request::builder().uri("/healthz").body(Body::empty());
    let response = build_router(app.state.clone())
        .oneshot(request.unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn bootstrap_check_needs_no_token() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let (status, body) = call(&app, "/rpc/has_national_users", None, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": true}));
}

#[tokio::test]
async fn other_procedures_require_a_valid_token() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let payload = json!({
        "user_id": app.seeded.viewer_id,
        "facility_id": app.seeded.central_store_id,
    });
    let (status, body) = call(&app, EFFECTIVE_ROLE, None, payload.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    let (status, _) = call(&app, EFFECTIVE_ROLE, Some("garbage"), payload).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_procedures_and_bad_payloads_are_rejected() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let token = app.token(app.seeded.national_id);
    let (status, body) = call(&app, "/rpc/drop_everything", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = call(&app, ASSIGN, Some(&token), json!({"user_id": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION");
}

#[tokio::test]
async fn effective_role_is_returned_as_storage_code() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let token = app.token(app.seeded.officer_id);
    let (status, body) = call(
        &app,
        EFFECTIVE_ROLE,
        Some(&token),
        json!({"user_id": app.seeded.officer_id, "facility_id": app.seeded.district_clinic_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "FACILITY_OFFICER"}));

    let (status, body) = call(
        &app,
        EFFECTIVE_ROLE,
        Some(&token),
        json!({"user_id": app.seeded.officer_id, "facility_id": app.seeded.central_store_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": null}));
}

#[tokio::test]
async fn callers_cannot_inspect_other_users_without_authority() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let token = app.token(app.seeded.viewer_id);
    let (status, body) = call(
        &app,
        EFFECTIVE_ROLE,
        Some(&token),
        json!({"user_id": app.seeded.national_id, "facility_id": app.seeded.central_store_id}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn facility_grants_let_managers_inspect_colleagues() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let clinic = app.seeded.district_clinic_id;
    let payload = json!({"user_id": app.seeded.officer_id, "facility_id": clinic});
    let viewer = app.token(app.seeded.viewer_id);

    let (status, _) = call(&app, EFFECTIVE_ROLE, Some(&viewer), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let grant = FacilityRoleRequest {
        user_id: app.seeded.viewer_id,
        facility_id: clinic,
        role: Role::FacilityManager,
    };
    procedures::assign_facility_role(app.state.db.as_ref(), app.seeded.national_id, &grant)
        .await
        .unwrap();

    let (status, body) = call(&app, EFFECTIVE_ROLE, Some(&viewer), payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": "FACILITY_OFFICER"}));
}

#[tokio::test]
async fn assignment_is_authorized_by_the_store() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let payload = json!({
        "user_id": app.seeded.viewer_id,
        "facility_id": app.seeded.district_clinic_id,
        "role": "qa",
    });

    let officer = app.token(app.seeded.officer_id);
    let (status, body) = call(&app, ASSIGN, Some(&officer), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let manager = app.token(app.seeded.manager_id);
    let (status, body) = call(&app, ASSIGN, Some(&manager), payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["role"], "qa");
    assert_eq!(body["result"]["is_active"], true);

    let (status, body) = call(&app, REVOKE, Some(&manager), payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["is_active"], false);

    let (status, body) = call(&app, REVOKE, Some(&manager), payload).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn conditional_checks_and_usage_logging() {
    let app = TestApp::new(GuardMode::Enforcing).await;
    let token = app.token(app.seeded.officer_id);
    let (status, body) = call(
        &app,
        "/rpc/check_conditional_permissions",
        Some(&token),
        json!({
            "user_id": app.seeded.officer_id,
            "facility_id": app.seeded.district_clinic_id,
            "permission_name": "export_data",
            "context": {"at": "2026-03-04T11:00:00+03:00"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": true}));

    let (status, body) = call(
        &app,
        "/rpc/log_permission_usage",
        Some(&token),
        json!({
            "user_id": app.seeded.officer_id,
            "permission_name": "export_data",
            "resource_type": "report",
            "facility_id": app.seeded.district_clinic_id,
            "granted": true,
            "method": "conditional"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": null}));
}
