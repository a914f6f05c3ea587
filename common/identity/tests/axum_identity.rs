mod support;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use common_identity::{ensure_group, TokenVerifier, VerifiedIdentity, VerifierConfig};
use jsonwebtoken::Algorithm;
use serde_json::{json, Value};
use support::{issue_token, primary_key, signing_key, static_verifier, CLIENT_ID};
use tower::ServiceExt;

async fn whoami(identity: VerifiedIdentity) -> String {
    identity.subject().to_string()
}

async fn admin_only(identity: VerifiedIdentity) -> axum::response::Response {
    match ensure_group(&identity, &["admins"]) {
        Ok(()) => "welcome".into_response(),
        Err(err) => err.into_response(),
    }
}

fn app() -> Router {
    let verifier: Arc<TokenVerifier> = Arc::new(static_verifier(
        vec![signing_key("k1", primary_key(), None)],
        VerifierConfig::new(CLIENT_ID),
    ));
    Router::new()
        .route("/whoami", get(whoami))
        .route("/admin", get(admin_only))
        .with_state(verifier)
}

fn token(groups: &[&str], exp_offset: i64) -> String {
    let claims = json!({
        "sub": "u1",
        "aud": CLIENT_ID,
        "exp": Utc::now().timestamp() + exp_offset,
        "cognito:groups": groups,
    });
    issue_token(primary_key(), Some("k1"), Algorithm::RS256, &claims)
}

fn request(path: &str, bearer: &str) -> Request<Body> {
    Request::get(path)
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn verified_identity_reaches_handler() {
    let response = app()
        .oneshot(request("/whoami", &token(&[], 600)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&body[..], b"u1");
}

#[tokio::test]
async fn expired_token_is_rejected_with_error_code() {
    let response = app()
        .oneshot(request("/whoami", &token(&[], -30)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json body");
    assert_eq!(payload["code"], "AUTH_EXPIRED");
}

#[tokio::test]
async fn group_guard_admits_members_only() {
    let allowed = app()
        .oneshot(request("/admin", &token(&["admins"], 600)))
        .await
        .expect("response");
    assert_eq!(allowed.status(), StatusCode::OK);

    let denied = app()
        .oneshot(request("/admin", &token(&["staff"], 600)))
        .await
        .expect("response");
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}
