use common_identity::{ClientConfig, CognitoAdmin, Credentials, IdentityAdmin, IdentityError};
use httpmock::prelude::*;
use serde_json::json;

const JSON_1_1: &str = "application/x-amz-json-1.1";

fn target(operation: &str) -> String {
    format!("AWSCognitoIdentityProviderService.{operation}")
}

async fn admin(server: &MockServer, secret: Option<&str>) -> CognitoAdmin {
    let mut config = ClientConfig::new("us-east-1", "us-east-1_pool", "abc123")
        .with_static_credentials("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG")
        .with_admin_endpoint(server.base_url())
        .with_timeout(5);
    if let Some(secret) = secret {
        config = config.with_client_secret(secret);
    }
    CognitoAdmin::from_config(&config).await
}

fn body_text(request: &HttpMockRequest) -> String {
    request
        .body
        .as_deref()
        .map(|body| String::from_utf8_lossy(body).into_owned())
        .unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread")]
async fn create_user_sets_email_attributes_and_returns_sub() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminCreateUser"))
            .body_contains("\"UserPoolId\":\"us-east-1_pool\"")
            .body_contains("\"Username\":\"alice@example.com\"")
            .body_contains("\"TemporaryPassword\":\"Temp#1234\"")
            .body_contains("email_verified");
        then.status(200)
            .header("content-type", JSON_1_1)
            .json_body(json!({
                "User": {
                    "Username": "alice@example.com",
                    "Attributes": [
                        { "Name": "email", "Value": "alice@example.com" },
                        { "Name": "sub", "Value": "5f1c-sub" }
                    ],
                    "Enabled": true,
                    "UserStatus": "FORCE_CHANGE_PASSWORD"
                }
            }));
    });

    let subject = admin(&server, None)
        .await
        .create_user("alice@example.com", Some("Temp#1234"))
        .await
        .expect("user created");

    mock.assert();
    assert_eq!(subject, "5f1c-sub");
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_rejection_message_is_passed_through() {
    let server = MockServer::start();
    let _mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminDeleteUser"));
        then.status(400)
            .header("content-type", JSON_1_1)
            .json_body(json!({
                "__type": "UserNotFoundException",
                "message": "User does not exist."
            }));
    });

    let err = admin(&server, None)
        .await
        .delete_user("ghost@example.com")
        .await
        .expect_err("provider rejects");
    assert_eq!(err.provider_message(), Some("User does not exist."));
}

#[tokio::test(flavor = "multi_thread")]
async fn confirm_and_password_calls_hit_their_operations() {
    let server = MockServer::start();
    let confirm = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminConfirmSignUp"));
        then.status(200).header("content-type", JSON_1_1).body("{}");
    });
    let password = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminSetUserPassword"))
            .body_contains("\"Permanent\":true");
        then.status(200).header("content-type", JSON_1_1).body("{}");
    });
    let group = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminAddUserToGroup"))
            .body_contains("\"GroupName\":\"admins\"");
        then.status(200).header("content-type", JSON_1_1).body("{}");
    });

    let admin = admin(&server, None).await;
    admin.confirm_user("alice").await.expect("confirmed");
    admin
        .set_password("alice", "N3w#Password", true)
        .await
        .expect("password set");
    admin
        .add_user_to_group("alice", "admins")
        .await
        .expect("added to group");

    confirm.assert();
    password.assert();
    group.assert();
}

#[tokio::test(flavor = "multi_thread")]
async fn list_groups_follows_pagination() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminListGroupsForUser"))
            .matches(|request| !body_text(request).contains("NextToken"));
        then.status(200)
            .header("content-type", JSON_1_1)
            .json_body(json!({
                "Groups": [ { "GroupName": "staff" }, { "GroupName": "admins" } ],
                "NextToken": "page-2"
            }));
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("AdminListGroupsForUser"))
            .body_contains("\"NextToken\":\"page-2\"");
        then.status(200)
            .header("content-type", JSON_1_1)
            .json_body(json!({ "Groups": [ { "GroupName": "admins" }, { "GroupName": "ops" } ] }));
    });

    let groups = admin(&server, None)
        .await
        .list_groups("alice")
        .await
        .expect("groups listed");

    first.assert();
    second.assert();
    assert_eq!(
        groups.into_iter().collect::<Vec<_>>(),
        vec!["admins".to_string(), "ops".to_string(), "staff".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn password_auth_sends_secret_hash_and_returns_tokens() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("InitiateAuth"))
            .body_contains("USER_PASSWORD_AUTH")
            .body_contains("\"SECRET_HASH\":\"nZVcsPUAKrD8ErcYHzn9A6WIGZyru4txEQIg2XSwFaE=\"");
        then.status(200)
            .header("content-type", JSON_1_1)
            .json_body(json!({
                "AuthenticationResult": {
                    "IdToken": "id-token",
                    "AccessToken": "access-token",
                    "RefreshToken": "refresh-token",
                    "ExpiresIn": 3600,
                    "TokenType": "Bearer"
                },
                "ChallengeParameters": {}
            }));
    });

    let tokens = admin(&server, Some("client-secret"))
        .await
        .authenticate_with_password(&Credentials::new("alice@example.com", "hunter2"))
        .await
        .expect("authenticated");

    mock.assert();
    assert_eq!(tokens.id_token, "id-token");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-token"));
    assert_eq!(tokens.expires_in, 3600);
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_challenge_is_reported() {
    let server = MockServer::start();
    let _mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("InitiateAuth"));
        then.status(200)
            .header("content-type", JSON_1_1)
            .json_body(json!({
                "ChallengeName": "NEW_PASSWORD_REQUIRED",
                "Session": "opaque-session",
                "ChallengeParameters": {}
            }));
    });

    let err = admin(&server, None)
        .await
        .authenticate_with_password(&Credentials::new("alice@example.com", "Temp#1234"))
        .await
        .expect_err("challenge pending");
    assert!(matches!(err, IdentityError::ChallengeRequired(name) if name == "NEW_PASSWORD_REQUIRED"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_endpoint_is_network_failure() {
    let config = ClientConfig::new("us-east-1", "us-east-1_pool", "abc123")
        .with_static_credentials("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG")
        .with_admin_endpoint("http://127.0.0.1:9")
        .with_timeout(2);
    let admin = CognitoAdmin::from_config(&config).await;

    let err = admin.confirm_user("alice").await.expect_err("no listener");
    assert!(matches!(err, IdentityError::Network(_)), "{err:?}");
}
