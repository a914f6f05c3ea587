use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType};
use aws_sdk_cognitoidentityprovider::Client;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{IdentityError, IdentityResult};
use crate::exchange::TokenBundle;

/// Username/password pair for a single authentication attempt.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Administrative user-pool operations. Each call maps onto exactly one
/// remote request; provider messages are returned unmodified.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    /// Create a user whose username doubles as a verified email address.
    /// Returns the new user's subject identifier.
    async fn create_user(
        &self,
        username: &str,
        temporary_password: Option<&str>,
    ) -> IdentityResult<String>;

    async fn delete_user(&self, username: &str) -> IdentityResult<()>;

    async fn confirm_user(&self, username: &str) -> IdentityResult<()>;

    async fn set_password(&self, username: &str, password: &str, permanent: bool)
        -> IdentityResult<()>;

    async fn add_user_to_group(&self, username: &str, group: &str) -> IdentityResult<()>;

    async fn list_groups(&self, username: &str) -> IdentityResult<BTreeSet<String>>;

    /// Run the `USER_PASSWORD_AUTH` flow. Returned tokens are unverified.
    async fn authenticate_with_password(
        &self,
        credentials: &Credentials,
    ) -> IdentityResult<TokenBundle>;
}

/// [`IdentityAdmin`] backed by the Cognito Identity Provider API.
#[derive(Clone)]
pub struct CognitoAdmin {
    client: Client,
    user_pool_id: String,
    client_id: String,
    client_secret: Option<String>,
}

impl CognitoAdmin {
    /// Build an SDK client for the configured region. Static credentials are
    /// used when configured, otherwise the default provider chain. SDK
    /// retries are disabled and every operation is bounded by the configured
    /// timeout.
    pub async fn from_config(config: &ClientConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.timeout())
                    .build(),
            );

        if let Some(static_credentials) = &config.aws_credentials {
            loader = loader.credentials_provider(aws_credential_types::Credentials::new(
                static_credentials.access_key_id.clone(),
                static_credentials.secret_access_key.clone(),
                None,
                None,
                "identity-client-static",
            ));
        }
        if let Some(endpoint) = &config.admin_endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Self::with_client(
            Client::new(&sdk_config),
            config.pool_id.clone(),
            config.client_id.clone(),
            config.secret().map(str::to_owned),
        )
    }

    pub fn with_client(
        client: Client,
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    pub fn user_pool_id(&self) -> &str {
        &self.user_pool_id
    }
}

impl fmt::Debug for CognitoAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CognitoAdmin")
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl IdentityAdmin for CognitoAdmin {
    async fn create_user(
        &self,
        username: &str,
        temporary_password: Option<&str>,
    ) -> IdentityResult<String> {
        let output = self
            .client
            .admin_create_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .set_temporary_password(temporary_password.map(str::to_owned))
            .user_attributes(attribute("email", username)?)
            .user_attributes(attribute("email_verified", "true")?)
            .send()
            .await
            .map_err(|err| provider_error("AdminCreateUser", err))?;

        let user = output
            .user()
            .ok_or_else(|| IdentityError::Parse("AdminCreateUser response has no user".into()))?;
        let subject = user
            .attributes()
            .iter()
            .find(|attribute| attribute.name() == "sub")
            .and_then(|attribute| attribute.value())
            .or_else(|| user.username())
            .ok_or_else(|| IdentityError::Parse("created user has no identifier".into()))?;

        debug!(username, subject, "created user");
        Ok(subject.to_string())
    }

    async fn delete_user(&self, username: &str) -> IdentityResult<()> {
        self.client
            .admin_delete_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|err| provider_error("AdminDeleteUser", err))?;
        Ok(())
    }

    async fn confirm_user(&self, username: &str) -> IdentityResult<()> {
        self.client
            .admin_confirm_sign_up()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|err| provider_error("AdminConfirmSignUp", err))?;
        Ok(())
    }

    async fn set_password(
        &self,
        username: &str,
        password: &str,
        permanent: bool,
    ) -> IdentityResult<()> {
        self.client
            .admin_set_user_password()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .password(password)
            .permanent(permanent)
            .send()
            .await
            .map_err(|err| provider_error("AdminSetUserPassword", err))?;
        Ok(())
    }

    async fn add_user_to_group(&self, username: &str, group: &str) -> IdentityResult<()> {
        self.client
            .admin_add_user_to_group()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .group_name(group)
            .send()
            .await
            .map_err(|err| provider_error("AdminAddUserToGroup", err))?;
        Ok(())
    }

    async fn list_groups(&self, username: &str) -> IdentityResult<BTreeSet<String>> {
        let mut groups = BTreeSet::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .admin_list_groups_for_user()
                .user_pool_id(&self.user_pool_id)
                .username(username)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|err| provider_error("AdminListGroupsForUser", err))?;

            groups.extend(
                output
                    .groups()
                    .iter()
                    .filter_map(|group| group.group_name())
                    .map(str::to_owned),
            );

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
                _ => break,
            }
        }

        Ok(groups)
    }

    async fn authenticate_with_password(
        &self,
        credentials: &Credentials,
    ) -> IdentityResult<TokenBundle> {
        let mut request = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", &credentials.username)
            .auth_parameters("PASSWORD", credentials.password());
        if let Some(secret) = &self.client_secret {
            request = request.auth_parameters(
                "SECRET_HASH",
                secret_hash(&credentials.username, &self.client_id, secret)?,
            );
        }

        let output = request
            .send()
            .await
            .map_err(|err| provider_error("InitiateAuth", err))?;

        match output.authentication_result() {
            Some(result) => Ok(TokenBundle {
                id_token: result.id_token().unwrap_or_default().to_string(),
                access_token: result.access_token().unwrap_or_default().to_string(),
                refresh_token: result.refresh_token().map(str::to_owned),
                expires_in: i64::from(result.expires_in()),
                token_type: result.token_type().unwrap_or_default().to_string(),
            }),
            None => {
                let challenge = output
                    .challenge_name()
                    .map(|name| name.as_str().to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                warn!(username = %credentials.username, challenge = %challenge, "password authentication requires a challenge");
                Err(IdentityError::ChallengeRequired(challenge))
            }
        }
    }
}

/// `SECRET_HASH` for app clients configured with a secret:
/// base64(HMAC-SHA256(secret, username + client_id)).
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> IdentityResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|err| IdentityError::Config(err.to_string()))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn attribute(name: &str, value: &str) -> IdentityResult<AttributeType> {
    AttributeType::builder()
        .name(name)
        .value(value)
        .build()
        .map_err(|err| IdentityError::Config(err.to_string()))
}

fn provider_error<E>(operation: &'static str, err: SdkError<E>) -> IdentityError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match err.as_service_error() {
        Some(service) => {
            let message = service
                .message()
                .or_else(|| service.code())
                .unwrap_or("identity provider rejected the request")
                .to_string();
            warn!(
                operation,
                code = service.code().unwrap_or("unknown"),
                message = %message,
                "identity provider rejected request"
            );
            IdentityError::Provider(message)
        }
        None => {
            let detail = DisplayErrorContext(&err).to_string();
            warn!(operation, error = %detail, "identity provider unreachable");
            IdentityError::Network(detail)
        }
    }
}
