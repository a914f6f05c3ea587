pub mod admin;
pub mod cancel;
pub mod claims;
pub mod client;
pub mod config;
pub mod error;
pub mod exchange;
pub mod extractors;
pub mod guards;
pub mod jwks;
pub mod key_set;
pub mod urls;
pub mod verifier;

pub use admin::{secret_hash, CognitoAdmin, Credentials, IdentityAdmin};
pub use cancel::cancellable;
pub use claims::VerifiedClaims;
pub use client::{CognitoClient, CognitoClientBuilder};
pub use config::{ClientConfig, SigningAlgorithm, StaticCredentials};
pub use error::{IdentityError, IdentityResult, RejectionError, VerifyError};
pub use exchange::{TokenBundle, TokenExchangeClient};
pub use extractors::VerifiedIdentity;
pub use guards::{ensure_group, GuardError};
pub use jwks::JwksFetcher;
pub use key_set::{KeySetCache, RefreshOutcome, SigningKey, SigningKeySet};
pub use urls::HostedUrls;
pub use verifier::{TokenVerifier, VerifierConfig};

pub use common_observability::IdentityMetrics;
