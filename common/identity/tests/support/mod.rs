#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common_identity::{
    KeySetCache, SigningAlgorithm, SigningKey, SigningKeySet, TokenVerifier, VerifierConfig,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const CLIENT_ID: &str = "abc123";
pub const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_pool";

pub struct KeyMaterial {
    pub encoding: EncodingKey,
    pub public_pem: String,
    pub modulus: String,
    pub exponent: String,
}

fn generate_key_material() -> KeyMaterial {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
    let public_key = private_key.to_public_key();

    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");
    let public_pem = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

    KeyMaterial {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        public_pem,
        modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    }
}

/// Key pair shared by every test in a binary; generation is slow.
pub fn primary_key() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(generate_key_material)
}

/// Second, unrelated key pair for wrong-key scenarios.
pub fn other_key() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(generate_key_material)
}

pub fn jwk(kid: &str, key: &KeyMaterial, alg: Option<&str>) -> Value {
    let mut entry = json!({
        "kid": kid,
        "kty": "RSA",
        "use": "sig",
        "n": key.modulus,
        "e": key.exponent,
    });
    if let Some(alg) = alg {
        entry["alg"] = json!(alg);
    }
    entry
}

pub fn jwks_body(entries: Vec<Value>) -> Value {
    json!({ "keys": entries })
}

pub fn signing_key(kid: &str, key: &KeyMaterial, alg: Option<SigningAlgorithm>) -> SigningKey {
    SigningKey::from_rsa_pem(kid, alg, key.public_pem.as_bytes()).expect("signing key")
}

pub fn issue_token(key: &KeyMaterial, kid: Option<&str>, algorithm: Algorithm, claims: &Value) -> String {
    let mut header = Header::new(algorithm);
    header.kid = kid.map(str::to_owned);
    encode(&header, claims, &key.encoding).expect("sign token")
}

pub fn static_verifier(keys: Vec<SigningKey>, config: VerifierConfig) -> TokenVerifier {
    TokenVerifier::new(
        config,
        Arc::new(KeySetCache::from_static(SigningKeySet::new(keys))),
    )
}

/// Re-encode `token` with its payload replaced, keeping header and signature.
pub fn replace_payload(token: &str, claims: &Value) -> String {
    let mut segments = token.split('.');
    let header = segments.next().expect("header");
    let _payload = segments.next().expect("payload");
    let signature = segments.next().expect("signature");
    format!(
        "{header}.{}.{signature}",
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}
