// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 identity token issuance and verification.
//!
//! ## Lifecycle
//!
//! The signing key is installed once at startup with
//! [`TokenIssuer::initialize`]. Until then every `issue`/`verify` call fails
//! fast with [`TokenError::NotInitialized`]; afterwards the key is read-only
//! and shared across request tasks without locking.
//!
//! ## Verification order
//!
//! 1. Signature (and algorithm) integrity, before any claim is interpreted
//! 2. `iat` not in the future beyond the clock skew tolerance
//! 3. `exp` not passed
//! 4. `aud` intersects the origins of the configured authorized domains
//!
//! Every failure is reported as the same [`TokenError::Invalid`].

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::claims::{audience_for, Claims, Identity};
use super::error::{TokenError, TokenRejection};

/// Clock skew tolerance for the `iat` claim (60 seconds).
const CLOCK_SKEW_LEEWAY: i64 = 60;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Signs and verifies identity tokens.
pub struct TokenIssuer {
    issuer: String,
    audience: Vec<String>,
    keys: OnceLock<SigningKeys>,
}

impl TokenIssuer {
    /// Create an issuer for `issuer` (the canonical hostname) whose tokens
    /// target every origin of `authorized_domains`.
    ///
    /// The issuer is not ready until [`initialize`](Self::initialize) is called.
    pub fn new(issuer: impl Into<String>, authorized_domains: &[String]) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience_for(authorized_domains),
            keys: OnceLock::new(),
        }
    }

    /// Install the signing key. Must be called exactly once.
    pub fn initialize(&self, secret: &SecretString) -> Result<(), TokenError> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let keys = SigningKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        };
        self.keys
            .set(keys)
            .map_err(|_| TokenError::AlreadyInitialized)
    }

    /// Whether the signing key has been installed.
    pub fn is_ready(&self) -> bool {
        self.keys.get().is_some()
    }

    /// Audience placed in every issued token.
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// Issue a token for `identity` valid for `ttl` from now.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(identity, ttl, Utc::now().timestamp())
    }

    /// Issue a token as if the current Unix time were `now`.
    pub fn issue_at(
        &self,
        identity: &Identity,
        ttl: Duration,
        now: i64,
    ) -> Result<String, TokenError> {
        let keys = self.keys()?;

        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidLifetime)?;
        if ttl_secs <= 0 {
            return Err(TokenError::InvalidLifetime);
        }

        let claims = Claims::new(identity, &self.issuer, self.audience.clone(), now, ttl_secs);
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return the identity it carries.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify a token as if the current Unix time were `now`.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Identity, TokenError> {
        let keys = self.keys()?;

        self.validate(token, keys, now)
            .map(|claims| claims.identity())
            .map_err(|reason| {
                debug!(reason = reason.as_str(), "Rejected identity token");
                TokenError::Invalid
            })
    }

    fn keys(&self) -> Result<&SigningKeys, TokenError> {
        self.keys.get().ok_or(TokenError::NotInitialized)
    }

    fn validate(&self, token: &str, keys: &SigningKeys, now: i64) -> Result<Claims, TokenRejection> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time claims are checked below against `now`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "iat", "sub", "aud"]);
        validation.set_audience(self.audience.as_slice());

        let token_data =
            decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenRejection::BadSignature,
                ErrorKind::InvalidAudience => TokenRejection::AudienceMismatch,
                _ => TokenRejection::Malformed,
            })?;

        let claims = token_data.claims;

        if claims.iat > now.saturating_add(CLOCK_SKEW_LEEWAY) {
            return Err(TokenRejection::IssuedInFuture);
        }

        if now >= claims.exp {
            return Err(TokenRejection::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    const NOW: i64 = 1_700_000_000;

    fn domains(list: &[&str]) -> Vec<String> {
        list.iter().map(|d| d.to_string()).collect()
    }

    fn ready_issuer(domain_list: &[&str]) -> TokenIssuer {
        let issuer = TokenIssuer::new("sso.example.com", &domains(domain_list));
        issuer
            .initialize(&SecretString::from("test-secret".to_string()))
            .unwrap();
        issuer
    }

    fn alice() -> Identity {
        Identity::new("alice", "Alice Liddell", "staff")
    }

    fn claims_of(token: &str) -> serde_json::Value {
        let segment = token.split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    #[test]
    fn signing_backend_is_available() {
        let issuer = ready_issuer(&["example.com"]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
            || -> Result<Identity, TokenError> {
                let token = issuer.issue(&alice(), Duration::from_secs(60))?;
                issuer.verify(&token)
            },
        ));
        assert_eq!(result.expect("signing must not panic").unwrap(), alice());
        assert_eq!(
            issuer.audience(),
            ["http://example.com".to_string(), "https://example.com".to_string()]
        );
    }

    #[test]
    fn issue_before_initialize_fails_fast() {
        let issuer = TokenIssuer::new("sso.example.com", &domains(&["example.com"]));
        assert!(!issuer.is_ready());
        assert!(matches!(
            issuer.issue(&alice(), Duration::from_secs(60)),
            Err(TokenError::NotInitialized)
        ));
        assert!(matches!(
            issuer.verify("a.b.c"),
            Err(TokenError::NotInitialized)
        ));
    }

    #[test]
    fn initialize_only_once() {
        let issuer = ready_issuer(&["example.com"]);
        assert!(issuer.is_ready());
        assert!(matches!(
            issuer.initialize(&SecretString::from("other".to_string())),
            Err(TokenError::AlreadyInitialized)
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let issuer = TokenIssuer::new("sso.example.com", &domains(&["example.com"]));
        assert!(matches!(
            issuer.initialize(&SecretString::from(String::new())),
            Err(TokenError::EmptySecret)
        ));
        assert!(!issuer.is_ready());
    }

    #[test]
    fn round_trip_returns_identity() {
        let issuer = ready_issuer(&["example.com"]);
        for ttl in [1, 60, 86_400, 604_800] {
            let token = issuer
                .issue_at(&alice(), Duration::from_secs(ttl), NOW)
                .unwrap();
            assert_eq!(issuer.verify_at(&token, NOW).unwrap(), alice());
        }
    }

    #[test]
    fn wire_format_has_expected_claims() {
        let issuer = ready_issuer(&["example.com", "example.org"]);
        let token = issuer
            .issue_at(&alice(), Duration::from_secs(3600), NOW)
            .unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = claims_of(&token);
        assert_eq!(claims["iss"], "sso.example.com");
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["iat"], NOW);
        assert_eq!(claims["exp"], NOW + 3600);
        assert_eq!(
            claims["aud"],
            serde_json::json!([
                "http://example.com",
                "https://example.com",
                "http://example.org",
                "https://example.org"
            ])
        );
        assert_eq!(claims["full_name"], "Alice Liddell");
        assert_eq!(claims["group"], "staff");
    }

    #[test]
    fn expiry_boundary() {
        let issuer = ready_issuer(&["example.com"]);
        let ttl = 3600;
        let token = issuer
            .issue_at(&alice(), Duration::from_secs(ttl), NOW)
            .unwrap();
        let expiry = NOW + ttl as i64;

        assert!(issuer.verify_at(&token, expiry - 1).is_ok());
        assert!(matches!(
            issuer.verify_at(&token, expiry + 1),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let issuer = ready_issuer(&["example.com"]);
        assert!(matches!(
            issuer.issue_at(&alice(), Duration::ZERO, NOW),
            Err(TokenError::InvalidLifetime)
        ));
    }

    #[test]
    fn future_issued_at_within_skew_is_accepted() {
        let issuer = ready_issuer(&["example.com"]);
        let token = issuer
            .issue_at(&alice(), Duration::from_secs(3600), NOW + 30)
            .unwrap();
        assert!(issuer.verify_at(&token, NOW).is_ok());
    }

    #[test]
    fn future_issued_at_beyond_skew_is_rejected() {
        let issuer = ready_issuer(&["example.com"]);
        let token = issuer
            .issue_at(&alice(), Duration::from_secs(3600), NOW + 120)
            .unwrap();
        assert!(matches!(
            issuer.verify_at(&token, NOW),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn tampered_claims_fail_verification() {
        let issuer = ready_issuer(&["example.com"]);
        let token = issuer
            .issue_at(&alice(), Duration::from_secs(3600), NOW)
            .unwrap();

        let mut claims = claims_of(&token);
        claims["sub"] = serde_json::json!("mallory");
        let forged_claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());

        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(matches!(
            issuer.verify_at(&forged, NOW),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn unsigned_token_is_rejected() {
        let issuer = ready_issuer(&["example.com"]);
        let token = issuer
            .issue_at(&alice(), Duration::from_secs(3600), NOW)
            .unwrap();
        let claims_segment = token.split('.').nth(1).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let unsigned = format!("{header}.{claims_segment}.");
        assert!(matches!(
            issuer.verify_at(&unsigned, NOW),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let issuer = ready_issuer(&["example.com"]);
        let other = TokenIssuer::new("sso.example.com", &domains(&["example.com"]));
        other
            .initialize(&SecretString::from("another-secret".to_string()))
            .unwrap();
        let token = other
            .issue_at(&alice(), Duration::from_secs(3600), NOW)
            .unwrap();
        assert!(matches!(
            issuer.verify_at(&token, NOW),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn audience_must_intersect_configured_domains() {
        let wide = ready_issuer(&["example.com", "example.org"]);
        let token = wide
            .issue_at(&alice(), Duration::from_secs(3600), NOW)
            .unwrap();

        let narrowed = ready_issuer(&["example.org"]);
        assert!(narrowed.verify_at(&token, NOW).is_ok());

        let unrelated = ready_issuer(&["example.net"]);
        assert!(matches!(
            unrelated.verify_at(&token, NOW),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let issuer = ready_issuer(&["example.com"]);
        for token in ["", "abc", "a.b.c", "...."] {
            assert!(matches!(
                issuer.verify_at(token, NOW),
                Err(TokenError::Invalid)
            ));
        }
    }
}
