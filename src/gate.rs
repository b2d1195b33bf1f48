// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login/logout orchestration.
//!
//! [`SessionGate`] runs one request through the authentication pipeline:
//!
//! ```text
//! validate -> LoginRateLimiter -> CredentialVerifier -> TokenIssuer -> RedirectSanitizer
//! ```
//!
//! and produces a [`SessionArtifact`]. It knows nothing about HTTP; the
//! `api` module maps artifacts and errors onto responses.

use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::{
    CredentialVerifier, Credentials, Decision, Identity, LoginRateLimiter, TokenIssuer,
};
use crate::config::{DEFAULT_REMEMBER_TTL, DEFAULT_SESSION_TTL};
use crate::error::GatewayError;
use crate::redirect::RedirectSanitizer;

/// How the caller expects the outcome to be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Cookie + redirect, failures re-render the login form.
    Browser,
    /// JSON bearer token, failures as JSON errors.
    Api,
}

impl RequestMode {
    /// Any content type mentioning `application/json` selects [`RequestMode::Api`].
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("application/json") => RequestMode::Api,
            _ => RequestMode::Browser,
        }
    }
}

/// A submitted login.
#[derive(Debug)]
pub struct LoginAttempt {
    pub credentials: Credentials,
    pub remember: bool,
    pub next: Option<String>,
    /// Client address used as the per-address limiter key.
    pub address: String,
    pub mode: RequestMode,
}

/// What a successful login hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionArtifact {
    /// Set the session cookie and redirect.
    Cookie {
        token: String,
        max_age: Duration,
        redirect: String,
    },
    /// Return the token in the response body.
    Bearer { token: String },
}

/// Runs login, session resumption and logout over the limiter, verifier and issuer.
pub struct SessionGate {
    limiter: Arc<LoginRateLimiter>,
    verifier: Arc<dyn CredentialVerifier>,
    issuer: Arc<TokenIssuer>,
    sanitizer: RedirectSanitizer,
    session_ttl: Duration,
    remember_ttl: Duration,
    shutdown: CancellationToken,
}

impl SessionGate {
    pub fn new(
        limiter: Arc<LoginRateLimiter>,
        verifier: Arc<dyn CredentialVerifier>,
        issuer: Arc<TokenIssuer>,
        sanitizer: RedirectSanitizer,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            limiter,
            verifier,
            issuer,
            sanitizer,
            session_ttl: DEFAULT_SESSION_TTL,
            remember_ttl: DEFAULT_REMEMBER_TTL,
            shutdown,
        }
    }

    /// Override the short and "remember me" session lifetimes.
    pub fn with_ttls(mut self, session_ttl: Duration, remember_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self.remember_ttl = remember_ttl;
        self
    }

    pub fn sanitizer(&self) -> &RedirectSanitizer {
        &self.sanitizer
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Authenticate a login attempt and issue a session.
    pub async fn login(&self, attempt: LoginAttempt) -> Result<SessionArtifact, GatewayError> {
        let LoginAttempt {
            credentials,
            remember,
            next,
            address,
            mode,
        } = attempt;

        if credentials.username().trim().is_empty() {
            return Err(GatewayError::validation("username is required"));
        }
        if credentials.password().expose_secret().is_empty() {
            return Err(GatewayError::validation("password is required"));
        }

        let username = credentials.username().to_string();

        if let Decision::Rejected(tier) = self.limiter.admit(&username, &address) {
            warn!(
                username = %username,
                address = %address,
                tier = tier.as_str(),
                "Login attempt rate limited"
            );
            return Err(GatewayError::RateLimited(tier));
        }

        let identity = self
            .verifier
            .verify(credentials, self.shutdown.child_token())
            .await
            .map_err(|e| {
                warn!(username = %username, address = %address, "Login rejected");
                GatewayError::from(e)
            })?;

        let ttl = if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        };
        let token = self.issuer.issue(&identity, ttl).map_err(|e| {
            error!(username = %username, error = %e, "Failed to sign identity token");
            GatewayError::TokenCreation(e)
        })?;

        info!(
            username = %username,
            address = %address,
            remember,
            mode = ?mode,
            "Login succeeded"
        );

        Ok(match mode {
            RequestMode::Browser => SessionArtifact::Cookie {
                token,
                max_age: ttl,
                redirect: self.sanitizer.destination(next.as_deref()),
            },
            RequestMode::Api => SessionArtifact::Bearer { token },
        })
    }

    /// Identity behind an existing session token.
    pub fn authenticated(&self, token: Option<&str>) -> Result<Identity, GatewayError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(GatewayError::TokenVerification)?;
        self.issuer
            .verify(token)
            .map_err(|_| GatewayError::TokenVerification)
    }

    /// Redirect target for a request that already holds a valid session.
    pub fn resume(&self, token: Option<&str>, next: Option<&str>) -> Result<String, GatewayError> {
        let identity = self.authenticated(token)?;
        let destination = self.sanitizer.destination(next);
        info!(username = %identity.username(), "Existing session, redirecting");
        Ok(destination)
    }

    /// Redirect target after logging out.
    pub fn logout(&self, next: Option<&str>) -> String {
        self.sanitizer.destination(next)
    }
}
