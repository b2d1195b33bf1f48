// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-level error taxonomy.
//!
//! Every failure a login or logout request can end in. The rendered message
//! never carries internal detail: directory causes and signing failures are
//! logged where they happen.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthenticationError, RateLimitTier, TokenError};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or incomplete request
    #[error("{0}")]
    Validation(String),

    /// An admission tier is exhausted
    #[error("{}", rate_limit_message(.0))]
    RateLimited(RateLimitTier),

    /// Credentials were not accepted (cause intentionally hidden)
    #[error("invalid username or password")]
    Authentication,

    /// Signing failed
    #[error("internal server error")]
    TokenCreation(#[source] TokenError),

    /// Presented token is not valid
    #[error("session token is invalid or expired")]
    TokenVerification,
}

fn rate_limit_message(tier: &RateLimitTier) -> &'static str {
    match tier {
        RateLimitTier::Global => "service is busy, please try again shortly",
        RateLimitTier::Address | RateLimitTier::Account => {
            "too many login attempts, please try again later"
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "invalid_request",
            GatewayError::RateLimited(RateLimitTier::Global) => "rate_limited_global",
            GatewayError::RateLimited(RateLimitTier::Address) => "rate_limited_address",
            GatewayError::RateLimited(RateLimitTier::Account) => "rate_limited_account",
            GatewayError::Authentication => "authentication_failed",
            GatewayError::TokenCreation(_) => "internal_error",
            GatewayError::TokenVerification => "invalid_token",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited(RateLimitTier::Global) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Authentication | GatewayError::TokenVerification => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::TokenCreation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthenticationError> for GatewayError {
    fn from(_: AuthenticationError) -> Self {
        GatewayError::Authentication
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code(),
        });
        (status, body).into_response()
    }
}
