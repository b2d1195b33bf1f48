// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Two layers:
//!
//! - [`AuthenticationError`] and [`TokenError::Invalid`] are what callers see.
//!   They never reveal *why* a login or a token was rejected.
//! - [`DirectoryError`] and [`TokenRejection`] carry the underlying cause and
//!   only ever reach the logs.

use thiserror::Error;

/// Uniform credential verification failure.
///
/// Returned for an unreachable directory, an unknown user, an ambiguous
/// match and a wrong password alike, so responses cannot be used to
/// enumerate accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid username or password")]
pub struct AuthenticationError;

/// Underlying cause of a failed directory exchange. Logged, never rendered.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unreachable: {0}")]
    Unavailable(String),
    #[error("service account bind failed: {0}")]
    ServiceBind(String),
    #[error("directory search failed: {0}")]
    Search(String),
    #[error("no directory entry matches the username")]
    UserNotFound,
    #[error("{0} directory entries match the username")]
    AmbiguousUser(usize),
    #[error("user bind rejected")]
    InvalidPassword,
    #[error("directory exchange timed out")]
    Timeout,
    #[error("directory exchange cancelled")]
    Cancelled,
}

impl DirectoryError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            DirectoryError::Unavailable(_) => "unavailable",
            DirectoryError::ServiceBind(_) => "service_bind",
            DirectoryError::Search(_) => "search",
            DirectoryError::UserNotFound => "user_not_found",
            DirectoryError::AmbiguousUser(_) => "ambiguous_user",
            DirectoryError::InvalidPassword => "invalid_password",
            DirectoryError::Timeout => "timeout",
            DirectoryError::Cancelled => "cancelled",
        }
    }
}

/// Token issuance and verification errors.
#[derive(Debug, Error)]
pub enum TokenError {
    /// `issue`/`verify` called before [`TokenIssuer::initialize`](super::TokenIssuer::initialize).
    #[error("token signer has not been initialized")]
    NotInitialized,
    #[error("token signer is already initialized")]
    AlreadyInitialized,
    #[error("token signing secret is empty")]
    EmptySecret,
    #[error("token lifetime must be positive")]
    InvalidLifetime,
    #[error("failed to sign token: {0}")]
    Signing(String),
    /// Uniform verification failure.
    #[error("token is invalid")]
    Invalid,
}

/// Reason a token failed verification. Logged at debug level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    BadSignature,
    IssuedInFuture,
    Expired,
    AudienceMismatch,
}

impl TokenRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRejection::Malformed => "malformed",
            TokenRejection::BadSignature => "bad_signature",
            TokenRejection::IssuedInFuture => "issued_in_future",
            TokenRejection::Expired => "expired",
            TokenRejection::AudienceMismatch => "audience_mismatch",
        }
    }
}
