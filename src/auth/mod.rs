// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Everything needed to turn a username/password pair into a signed
//! identity token, and back.
//!
//! ## Login Flow
//!
//! 1. [`LoginRateLimiter`] admits or rejects the attempt (global, per client
//!    address, per account)
//! 2. A [`CredentialVerifier`] checks the credentials against the directory
//! 3. [`TokenIssuer`] signs an HS256 token carrying the [`Identity`]
//!
//! ## Security
//!
//! - Verification failures are uniform; causes are only logged
//! - Failed verifications take at least a configured minimum time
//! - Token verification never reports why a token was rejected
//! - Clock skew tolerance on `iat` is 60 seconds

pub mod claims;
pub mod directory;
pub mod error;
pub mod ldap;
pub mod rate_limit;
pub mod token;

pub use claims::{Claims, Identity};
#[cfg(feature = "dev")]
pub use directory::DummyVerifier;
pub use directory::{CredentialVerifier, Credentials, DirectoryVerifier};
pub use error::{AuthenticationError, DirectoryError, TokenError};
pub use ldap::LdapConnector;
pub use rate_limit::{Decision, LimiterPruner, LoginRateLimiter, RateLimitTier, TierQuotas};
pub use token::TokenIssuer;
