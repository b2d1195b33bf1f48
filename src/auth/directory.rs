// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential verification against a directory service.
//!
//! ## Protocol
//!
//! 1. Bind with the service account
//! 2. Search the base DN (whole subtree) for `(uid=<escaped username>)`
//! 3. Require exactly one matching entry
//! 4. Bind as that entry's DN with the supplied password
//!
//! Any failure along the way (including an unreachable directory, a timeout
//! or cancellation) is reported to callers as the same
//! [`AuthenticationError`] after the same minimum delay. The concrete cause
//! is only logged.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::ldap_escape;
use secrecy::{ExposeSecret, SecretString};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::claims::Identity;
use super::error::{AuthenticationError, DirectoryError};

/// Attribute holding the login name.
pub const UID_ATTR: &str = "uid";
/// Attribute holding the display name.
pub const DISPLAY_NAME_ATTR: &str = "cn";
/// Attribute holding the group.
pub const GROUP_ATTR: &str = "ou";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Username/password pair submitted by a login attempt.
///
/// Consumed by [`CredentialVerifier::verify`]; the password is never logged.
#[derive(Debug)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// Checks credentials and returns the verified identity.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify `credentials`, giving up when `cancel` fires.
    async fn verify(
        &self,
        credentials: Credentials,
        cancel: CancellationToken,
    ) -> Result<Identity, AuthenticationError>;
}

/// One entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of `attr`, if any.
    pub fn first(&self, attr: &str) -> Option<&str> {
        self.attrs
            .get(attr)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// Opens sessions to a directory service.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// An open directory connection.
#[async_trait]
pub trait DirectorySession: Send {
    /// Simple bind. Rejected credentials are [`DirectoryError::InvalidPassword`].
    async fn bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Subtree search under `base` returning `attrs` of every match.
    async fn search(
        &mut self,
        base: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Release the connection (unbind).
    async fn close(&mut self);
}

/// [`CredentialVerifier`] implementing the search-then-bind protocol.
pub struct DirectoryVerifier<C> {
    connector: C,
    base_dn: String,
    bind_dn: String,
    bind_password: SecretString,
    timeout: Duration,
    failure_floor: Duration,
}

impl<C: DirectoryConnector> DirectoryVerifier<C> {
    pub fn new(
        connector: C,
        base_dn: impl Into<String>,
        bind_dn: impl Into<String>,
        bind_password: SecretString,
    ) -> Self {
        Self {
            connector,
            base_dn: base_dn.into(),
            bind_dn: bind_dn.into(),
            bind_password,
            timeout: DEFAULT_TIMEOUT,
            failure_floor: Duration::ZERO,
        }
    }

    /// Upper bound for the whole directory exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Minimum time a failed verification takes, measured from the call.
    pub fn with_failure_floor(mut self, floor: Duration) -> Self {
        self.failure_floor = floor;
        self
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, DirectoryError> {
        // An empty password would turn the user bind into an anonymous bind.
        if credentials.password().expose_secret().is_empty() {
            return Err(DirectoryError::InvalidPassword);
        }

        let mut session = self.connector.connect().await?;
        let result = self.exchange(session.as_mut(), credentials).await;
        session.close().await;
        result
    }

    async fn exchange(
        &self,
        session: &mut dyn DirectorySession,
        credentials: &Credentials,
    ) -> Result<Identity, DirectoryError> {
        session
            .bind(&self.bind_dn, self.bind_password.expose_secret())
            .await
            .map_err(|e| DirectoryError::ServiceBind(e.to_string()))?;

        let filter = format!("({UID_ATTR}={})", ldap_escape(credentials.username()));
        let entries = session
            .search(&self.base_dn, &filter, &[DISPLAY_NAME_ATTR, GROUP_ATTR])
            .await?;

        let entry = match entries.as_slice() {
            [entry] => entry,
            [] => return Err(DirectoryError::UserNotFound),
            many => return Err(DirectoryError::AmbiguousUser(many.len())),
        };

        session
            .bind(&entry.dn, credentials.password().expose_secret())
            .await
            .map_err(|e| match e {
                DirectoryError::Unavailable(_) | DirectoryError::Timeout => e,
                _ => DirectoryError::InvalidPassword,
            })?;

        Ok(Identity::new(
            credentials.username(),
            entry.first(DISPLAY_NAME_ATTR).unwrap_or_default(),
            entry.first(GROUP_ATTR).unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl<C: DirectoryConnector> CredentialVerifier for DirectoryVerifier<C> {
    async fn verify(
        &self,
        credentials: Credentials,
        cancel: CancellationToken,
    ) -> Result<Identity, AuthenticationError> {
        let started = Instant::now();

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(DirectoryError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.authenticate(&credentials)) => {
                result.unwrap_or_else(|_| Err(DirectoryError::Timeout))
            }
        };

        match outcome {
            Ok(identity) => {
                info!(username = %identity.username(), "Directory authentication succeeded");
                Ok(identity)
            }
            Err(e) => {
                warn!(
                    username = %credentials.username(),
                    cause = e.kind(),
                    error = %e,
                    "Directory authentication failed"
                );
                tokio::time::sleep_until(started + self.failure_floor).await;
                Err(AuthenticationError)
            }
        }
    }
}

/// Verifier that skips the directory and trusts any username.
///
/// WARNING: Development only. Compiled solely with the `dev` feature and
/// refused by configuration in production environments.
#[cfg(feature = "dev")]
pub struct DummyVerifier {
    _private: (),
}

#[cfg(feature = "dev")]
impl DummyVerifier {
    pub fn new() -> Self {
        warn!("DIRECTORY AUTHENTICATION IS BYPASSED: every username/password pair will be accepted");
        Self { _private: () }
    }
}

#[cfg(feature = "dev")]
impl Default for DummyVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "dev")]
#[async_trait]
impl CredentialVerifier for DummyVerifier {
    async fn verify(
        &self,
        credentials: Credentials,
        _cancel: CancellationToken,
    ) -> Result<Identity, AuthenticationError> {
        warn!(username = %credentials.username(), "Accepting login without directory check");
        Ok(Identity::new(credentials.username(), "unknown", "unknown"))
    }
}
