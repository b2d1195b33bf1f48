// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity token claims and the verified identity they carry.

use serde::{Deserialize, Serialize};

/// Identity attributes confirmed by the directory.
///
/// Produced by a [`CredentialVerifier`](super::CredentialVerifier) and
/// embedded into the token claims. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    username: String,
    display_name: String,
    group: String,
}

impl Identity {
    pub fn new(
        username: impl Into<String>,
        display_name: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            display_name: display_name.into(),
            group: group.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

/// Claims carried by an issued identity token.
///
/// Standard registered claims plus the identity extension fields
/// (`full_name`, `group`) consumed by downstream applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (canonical hostname of the gateway)
    pub iss: String,

    /// Subject (username)
    pub sub: String,

    /// Audience (`http://` and `https://` origin of every authorized domain)
    pub aud: Vec<String>,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// Display name from the directory
    #[serde(default)]
    pub full_name: String,

    /// Group from the directory
    #[serde(default)]
    pub group: String,
}

impl Claims {
    /// Build claims for `identity`, valid from `issued_at` for `ttl_secs`.
    pub fn new(
        identity: &Identity,
        issuer: &str,
        audience: Vec<String>,
        issued_at: i64,
        ttl_secs: i64,
    ) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: identity.username.clone(),
            aud: audience,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
            full_name: identity.display_name.clone(),
            group: identity.group.clone(),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::new(&self.sub, &self.full_name, &self.group)
    }
}

/// Derive the token audience from the authorized domain list.
///
/// Each domain contributes its `http://` origin followed by its `https://`
/// origin, preserving configuration order.
pub fn audience_for(domains: &[String]) -> Vec<String> {
    domains
        .iter()
        .flat_map(|domain| [format!("http://{domain}"), format!("https://{domain}")])
        .collect()
}
