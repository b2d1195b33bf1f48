// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie handling.

use std::time::Duration;

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "access_token";

/// Attributes shared by every session cookie the gateway sets.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    domain: String,
    secure: bool,
}

impl CookiePolicy {
    /// Fails when `domain` cannot appear in a header value.
    pub fn new(domain: impl Into<String>, secure: bool) -> Result<Self, InvalidHeaderValue> {
        let policy = Self {
            domain: domain.into(),
            secure,
        };
        policy.clear_cookie()?;
        Ok(policy)
    }

    /// `Domain` attribute of every cookie this policy emits.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `Set-Cookie` value carrying `token` for `max_age`.
    pub fn session_cookie(
        &self,
        token: &str,
        max_age: Duration,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Domain={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.domain,
            max_age.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// `Set-Cookie` value that expires the session cookie.
    pub fn clear_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}=; Domain={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; \
             Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.domain
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Session token from the `access_token` cookie, or a bearer token.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_token(headers).or_else(|| bearer_token(headers))
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
