// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Post-login destination validation.
//!
//! Only absolute `http`/`https` URLs whose host sits within the configured
//! top-level domain are ever used as a redirect target. Anything else falls
//! back to the default destination.

use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct RedirectSanitizer {
    domain: String,
    default: String,
}

impl RedirectSanitizer {
    /// `domain` is the top-level domain redirects must stay within;
    /// `default` is used whenever a candidate is rejected or absent.
    pub fn new(domain: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            domain: domain.into().trim_start_matches('.').to_ascii_lowercase(),
            default: default.into(),
        }
    }

    /// Target used when no safe `next` is supplied.
    pub fn default_destination(&self) -> &str {
        &self.default
    }

    /// Canonicalized `candidate`, or `None` when it is not a safe target.
    pub fn sanitize(&self, candidate: &str) -> Option<String> {
        let url = Url::parse(candidate.trim()).ok()?;

        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }

        let host = url.host_str()?.to_ascii_lowercase();
        if !self.within_domain(&host) {
            debug!(host = %host, "Rejected redirect outside the cookie domain");
            return None;
        }

        Some(url.to_string())
    }

    /// Sanitized `next`, or the default destination.
    pub fn destination(&self, next: Option<&str>) -> String {
        next.filter(|n| !n.trim().is_empty())
            .and_then(|n| self.sanitize(n))
            .unwrap_or_else(|| self.default.clone())
    }

    fn within_domain(&self, host: &str) -> bool {
        host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}
