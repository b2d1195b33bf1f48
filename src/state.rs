// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::api::cookie::CookiePolicy;
use crate::api::page::LoginPage;
use crate::gate::SessionGate;

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<SessionGate>,
    pub page: Arc<dyn LoginPage>,
    pub cookies: Arc<CookiePolicy>,
    /// Take the client address from `X-Forwarded-For` instead of the peer.
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(gate: SessionGate, page: impl LoginPage + 'static, cookies: CookiePolicy) -> Self {
        Self {
            gate: Arc::new(gate),
            page: Arc::new(page),
            cookies: Arc::new(cookies),
            trust_forwarded_for: false,
        }
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}
