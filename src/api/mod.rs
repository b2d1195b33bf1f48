// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

pub mod cookie;
pub mod health;
pub mod login;
pub mod logout;
pub mod page;

/// Build the gateway router with request tracing and request-id propagation.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(login::login_page).post(login::submit_login))
        .route("/logout", get(logout::logout))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
