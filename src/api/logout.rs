// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    http::header::SET_COOKIE,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info};

use super::login::NextQuery;
use crate::state::AppState;

/// `GET /logout`: expire the session cookie and redirect.
///
/// No credential check and no rate limiting.
pub async fn logout(State(state): State<AppState>, Query(query): Query<NextQuery>) -> Response {
    let destination = state.gate.logout(query.next.as_deref());
    info!(destination = %destination, "Logout");

    match state.cookies.clear_cookie() {
        Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to(&destination)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to build logout cookie");
            Redirect::to(&destination).into_response()
        }
    }
}
