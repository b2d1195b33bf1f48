// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login form and login submission handlers.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request, State},
    http::{header::CONTENT_TYPE, header::SET_COOKIE, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::cookie::session_token;
use super::page::{self, LoginView};
use crate::auth::Credentials;
use crate::error::GatewayError;
use crate::gate::{LoginAttempt, RequestMode, SessionArtifact};
use crate::state::AppState;

/// `?next=` destination accepted by the login and logout pages.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// JSON body returned by a successful API login.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(rename = "type")]
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct FormBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    remember: Option<String>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct JsonBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    remember: bool,
    #[serde(default)]
    next: Option<String>,
}

/// A login submission, parsed as JSON or as a form depending on `Content-Type`.
pub struct LoginSubmission {
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub remember: bool,
    pub next: Option<String>,
}

/// Unparseable login submission. Keeps the mode so the failure can be
/// rendered the way the caller expects.
pub struct LoginRejection {
    pub mode: RequestMode,
    pub error: GatewayError,
}

impl IntoResponse for LoginRejection {
    fn into_response(self) -> Response {
        self.error.into_response()
    }
}

fn form_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("on" | "true" | "1")
    )
}

impl<S> FromRequest<S> for LoginSubmission
where
    S: Send + Sync,
{
    type Rejection = LoginRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mode = RequestMode::from_content_type(
            req.headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
        );

        match mode {
            RequestMode::Api => {
                let Json(body) = Json::<JsonBody>::from_request(req, state)
                    .await
                    .map_err(|e| LoginRejection {
                        mode,
                        error: GatewayError::validation(e.body_text()),
                    })?;
                Ok(Self {
                    mode,
                    credentials: Credentials::new(body.username, body.password),
                    remember: body.remember,
                    next: body.next,
                })
            }
            RequestMode::Browser => {
                let Form(body) = Form::<FormBody>::from_request(req, state)
                    .await
                    .map_err(|e| LoginRejection {
                        mode,
                        error: GatewayError::validation(e.body_text()),
                    })?;
                Ok(Self {
                    mode,
                    remember: form_flag(body.remember.as_deref()),
                    credentials: Credentials::new(body.username, body.password),
                    next: body.next,
                })
            }
        }
    }
}

/// Address used as the per-address rate limiter key.
pub struct ClientAddress(pub String);

impl FromRequestParts<AppState> for ClientAddress {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientAddress(client_address(
            &parts.headers,
            peer,
            state.trust_forwarded_for,
        )))
    }
}

/// First `X-Forwarded-For` entry when trusted, else the peer IP, else `unknown`.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn failure(
    state: &AppState,
    mode: RequestMode,
    error: GatewayError,
    username: Option<String>,
    next: Option<String>,
) -> Response {
    match mode {
        RequestMode::Api => error.into_response(),
        RequestMode::Browser => {
            let view = LoginView {
                error: Some(error.to_string()),
                username,
                next,
            };
            page::render(state.page.as_ref(), error.status_code(), &view)
        }
    }
}

/// `GET /`: redirect when a valid session exists, otherwise show the form.
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    headers: HeaderMap,
) -> Response {
    let token = session_token(&headers);
    match state.gate.resume(token.as_deref(), query.next.as_deref()) {
        Ok(destination) => Redirect::to(&destination).into_response(),
        Err(_) => {
            let view = LoginView {
                next: query.next,
                ..LoginView::default()
            };
            page::render(state.page.as_ref(), StatusCode::OK, &view)
        }
    }
}

/// `POST /`: authenticate and hand out a session.
pub async fn submit_login(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    ClientAddress(address): ClientAddress,
    submission: Result<LoginSubmission, LoginRejection>,
) -> Response {
    let submission = match submission {
        Ok(submission) => submission,
        Err(rejection) => {
            return failure(&state, rejection.mode, rejection.error, None, query.next)
        }
    };

    let mode = submission.mode;
    let next = submission.next.or(query.next);
    let username = submission.credentials.username().to_string();

    let attempt = LoginAttempt {
        credentials: submission.credentials,
        remember: submission.remember,
        next: next.clone(),
        address,
        mode,
    };

    match state.gate.login(attempt).await {
        Ok(SessionArtifact::Cookie {
            token,
            max_age,
            redirect,
        }) => match state.cookies.session_cookie(&token, max_age) {
            Ok(cookie) => ([(SET_COOKIE, cookie)], Redirect::to(&redirect)).into_response(),
            Err(e) => {
                error!(error = %e, "Failed to build session cookie");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Ok(SessionArtifact::Bearer { token }) => Json(TokenResponse::bearer(token)).into_response(),
        Err(e) => failure(&state, mode, e, Some(username), next),
    }
}
