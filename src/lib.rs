// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SSO Gateway - Directory-backed single sign-on login service
//!
//! Authenticates users against an LDAP directory and hands back a signed,
//! time-bounded identity token, either as a domain-wide cookie with a
//! redirect (browsers) or as a JSON bearer token (programmatic clients).
//!
//! ## Modules
//!
//! - `api` - HTTP handlers (Axum)
//! - `auth` - Rate limiting, credential verification and token signing
//! - `gate` - Login/logout orchestration
//! - `redirect` - Post-login destination validation
//! - `config` - Environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod redirect;
pub mod state;
