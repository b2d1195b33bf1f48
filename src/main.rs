// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use axum::http::header::InvalidHeaderValue;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
#[cfg(feature = "dev")]
use tracing::warn;

use sso_gateway::api::{cookie::CookiePolicy, page::BasicLoginPage, router};
use sso_gateway::auth::rate_limit::RateLimitConfigError;
use sso_gateway::auth::{
    CredentialVerifier, DirectoryVerifier, LdapConnector, LimiterPruner, LoginRateLimiter,
    TierQuotas, TokenError, TokenIssuer,
};
use sso_gateway::config::{DirectoryConfig, GatewayConfig, LOG_FORMAT_ENV};
use sso_gateway::gate::SessionGate;
use sso_gateway::logging::{self, LogFormat};
use sso_gateway::redirect::RedirectSanitizer;
use sso_gateway::state::AppState;

#[derive(Debug, Error)]
enum StartupError {
    #[error("token signer: {0}")]
    Token(#[from] TokenError),
    #[error("rate limiter: {0}")]
    RateLimit(#[from] RateLimitConfigError),
    #[error("cookie domain is not a valid header value: {0}")]
    CookieDomain(#[from] InvalidHeaderValue),
    #[error("directory settings are missing")]
    MissingDirectory,
    #[error("server I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init(LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref()));

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "SSO gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(mut config: GatewayConfig) -> Result<(), StartupError> {
    let shutdown = CancellationToken::new();

    let issuer = Arc::new(TokenIssuer::new(
        config.hostname.clone(),
        &config.authorized_domains,
    ));
    issuer.initialize(&config.signing_secret)?;
    info!(audience = ?issuer.audience(), "Token signer ready");

    let limiter = Arc::new(LoginRateLimiter::new(TierQuotas::with_global(
        config.global_rate,
        config.global_burst,
    )?));

    let verifier = build_verifier(&mut config)?;

    let sanitizer = RedirectSanitizer::new(config.tld.clone(), config.default_redirect.clone());
    let cookies = CookiePolicy::new(config.tld.clone(), config.secure_cookies)?;
    info!(
        default_redirect = %sanitizer.default_destination(),
        cookie_domain = %cookies.domain(),
        "Session policy configured"
    );

    let gate = SessionGate::new(limiter.clone(), verifier, issuer, sanitizer, shutdown.clone())
        .with_ttls(config.session_ttl, config.remember_ttl);

    let state = AppState::new(
        gate,
        BasicLoginPage::new(config.page_title.clone()),
        cookies,
    )
    .with_trust_forwarded_for(config.trust_forwarded_for);

    tokio::spawn(LimiterPruner::new(limiter).run(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        addr = %listener.local_addr()?,
        hostname = %config.hostname,
        tld = %config.tld,
        domains = ?config.authorized_domains,
        environment = ?config.environment,
        "SSO gateway listening"
    );

    let app = router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    shutdown.cancel();
    info!("SSO gateway stopped");
    Ok(())
}

fn build_verifier(config: &mut GatewayConfig) -> Result<Arc<dyn CredentialVerifier>, StartupError> {
    #[cfg(feature = "dev")]
    if config.dummy_auth {
        warn!("SSO_DUMMY_AUTH is enabled: logins are NOT checked against the directory");
        return Ok(Arc::new(sso_gateway::auth::DummyVerifier::new()));
    }

    let directory = config
        .directory
        .take()
        .ok_or(StartupError::MissingDirectory)?;
    let url = directory.url();
    let DirectoryConfig {
        base_dn,
        bind_dn,
        bind_password,
        timeout,
        ..
    } = directory;

    info!(url = %url, base_dn = %base_dn, "Using directory authentication");

    Ok(Arc::new(
        DirectoryVerifier::new(LdapConnector::new(url, timeout), base_dn, bind_dn, bind_password)
            .with_timeout(timeout)
            .with_failure_floor(config.failure_floor),
    ))
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
