// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`GatewayConfig`] loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `SSO_SIGNING_SECRET` | HS256 token signing secret | Required |
//! | `SSO_AUTHORIZED_DOMAINS` | Comma-separated domains placed in the token audience | Required |
//! | `SSO_HOSTNAME` | Canonical hostname of this service (`iss` claim) | Required |
//! | `SSO_TLD` | Cookie domain and redirect scope | Required |
//! | `SSO_SECURE_COOKIES` | Set the `Secure` cookie attribute | `true` |
//! | `SSO_DEFAULT_REDIRECT` | Destination when `next` is absent or rejected | `http://<SSO_TLD>` |
//! | `SSO_SESSION_TTL_SECS` | Session lifetime | `86400` |
//! | `SSO_REMEMBER_TTL_SECS` | "Remember me" session lifetime | `604800` |
//! | `SSO_GLOBAL_RATE` | Global login attempts per second | `10` |
//! | `SSO_GLOBAL_BURST` | Global login burst | `50` |
//! | `SSO_TRUST_FORWARDED_FOR` | Use `X-Forwarded-For` as client address | `false` |
//! | `SSO_DUMMY_AUTH` | Skip the directory (requires the `dev` feature) | `false` |
//! | `SSO_ENVIRONMENT` | `production` or `development` | `production` |
//! | `SSO_PAGE_TITLE` | Login page title | `Sign in` |
//! | `SSO_LDAP_HOST` | Directory host | Required unless dummy auth |
//! | `SSO_LDAP_PORT` | Directory port | `389` |
//! | `SSO_LDAP_BASE_DN` | Search base | Required unless dummy auth |
//! | `SSO_LDAP_BIND_DN` | Service account DN | Required unless dummy auth |
//! | `SSO_LDAP_BIND_PASSWORD` | Service account password | Required unless dummy auth |
//! | `SSO_LDAP_TIMEOUT_SECS` | Directory exchange timeout | `5` |
//! | `SSO_AUTH_FAILURE_FLOOR_MS` | Minimum latency of a failed login | `300` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SIGNING_SECRET_ENV: &str = "SSO_SIGNING_SECRET";
pub const AUTHORIZED_DOMAINS_ENV: &str = "SSO_AUTHORIZED_DOMAINS";
pub const HOSTNAME_ENV: &str = "SSO_HOSTNAME";
pub const TLD_ENV: &str = "SSO_TLD";
pub const SECURE_COOKIES_ENV: &str = "SSO_SECURE_COOKIES";
pub const DEFAULT_REDIRECT_ENV: &str = "SSO_DEFAULT_REDIRECT";
pub const SESSION_TTL_ENV: &str = "SSO_SESSION_TTL_SECS";
pub const REMEMBER_TTL_ENV: &str = "SSO_REMEMBER_TTL_SECS";
pub const GLOBAL_RATE_ENV: &str = "SSO_GLOBAL_RATE";
pub const GLOBAL_BURST_ENV: &str = "SSO_GLOBAL_BURST";
pub const TRUST_FORWARDED_FOR_ENV: &str = "SSO_TRUST_FORWARDED_FOR";
pub const DUMMY_AUTH_ENV: &str = "SSO_DUMMY_AUTH";
pub const ENVIRONMENT_ENV: &str = "SSO_ENVIRONMENT";
pub const PAGE_TITLE_ENV: &str = "SSO_PAGE_TITLE";
pub const LDAP_HOST_ENV: &str = "SSO_LDAP_HOST";
pub const LDAP_PORT_ENV: &str = "SSO_LDAP_PORT";
pub const LDAP_BASE_DN_ENV: &str = "SSO_LDAP_BASE_DN";
pub const LDAP_BIND_DN_ENV: &str = "SSO_LDAP_BIND_DN";
pub const LDAP_BIND_PASSWORD_ENV: &str = "SSO_LDAP_BIND_PASSWORD";
pub const LDAP_TIMEOUT_ENV: &str = "SSO_LDAP_TIMEOUT_SECS";
pub const AUTH_FAILURE_FLOOR_ENV: &str = "SSO_AUTH_FAILURE_FLOOR_MS";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default session lifetime (1 day).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default "remember me" session lifetime (7 days).
pub const DEFAULT_REMEMBER_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GLOBAL_RATE: f64 = 10.0;
const DEFAULT_GLOBAL_BURST: u32 = 50;
const DEFAULT_LDAP_PORT: u16 = 389;
const DEFAULT_LDAP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_FAILURE_FLOOR: Duration = Duration::from_millis(300);
const DEFAULT_PAGE_TITLE: &str = "Sign in";

/// Configuration loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("dummy authentication cannot be enabled in a production environment")]
    DummyAuthInProduction,
    #[error("dummy authentication requires a build with the `dev` feature")]
    DummyAuthUnavailable,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

/// Directory service connection settings.
#[derive(Debug)]
pub struct DirectoryConfig {
    pub host: String,
    pub port: u16,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: SecretString,
    pub timeout: Duration,
}

impl DirectoryConfig {
    /// `ldap://host:port` URL used to dial the directory.
    pub fn url(&self) -> String {
        format!("ldap://{}:{}", self.host, self.port)
    }
}

/// Gateway configuration.
#[derive(Debug)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub signing_secret: SecretString,
    pub authorized_domains: Vec<String>,
    pub hostname: String,
    pub tld: String,
    pub secure_cookies: bool,
    pub default_redirect: String,
    pub session_ttl: Duration,
    pub remember_ttl: Duration,
    pub global_rate: f64,
    pub global_burst: u32,
    pub trust_forwarded_for: bool,
    pub dummy_auth: bool,
    pub environment: Environment,
    pub page_title: String,
    /// Absent only when dummy authentication is enabled.
    pub directory: Option<DirectoryConfig>,
    pub failure_floor: Duration,
}

impl GatewayConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an explicit key/value map.
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let environment = match vars.optional(ENVIRONMENT_ENV) {
            None => Environment::Production,
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                "development" | "dev" => Environment::Development,
                other => {
                    return Err(ConfigError::Invalid {
                        name: ENVIRONMENT_ENV,
                        reason: format!("unknown environment '{other}'"),
                    })
                }
            },
        };

        let dummy_auth = vars.flag(DUMMY_AUTH_ENV, false)?;
        if dummy_auth {
            if environment == Environment::Production {
                return Err(ConfigError::DummyAuthInProduction);
            }
            if !cfg!(feature = "dev") {
                return Err(ConfigError::DummyAuthUnavailable);
            }
        }

        let secret = vars.required(SIGNING_SECRET_ENV)?;
        let authorized_domains: Vec<String> = vars
            .required(AUTHORIZED_DOMAINS_ENV)?
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        if authorized_domains.is_empty() {
            return Err(ConfigError::Invalid {
                name: AUTHORIZED_DOMAINS_ENV,
                reason: "at least one domain is required".to_string(),
            });
        }

        let tld = vars
            .required(TLD_ENV)?
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        if tld.is_empty() {
            return Err(ConfigError::Invalid {
                name: TLD_ENV,
                reason: "must not be empty".to_string(),
            });
        }

        let default_redirect = vars
            .optional(DEFAULT_REDIRECT_ENV)
            .unwrap_or_else(|| format!("http://{tld}"));

        let session_ttl = vars.seconds(SESSION_TTL_ENV, DEFAULT_SESSION_TTL)?;
        let remember_ttl = vars.seconds(REMEMBER_TTL_ENV, DEFAULT_REMEMBER_TTL)?;

        let global_rate: f64 = vars.parsed(GLOBAL_RATE_ENV, DEFAULT_GLOBAL_RATE)?;
        if !(global_rate.is_finite() && global_rate > 0.0) {
            return Err(ConfigError::Invalid {
                name: GLOBAL_RATE_ENV,
                reason: "must be a positive number".to_string(),
            });
        }
        let global_burst: u32 = vars.parsed(GLOBAL_BURST_ENV, DEFAULT_GLOBAL_BURST)?;
        if global_burst == 0 {
            return Err(ConfigError::Invalid {
                name: GLOBAL_BURST_ENV,
                reason: "must be at least 1".to_string(),
            });
        }

        let directory = if dummy_auth {
            None
        } else {
            Some(DirectoryConfig {
                host: vars.required(LDAP_HOST_ENV)?,
                port: vars.parsed(LDAP_PORT_ENV, DEFAULT_LDAP_PORT)?,
                base_dn: vars.required(LDAP_BASE_DN_ENV)?,
                bind_dn: vars.required(LDAP_BIND_DN_ENV)?,
                bind_password: SecretString::from(vars.required(LDAP_BIND_PASSWORD_ENV)?),
                timeout: vars.seconds(LDAP_TIMEOUT_ENV, DEFAULT_LDAP_TIMEOUT)?,
            })
        };

        let failure_floor = match vars.optional(AUTH_FAILURE_FLOOR_ENV) {
            None => DEFAULT_FAILURE_FLOOR,
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid {
                    name: AUTH_FAILURE_FLOOR_ENV,
                    reason: format!("'{raw}' is not a number of milliseconds"),
                }
            })?),
        };

        Ok(Self {
            host: vars
                .optional(HOST_ENV)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: vars.parsed(PORT_ENV, DEFAULT_PORT)?,
            signing_secret: SecretString::from(secret),
            authorized_domains,
            hostname: vars.required(HOSTNAME_ENV)?,
            tld,
            secure_cookies: vars.flag(SECURE_COOKIES_ENV, true)?,
            default_redirect,
            session_ttl,
            remember_ttl,
            global_rate,
            global_burst,
            trust_forwarded_for: vars.flag(TRUST_FORWARDED_FOR_ENV, false)?,
            dummy_auth,
            environment,
            page_title: vars
                .optional(PAGE_TITLE_ENV)
                .unwrap_or_else(|| DEFAULT_PAGE_TITLE.to_string()),
            directory,
            failure_floor,
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T: std::str::FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                reason: format!("cannot parse '{raw}'"),
            }),
        }
    }

    fn seconds(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parsed(name, default.as_secs())?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                name,
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(name) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    name,
                    reason: format!("'{raw}' is not a boolean"),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        [
            (SIGNING_SECRET_ENV, "s3cret"),
            (AUTHORIZED_DOMAINS_ENV, "example.com, App.Example.com"),
            (HOSTNAME_ENV, "sso.example.com"),
            (TLD_ENV, "example.com"),
            (LDAP_HOST_ENV, "ldap.internal"),
            (LDAP_BASE_DN_ENV, "dc=example,dc=com"),
            (LDAP_BIND_DN_ENV, "cn=admin,dc=example,dc=com"),
            (LDAP_BIND_PASSWORD_ENV, "admin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn loads_defaults() {
        let config = GatewayConfig::from_map(&base_vars()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.authorized_domains, vec!["example.com", "app.example.com"]);
        assert_eq!(config.default_redirect, "http://example.com");
        assert_eq!(config.session_ttl, DEFAULT_SESSION_TTL);
        assert_eq!(config.remember_ttl, DEFAULT_REMEMBER_TTL);
        assert!(config.secure_cookies);
        assert!(!config.dummy_auth);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.signing_secret.expose_secret(), "s3cret");

        let directory = config.directory.unwrap();
        assert_eq!(directory.url(), "ldap://ldap.internal:389");
        assert_eq!(directory.timeout, Duration::from_secs(5));
    }

    #[test]
    fn missing_secret_is_reported() {
        let mut vars = base_vars();
        vars.remove(SIGNING_SECRET_ENV);
        assert_eq!(
            GatewayConfig::from_map(&vars).unwrap_err(),
            ConfigError::Missing(SIGNING_SECRET_ENV)
        );
    }

    #[test]
    fn empty_domain_list_is_rejected() {
        let mut vars = base_vars();
        vars.insert(AUTHORIZED_DOMAINS_ENV.to_string(), " , ".to_string());
        assert!(matches!(
            GatewayConfig::from_map(&vars),
            Err(ConfigError::Invalid { name: AUTHORIZED_DOMAINS_ENV, .. })
        ));
    }

    #[test]
    fn tld_leading_dot_is_stripped() {
        let mut vars = base_vars();
        vars.insert(TLD_ENV.to_string(), ".Example.COM".to_string());
        let config = GatewayConfig::from_map(&vars).unwrap();
        assert_eq!(config.tld, "example.com");
    }

    #[test]
    fn dummy_auth_rejected_in_production() {
        let mut vars = base_vars();
        vars.insert(DUMMY_AUTH_ENV.to_string(), "true".to_string());
        assert_eq!(
            GatewayConfig::from_map(&vars).unwrap_err(),
            ConfigError::DummyAuthInProduction
        );
    }

    #[cfg(not(feature = "dev"))]
    #[test]
    fn dummy_auth_requires_dev_feature() {
        let mut vars = base_vars();
        vars.insert(DUMMY_AUTH_ENV.to_string(), "true".to_string());
        vars.insert(ENVIRONMENT_ENV.to_string(), "development".to_string());
        assert_eq!(
            GatewayConfig::from_map(&vars).unwrap_err(),
            ConfigError::DummyAuthUnavailable
        );
    }

    #[cfg(feature = "dev")]
    #[test]
    fn dummy_auth_skips_directory_settings() {
        let mut vars = base_vars();
        vars.retain(|k, _| !k.starts_with("SSO_LDAP_"));
        vars.insert(DUMMY_AUTH_ENV.to_string(), "true".to_string());
        vars.insert(ENVIRONMENT_ENV.to_string(), "development".to_string());
        let config = GatewayConfig::from_map(&vars).unwrap();
        assert!(config.dummy_auth);
        assert!(config.directory.is_none());
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let mut vars = base_vars();
        vars.insert(SECURE_COOKIES_ENV.to_string(), "maybe".to_string());
        assert!(matches!(
            GatewayConfig::from_map(&vars),
            Err(ConfigError::Invalid { name: SECURE_COOKIES_ENV, .. })
        ));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut vars = base_vars();
        vars.insert(SESSION_TTL_ENV.to_string(), "0".to_string());
        assert!(GatewayConfig::from_map(&vars).is_err());
    }

    #[test]
    fn global_rate_must_be_positive() {
        let mut vars = base_vars();
        vars.insert(GLOBAL_RATE_ENV.to_string(), "-1".to_string());
        assert!(matches!(
            GatewayConfig::from_map(&vars),
            Err(ConfigError::Invalid { name: GLOBAL_RATE_ENV, .. })
        ));
    }
}
