use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::certificates::domain::CertificateType;

const DEVELOPMENT_SIGNING_KEY: &str = "revenue-certs-development-signing-key";
const DEFAULT_NUMBER_PREFIX: &str = "CERT";
const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 2_000;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub issuance: IssuanceConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            issuance: IssuanceConfig::from_env(environment)?,
            notifications: NotificationConfig::from_env()?,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
            issuance: IssuanceConfig::development(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Department key material and numbering rules for issued certificates.
#[derive(Clone)]
pub struct IssuanceConfig {
    pub signing_key: String,
    pub number_prefix: String,
    pub validity_days: BTreeMap<CertificateType, u32>,
}

impl IssuanceConfig {
    fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let signing_key = match env::var("CERT_SIGNING_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingSigningKey)
            }
            _ => DEVELOPMENT_SIGNING_KEY.to_string(),
        };

        let number_prefix =
            env::var("CERT_NUMBER_PREFIX").unwrap_or_else(|_| DEFAULT_NUMBER_PREFIX.to_string());
        if !is_valid_prefix(&number_prefix) {
            return Err(ConfigError::InvalidNumberPrefix(number_prefix));
        }

        let mut validity_days = BTreeMap::new();
        for certificate_type in CertificateType::ALL {
            let variable = format!(
                "CERT_{}_VALIDITY_DAYS",
                certificate_type.label().to_ascii_uppercase()
            );
            if let Ok(raw) = env::var(&variable) {
                let days = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|days| *days > 0)
                    .ok_or(ConfigError::InvalidValidityDays {
                        variable,
                        value: raw,
                    })?;
                validity_days.insert(certificate_type, days);
            }
        }

        Ok(Self {
            signing_key,
            number_prefix,
            validity_days,
        })
    }

    /// Development defaults: built-in key, `CERT` prefix, perpetual certificates.
    pub fn development() -> Self {
        Self {
            signing_key: DEVELOPMENT_SIGNING_KEY.to_string(),
            number_prefix: DEFAULT_NUMBER_PREFIX.to_string(),
            validity_days: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for IssuanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuanceConfig")
            .field("signing_key", &"<redacted>")
            .field("number_prefix", &self.number_prefix)
            .field("validity_days", &self.validity_days)
            .finish()
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty() && prefix.chars().all(|ch| ch.is_ascii_uppercase())
}

/// Outbound notification transport settings.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

impl NotificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_url = env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let timeout_ms = match env::var("NOTIFY_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidNotifyTimeout)?,
            Err(_) => DEFAULT_NOTIFY_TIMEOUT_MS,
        };

        Ok(Self {
            webhook_url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_millis(DEFAULT_NOTIFY_TIMEOUT_MS),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingSigningKey,
    InvalidNumberPrefix(String),
    InvalidValidityDays { variable: String, value: String },
    InvalidNotifyTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingSigningKey => {
                write!(f, "CERT_SIGNING_KEY must be set in production")
            }
            ConfigError::InvalidNumberPrefix(prefix) => write!(
                f,
                "CERT_NUMBER_PREFIX must be uppercase ASCII letters (found '{prefix}')"
            ),
            ConfigError::InvalidValidityDays { variable, value } => {
                write!(f, "{variable} must be a positive day count (found '{value}')")
            }
            ConfigError::InvalidNotifyTimeout => {
                write!(f, "NOTIFY_TIMEOUT_MS must be a positive millisecond count")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
