use std::env;
use std::fmt;
use std::fs::File;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use chrono::Duration;

use crate::admission::audit::DEFAULT_AUDIT_LOOKBACK_DAYS;
use crate::admission::capacity::{
    DEFAULT_MAX_ALLOWED_ORG_PENDING_INVITES, DEFAULT_MINIMUM_ORG_SEATS,
};
use crate::admission::github::DEFAULT_GITHUB_API_URL;
use crate::admission::slack::{DEFAULT_SLACK_API_URL, OPERATIONS_ENGINEERING_ALERTS_CHANNEL_ID};
use crate::admission::{
    AdmissionConfig, CapacityThresholds, DomainPolicyTable, PolicyError, RejoinPolicy,
};

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
    pub github: GithubConfig,
    pub slack: SlackConfig,
    pub admission: AdmissionConfig,
    pub policy: DomainPolicyTable,
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

        let github = GithubConfig {
            api_url: env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string()),
            token: optional_var("GITHUB_TOKEN"),
        };

        let slack = SlackConfig {
            api_url: env::var("SLACK_API_URL").unwrap_or_else(|_| DEFAULT_SLACK_API_URL.to_string()),
            token: optional_var("SLACK_BOT_TOKEN"),
            channel: env::var("SLACK_ALERTS_CHANNEL")
                .unwrap_or_else(|_| OPERATIONS_ENGINEERING_ALERTS_CHANNEL_ID.to_string()),
        };

        let rejoin_policy = match optional_var("REJOIN_POLICY") {
            Some(raw) => raw
                .parse::<RejoinPolicy>()
                .map_err(|_| ConfigError::InvalidRejoinPolicy(raw))?,
            None => RejoinPolicy::default(),
        };

        let admission = AdmissionConfig {
            thresholds: CapacityThresholds {
                minimum_org_seats: parse_var("MINIMUM_ORG_SEATS", DEFAULT_MINIMUM_ORG_SEATS)?,
                max_allowed_pending_invites: parse_var(
                    "MAX_ALLOWED_ORG_PENDING_INVITES",
                    DEFAULT_MAX_ALLOWED_ORG_PENDING_INVITES,
                )?,
            },
            audit_lookback: Duration::days(parse_var(
                "AUDIT_LOOKBACK_DAYS",
                DEFAULT_AUDIT_LOOKBACK_DAYS,
            )?),
            send_email_invites: optional_var("SEND_EMAIL_INVITES")
                .map(|raw| is_truthy(&raw))
                .unwrap_or(false),
            rejoin_policy,
        };

        let policy = match optional_var("ORGANISATION_POLICY_FILE") {
            Some(path) => load_policy_file(PathBuf::from(path))?,
            None => DomainPolicyTable::ministry_of_justice(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            github,
            slack,
            admission,
            policy,
        })
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// GitHub REST API access.
#[derive(Clone)]
pub struct GithubConfig {
    pub api_url: String,
    pub token: Option<String>,
}

impl GithubConfig {
    pub fn token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .ok_or(ConfigError::MissingVariable("GITHUB_TOKEN"))
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Slack channel used for manual review requests.
#[derive(Clone)]
pub struct SlackConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub channel: String,
}

impl SlackConfig {
    pub fn token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .ok_or(ConfigError::MissingVariable("SLACK_BOT_TOKEN"))
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("channel", &self.channel)
            .finish()
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable: name, value: raw }),
        None => Ok(default),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn load_policy_file(path: PathBuf) -> Result<DomainPolicyTable, ConfigError> {
    let file = File::open(&path).map_err(|source| ConfigError::PolicyFile {
        path: path.clone(),
        source,
    })?;
    DomainPolicyTable::from_json(file).map_err(|source| ConfigError::Policy { path, source })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    InvalidRejoinPolicy(String),
    MissingVariable(&'static str),
    PolicyFile { path: PathBuf, source: std::io::Error },
    Policy { path: PathBuf, source: PolicyError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a whole number, got '{value}'")
            }
            ConfigError::InvalidRejoinPolicy(value) => write!(
                f,
                "REJOIN_POLICY must be abort-batch or per-organisation, got '{value}'"
            ),
            ConfigError::MissingVariable(name) => write!(f, "{name} must be set"),
            ConfigError::PolicyFile { path, .. } => {
                write!(f, "unable to read organisation policy file {}", path.display())
            }
            ConfigError::Policy { path, source } => {
                write!(f, "organisation policy file {} is invalid: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::PolicyFile { source, .. } => Some(source),
            ConfigError::Policy { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidRejoinPolicy(_)
            | ConfigError::MissingVariable(_) => None,
        }
    }
}
