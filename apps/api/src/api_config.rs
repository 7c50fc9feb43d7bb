use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use marketgate_core::AppError;
use marketgate_domain::VendorEvidence;
use tracing_subscriber::EnvFilter;

/// Destination of user notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationProviderConfig {
    Console,
    Postgres,
}

impl NotificationProviderConfig {
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim() {
            "console" => Ok(Self::Console),
            "postgres" => Ok(Self::Postgres),
            other => Err(AppError::Validation(format!(
                "NOTIFICATION_PROVIDER must be either 'console' or 'postgres', got '{other}'"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub bootstrap_token: String,
    pub api_host: String,
    pub api_port: u16,
    pub cookie_secure: bool,
    pub document_storage_dir: PathBuf,
    pub vendor_evidence: VendorEvidence,
    pub notification_provider: NotificationProviderConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let bootstrap_token = required_non_empty_env("AUTH_BOOTSTRAP_TOKEN")?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        let document_storage_dir = env::var("DOCUMENT_STORAGE_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| PathBuf::from("./data/documents"), PathBuf::from);

        let vendor_evidence = env::var("VENDOR_REQUIRED_DOCUMENTS")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| VendorEvidence::parse(value.as_str()))
            .transpose()?
            .unwrap_or_default();

        let notification_provider = NotificationProviderConfig::parse(
            env::var("NOTIFICATION_PROVIDER")
                .unwrap_or_else(|_| "console".to_owned())
                .as_str(),
        )?;

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            bootstrap_token,
            api_host,
            api_port,
            cookie_secure,
            document_storage_dir,
            vendor_evidence,
            notification_provider,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}
