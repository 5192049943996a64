use std::env;

use crate::auth::{AdminCredentials, PasswordSecret, TokenSettings};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MAIL_BRAND: &str = "Inquiry Desk";

/// Everything the service reads from its environment at startup.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub port: u16,
    pub admin: AdminCredentials,
    pub token: TokenSettings,
    pub mail: Option<MailSettings>,
    /// Comma-separated origins allowed by CORS. Any origin when unset.
    pub cors_allowed_origins: Option<String>,
}

/// HTTP mail relay used for inquiry notifications.
#[derive(Clone, Debug)]
pub struct MailSettings {
    pub relay_url: String,
    pub relay_token: Option<String>,
    pub from_address: String,
    pub admin_address: String,
    /// Sender display name and sign-off used in notification emails.
    pub brand: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} env var is missing")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database_url = read("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match read("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let max_connections = match read("DATABASE_MAX_CONNECTIONS") {
            Some(value) => match value.parse::<u32>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "DATABASE_MAX_CONNECTIONS",
                        value,
                    });
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let username =
            read("ADMIN_USERNAME").unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());

        let password = if let Some(hash) = read("ADMIN_PASSWORD_HASH") {
            PasswordSecret::Argon2(hash)
        } else if let Some(plain) = lookup("ADMIN_PASSWORD").filter(|value| !value.is_empty()) {
            PasswordSecret::Plain(plain)
        } else {
            return Err(ConfigError::Missing("ADMIN_PASSWORD"));
        };

        let secret = read("ADMIN_JWT_SECRET").ok_or(ConfigError::Missing("ADMIN_JWT_SECRET"))?;

        let mail = match (read("MAIL_RELAY_URL"), read("ADMIN_EMAIL")) {
            (Some(relay_url), Some(admin_address)) => Some(MailSettings {
                relay_url,
                relay_token: read("MAIL_RELAY_TOKEN"),
                from_address: read("MAIL_FROM").unwrap_or_else(|| admin_address.clone()),
                admin_address,
                brand: read("MAIL_BRAND").unwrap_or_else(|| DEFAULT_MAIL_BRAND.to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            max_connections,
            port,
            admin: AdminCredentials::new(username, password),
            token: TokenSettings::new(secret.into_bytes()),
            mail,
            cors_allowed_origins: read("CORS_ALLOWED_ORIGINS"),
        })
    }
}
