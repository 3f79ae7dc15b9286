//! Runtime configuration for the sync jobs.
//!
//! All values come from the environment (or a local `.env` loaded by the
//! binary); secrets are never stored in the database.

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// DS API connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DsConfig {
    /// GraphQL endpoint
    pub api_url: String,
    /// Bearer token
    pub api_token: String,
    /// Remote procedure number holding the account-update dossiers
    pub procedure_number: i64,
}

impl DsConfig {
    /// Build and validate a DS configuration.
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        procedure_number: i64,
    ) -> Result<Self> {
        let api_url = normalize_text_option(Some(api_url.into()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                Error::InvalidInput("DS_API_URL must include http:// or https://".to_string())
            })?;
        let api_token = normalize_text_option(Some(api_token.into()))
            .ok_or_else(|| Error::InvalidInput("DS_API_TOKEN must not be empty".to_string()))?;
        if procedure_number <= 0 {
            return Err(Error::InvalidInput(
                "DS_PROCEDURE_NUMBER must be a positive integer".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            api_token,
            procedure_number,
        })
    }

    /// Read the DS configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let api_url = require_env("DS_API_URL")?;
        let api_token = require_env("DS_API_TOKEN")?;
        let procedure_number = require_env("DS_PROCEDURE_NUMBER")?
            .parse::<i64>()
            .map_err(|_| {
                Error::InvalidInput("DS_PROCEDURE_NUMBER must be a positive integer".to_string())
            })?;

        Self::new(api_url, api_token, procedure_number)
    }
}

/// Transactional-email API settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_token: String,
}

impl EmailConfig {
    /// Build and validate an email configuration.
    pub fn new(api_url: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let api_url = normalize_text_option(Some(api_url.into()))
            .filter(|url| is_http_url(url))
            .ok_or_else(|| {
                Error::InvalidInput("EMAIL_API_URL must include http:// or https://".to_string())
            })?;
        let api_token = normalize_text_option(Some(api_token.into()))
            .ok_or_else(|| Error::InvalidInput("EMAIL_API_TOKEN must not be empty".to_string()))?;

        Ok(Self { api_url, api_token })
    }

    /// Read the email configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(require_env("EMAIL_API_URL")?, require_env("EMAIL_API_TOKEN")?)
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::InvalidInput(format!("{name} is not set")))
}
