//! M-Pesa credential and environment resolution
//!
//! All broker credentials come from the process environment. Secrets are
//! required unconditionally; there are no in-code defaults. Configuration is
//! resolved fresh on every load, never cached.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::MpesaError;

const REQUIRED_VARS: &[&str] = &[
    "MPESA_CONSUMER_KEY",
    "MPESA_CONSUMER_SECRET",
    "MPESA_BUSINESS_SHORT_CODE",
    "MPESA_PASSKEY",
    "MPESA_CALLBACK_URL",
];

/// Broker environment selector. The base endpoint is derived from this and
/// is not independently configurable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn base_url(self) -> &'static str {
        match self {
            Environment::Sandbox => "https://sandbox.safaricom.co.ke",
            Environment::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl FromStr for Environment {
    type Err = MpesaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox" => Ok(Environment::Sandbox),
            "production" => Ok(Environment::Production),
            other => Err(MpesaError::Config(format!(
                "MPESA_ENVIRONMENT must be \"sandbox\" or \"production\", got \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => f.write_str("sandbox"),
            Environment::Production => f.write_str("production"),
        }
    }
}

/// Resolved broker credentials for one operation.
#[derive(Clone)]
pub struct MpesaConfig {
    pub environment: Environment,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub business_short_code: String,
    pub passkey: String,
    pub callback_url: String,
}

impl MpesaConfig {
    /// Resolve credentials from the environment, failing on the first
    /// missing or empty required variable.
    pub fn from_env() -> Result<Self, MpesaError> {
        let environment = match env::var("MPESA_ENVIRONMENT") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::Sandbox,
        };

        Ok(Self {
            environment,
            consumer_key: require("MPESA_CONSUMER_KEY")?,
            consumer_secret: require("MPESA_CONSUMER_SECRET")?,
            business_short_code: require("MPESA_BUSINESS_SHORT_CODE")?,
            passkey: require("MPESA_PASSKEY")?,
            callback_url: require("MPESA_CALLBACK_URL")?,
        })
    }

    /// Non-failing completeness check for the health-check surface. Collects
    /// one error entry per missing variable instead of stopping at the first.
    pub fn validate_env() -> SetupValidation {
        let errors: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|name| env::var(name).map(|v| v.trim().is_empty()).unwrap_or(true))
            .map(|name| format!("{name} is required"))
            .collect();

        SetupValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Outcome of [`MpesaConfig::validate_env`].
#[derive(Serialize)]
pub struct SetupValidation {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub errors: Vec<String>,
}

fn require(name: &str) -> Result<String, MpesaError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MpesaError::Config(format!("{name} is required but not set"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_all_vars() {
        env::set_var("MPESA_CONSUMER_KEY", "ck");
        env::set_var("MPESA_CONSUMER_SECRET", "cs");
        env::set_var("MPESA_BUSINESS_SHORT_CODE", "174379");
        env::set_var("MPESA_PASSKEY", "pk");
        env::set_var("MPESA_CALLBACK_URL", "https://example.com/api/mpesa/callback");
    }

    #[test]
    fn validation_reports_each_missing_field() {
        set_all_vars();
        env::remove_var("MPESA_CONSUMER_SECRET");
        env::remove_var("MPESA_PASSKEY");

        let report = MpesaConfig::validate_env();
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors.iter().any(|e| e.contains("MPESA_CONSUMER_SECRET")));
        assert!(report.errors.iter().any(|e| e.contains("MPESA_PASSKEY")));

        set_all_vars();
        let report = MpesaConfig::validate_env();
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn base_url_follows_environment() {
        assert_eq!(
            Environment::Sandbox.base_url(),
            "https://sandbox.safaricom.co.ke"
        );
        assert_eq!(
            Environment::Production.base_url(),
            "https://api.safaricom.co.ke"
        );
    }

    #[test]
    fn environment_parse_rejects_unknown() {
        assert!("sandbox".parse::<Environment>().is_ok());
        assert!("production".parse::<Environment>().is_ok());
        assert!("staging".parse::<Environment>().is_err());
    }
}
