use std::env;

use phonenumber::country;

use crate::{errors::AppError, utils::Credentials, validation::Rules};

const DEFAULT_DATABASE_URL: &str = "sqlite://equipment.db";
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub credentials: Credentials,
    pub rules: Rules,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let optional = |key: &str| match lookup(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(AppError::EnvVarError(e)),
        };
        let required = |key: &str| {
            lookup(key).map_err(|e| {
                log::error!("FATAL: {} environment variable not set", key);
                AppError::EnvVarError(e)
            })
        };

        let port = match optional("PORT")? {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("PORT {raw:?}: {e}")))?,
            None => DEFAULT_PORT,
        };

        let phone_region = match optional("PHONE_REGION")? {
            Some(raw) => raw
                .trim()
                .to_uppercase()
                .parse::<country::Id>()
                .map_err(|_| AppError::Config(format!("PHONE_REGION {raw:?} is not a region code")))?,
            None => Rules::default().phone_region,
        };

        Ok(Config {
            database_url: optional("DATABASE_URL")?
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            bind_address: optional("BIND_ADDRESS")?
                .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned()),
            port,
            credentials: Credentials::new(required("API_USERNAME")?, required("API_PASSWORD")?),
            rules: Rules { phone_region },
        })
    }
}
