use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail};
use serde::Deserialize;

/// Signing secret used when none is supplied outside production.
pub const DEV_JWT_SECRET: &str = "change-this-secret";

const DEV_DATABASE_URL: &str = "postgresql://postgres@localhost/fitness-pizza";
const DEV_TEST_DATABASE_URL: &str = "postgresql://postgres@localhost/fitness-pizza-test";

/// Ten years.
pub const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(anyhow!("unknown APP_ENV '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime; `None` issues tokens without an `exp` claim.
    pub ttl_minutes: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub env: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub store_timeout_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let env = match var("APP_ENV") {
            Some(v) => v.parse()?,
            None => Environment::Development,
        };

        let database_url = match env {
            Environment::Test => {
                var("TEST_DATABASE_URL").unwrap_or_else(|| DEV_TEST_DATABASE_URL.into())
            }
            Environment::Development => {
                var("DATABASE_URL").unwrap_or_else(|| DEV_DATABASE_URL.into())
            }
            Environment::Production => var("DATABASE_URL")
                .ok_or_else(|| anyhow!("DATABASE_URL must be set in production"))?,
        };

        let secret = match (env, var("JWT_SECRET")) {
            (Environment::Production, None) => bail!("JWT_SECRET must be set in production"),
            (Environment::Production, Some(s)) if s == DEV_JWT_SECRET => {
                bail!("JWT_SECRET must not use the development default in production")
            }
            (_, Some(s)) => s,
            (_, None) => DEV_JWT_SECRET.into(),
        };

        let ttl_minutes = var("JWT_TTL_MINUTES")
            .map(|v| v.parse::<i64>())
            .transpose()
            .map_err(|e| anyhow!("invalid JWT_TTL_MINUTES: {e}"))?
            .filter(|m| *m > 0);
        if let Some(m) = ttl_minutes.filter(|m| *m > MAX_JWT_TTL_MINUTES) {
            bail!("JWT_TTL_MINUTES {m} exceeds the maximum of {MAX_JWT_TTL_MINUTES}");
        }

        let port = var("PORT")
            .map(|v| v.parse::<u16>())
            .transpose()
            .map_err(|e| anyhow!("invalid PORT: {e}"))?
            .unwrap_or(8000);

        let store_timeout_ms = var("STORE_TIMEOUT_MS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("invalid STORE_TIMEOUT_MS: {e}"))?
            .unwrap_or(5000);
        if store_timeout_ms == 0 {
            bail!("STORE_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            env,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url,
            jwt: JwtConfig {
                secret,
                ttl_minutes,
            },
            store_timeout_ms,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
