//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Development signing secret, refused in production.
const DEV_JWT_SECRET: &str = "redpacket-dev-secret-change-me";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

/// Where verification codes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationMode {
    /// One fixed code accepted for every phone.
    Static { code: String },
    /// Random single-use codes kept in memory and logged.
    Memory,
}

/// A duration together with the text it was configured as (`30m`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredDuration {
    pub label: String,
    pub value: Duration,
}

impl ConfiguredDuration {
    /// Parse `<n>s`, `<n>m`, `<n>h` or `<n>d`. A bare number means seconds.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (digits, unit) = match text.char_indices().last()? {
            (i, c) if c.is_ascii_alphabetic() => (&text[..i], c),
            _ => (text, 's'),
        };
        let amount: u64 = digits.parse().ok()?;
        let multiplier = match unit {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            _ => return None,
        };

        Some(Self {
            label: text.to_string(),
            value: Duration::from_secs(amount.checked_mul(multiplier)?),
        })
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    pub database_pool_size: u32,
    pub environment: Environment,
    /// HS256 signing secret.
    pub jwt_secret: String,
    pub access_ttl: ConfiguredDuration,
    pub refresh_ttl: ConfiguredDuration,
    /// Remaining lifetime under which a fresh access token is handed out.
    pub refresh_threshold: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    pub verification: VerificationMode,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: "sqlite:redpacket.db?mode=rwc".to_string(),
            database_pool_size: 20,
            environment: Environment::Development,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_ttl: ConfiguredDuration {
                label: "30m".to_string(),
                value: Duration::from_secs(30 * 60),
            },
            refresh_ttl: ConfiguredDuration {
                label: "7d".to_string(),
                value: Duration::from_secs(7 * 86_400),
            },
            refresh_threshold: Duration::from_secs(5 * 60),
            rate_limit_window: Duration::from_millis(900_000),
            rate_limit_max_requests: 100,
            verification: VerificationMode::Static {
                code: "123456".to_string(),
            },
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:3001".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `API_ADDR` | Server bind address | `127.0.0.1:3000` |
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:redpacket.db?mode=rwc` |
    /// | `DATABASE_POOL_SIZE` | Connection pool size | `20` |
    /// | `APP_ENV` | `development`, `test` or `production` | `development` |
    /// | `JWT_SECRET` | Token signing secret | dev secret (required in production) |
    /// | `JWT_EXPIRES_IN` | Access token lifetime | `30m` |
    /// | `JWT_REFRESH_EXPIRES_IN` | Refresh token lifetime | `7d` |
    /// | `TOKEN_REFRESH_THRESHOLD` | Sliding refresh threshold | `5m` |
    /// | `RATE_LIMIT_WINDOW_MS` | Rate limit window | `900000` |
    /// | `RATE_LIMIT_MAX_REQUESTS` | Requests per window and IP | `100` |
    /// | `VERIFICATION_MODE` | `static` or `memory` | `static` |
    /// | `VERIFICATION_CODE` | Code accepted in static mode | `123456` |
    /// | `CORS_ORIGINS` | Comma separated origins | `http://localhost:3000,http://localhost:3001` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let addr = match env::var("API_ADDR") {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidAddr)?,
            Err(_) => defaults.addr,
        };

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        let database_pool_size = match env::var("DATABASE_POOL_SIZE") {
            Ok(value) => value
                .parse()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidNumber("DATABASE_POOL_SIZE"))?,
            Err(_) => defaults.database_pool_size,
        };

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            Ok("test") => Environment::Test,
            Ok("development") | Err(_) => Environment::Development,
            Ok(_) => return Err(ConfigError::InvalidEnvironment),
        };

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == Environment::Production => return Err(ConfigError::MissingJwtSecret),
            _ => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                defaults.jwt_secret
            }
        };

        let access_ttl = duration_var("JWT_EXPIRES_IN")?.unwrap_or(defaults.access_ttl);
        let refresh_ttl = duration_var("JWT_REFRESH_EXPIRES_IN")?.unwrap_or(defaults.refresh_ttl);
        let refresh_threshold = duration_var("TOKEN_REFRESH_THRESHOLD")?
            .map(|d| d.value)
            .unwrap_or(defaults.refresh_threshold);

        let rate_limit_window = match env::var("RATE_LIMIT_WINDOW_MS") {
            Ok(value) => value
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or(ConfigError::InvalidNumber("RATE_LIMIT_WINDOW_MS"))?,
            Err(_) => defaults.rate_limit_window,
        };

        let rate_limit_max_requests = match env::var("RATE_LIMIT_MAX_REQUESTS") {
            Ok(value) => value
                .parse()
                .ok()
                .filter(|max| *max > 0)
                .ok_or(ConfigError::InvalidNumber("RATE_LIMIT_MAX_REQUESTS"))?,
            Err(_) => defaults.rate_limit_max_requests,
        };

        let verification = match env::var("VERIFICATION_MODE").as_deref() {
            Ok("memory") => VerificationMode::Memory,
            Ok("static") | Err(_) => VerificationMode::Static {
                code: env::var("VERIFICATION_CODE").unwrap_or_else(|_| "123456".to_string()),
            },
            Ok(_) => return Err(ConfigError::InvalidVerificationMode),
        };

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(value) => value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => defaults.cors_origins,
        };

        Ok(Self {
            addr,
            database_url,
            database_pool_size,
            environment,
            jwt_secret,
            access_ttl,
            refresh_ttl,
            refresh_threshold,
            rate_limit_window,
            rate_limit_max_requests,
            verification,
            cors_origins,
        })
    }
}

fn duration_var(name: &'static str) -> Result<Option<ConfiguredDuration>, ConfigError> {
    match env::var(name) {
        Ok(value) => ConfiguredDuration::parse(&value)
            .filter(|d| !d.value.is_zero())
            .map(Some)
            .ok_or(ConfigError::InvalidDuration(name)),
        Err(_) => Ok(None),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid API_ADDR format")]
    InvalidAddr,

    #[error("APP_ENV must be development, test or production")]
    InvalidEnvironment,

    #[error("JWT_SECRET environment variable is required in production")]
    MissingJwtSecret,

    #[error("{0} must be a duration such as 30m, 12h or 7d")]
    InvalidDuration(&'static str),

    #[error("{0} must be a positive integer")]
    InvalidNumber(&'static str),

    #[error("VERIFICATION_MODE must be static or memory")]
    InvalidVerificationMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_durations() {
        let parsed = ConfiguredDuration::parse("30m").unwrap();
        assert_eq!(parsed.value, Duration::from_secs(1800));
        assert_eq!(parsed.label, "30m");

        assert_eq!(ConfiguredDuration::parse("7d").unwrap().value, Duration::from_secs(604_800));
        assert_eq!(ConfiguredDuration::parse("2h").unwrap().value, Duration::from_secs(7200));
        assert_eq!(ConfiguredDuration::parse("45s").unwrap().value, Duration::from_secs(45));
        assert_eq!(ConfiguredDuration::parse("90").unwrap().value, Duration::from_secs(90));

        assert!(ConfiguredDuration::parse("").is_none());
        assert!(ConfiguredDuration::parse("m").is_none());
        assert!(ConfiguredDuration::parse("5w").is_none());
        assert!(ConfiguredDuration::parse("-5m").is_none());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.access_ttl.label, "30m");
        assert_eq!(config.refresh_threshold, Duration::from_secs(300));
        assert_eq!(config.rate_limit_max_requests, 100);
        assert_eq!(
            config.verification,
            VerificationMode::Static {
                code: "123456".to_string()
            }
        );
    }
}
