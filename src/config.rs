use chrono::{Duration, Utc};
use dotenv::dotenv;
use std::env;

use crate::errors::*;

const DEFAULT_DATABASE_URL: &str = "blog.sqlite3";
const DEFAULT_TOKEN_LIFETIME: i64 = 24 * 60 * 60;
const DEFAULT_POOL_SIZE: u32 = 10;

/// Application settings, managed as Rocket state.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    /// Default page size for paginated lists. `None` leaves lists unpaginated
    /// unless the client asks for a `limit`.
    pub page_size: Option<i64>,
    pub pool_size: u32,
}

impl Config {
    pub fn new<U: Into<String>, K: Into<String>>(database_url: U, secret_key: K) -> Self {
        Config {
            database_url: database_url.into(),
            secret_key: secret_key.into(),
            access_token_lifetime: Duration::seconds(DEFAULT_TOKEN_LIFETIME),
            refresh_token_lifetime: Duration::seconds(DEFAULT_TOKEN_LIFETIME),
            page_size: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let secret_key = env::var("SECRET_KEY").chain_err(|| "SECRET_KEY must be set")?;

        let mut config = Config::new(database_url, secret_key);
        if let Some(seconds) = optional_var::<i64>("ACCESS_TOKEN_LIFETIME")? {
            config.access_token_lifetime = token_lifetime("ACCESS_TOKEN_LIFETIME", seconds)?;
        }
        if let Some(seconds) = optional_var::<i64>("REFRESH_TOKEN_LIFETIME")? {
            config.refresh_token_lifetime = token_lifetime("REFRESH_TOKEN_LIFETIME", seconds)?;
        }
        config.page_size = optional_var::<i64>("PAGE_SIZE")?.filter(|size| *size > 0);
        if let Some(size) = optional_var::<u32>("DATABASE_POOL_SIZE")? {
            config.pool_size = size.max(1);
        }
        Ok(config)
    }
}

/// A lifetime has to be positive and keep `now + lifetime` a valid timestamp.
fn token_lifetime(key: &str, seconds: i64) -> Result<Duration> {
    Duration::try_seconds(seconds)
        .filter(|lifetime| *lifetime > Duration::zero())
        .filter(|lifetime| Utc::now().checked_add_signed(*lifetime).is_some())
        .ok_or_else(|| format!("{} is out of range: {}", key, seconds).into())
}

fn optional_var<T>(key: &str) -> Result<Option<T>>
where
    T: ::std::str::FromStr<Err = ::std::num::ParseIntError>,
{
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .chain_err(|| format!("{} must be an integer", key))?;
            Ok(Some(parsed))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_defaults() {
        let config = Config::new("test.sqlite3", "secret");
        assert_eq!(config.database_url, "test.sqlite3");
        assert_eq!(config.access_token_lifetime, Duration::days(1));
        assert_eq!(config.refresh_token_lifetime, Duration::days(1));
        assert_eq!(config.page_size, None);
        assert_eq!(config.pool_size, 10);
    }

    #[test]
    fn token_lifetime_must_be_representable() {
        assert_eq!(
            token_lifetime("ACCESS_TOKEN_LIFETIME", 300).unwrap(),
            Duration::minutes(5)
        );
        assert!(token_lifetime("ACCESS_TOKEN_LIFETIME", 0).is_err());
        assert!(token_lifetime("ACCESS_TOKEN_LIFETIME", -60).is_err());
        assert!(token_lifetime("ACCESS_TOKEN_LIFETIME", i64::MAX).is_err());
        // Fits in a `Duration` but not on top of the current time.
        assert!(token_lifetime("REFRESH_TOKEN_LIFETIME", 9_000_000_000_000).is_err());
    }
}
