use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::Duration;
use uuid::Uuid;

use pairchat_auth::hash_password;
use pairchat_store::models::UserRow;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key",
];

pub struct SeedUser {
    pub username: String,
    pub password: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub users: [SeedUser; 2],
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("PAIRCHAT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("PAIRCHAT_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let port: u16 = var("PAIRCHAT_PORT", "3000")
            .parse()
            .context("PAIRCHAT_PORT must be a port number")?;
        let ttl_hours: i64 = var("PAIRCHAT_TOKEN_TTL_HOURS", "24")
            .parse()
            .context("PAIRCHAT_TOKEN_TTL_HOURS must be a whole number of hours")?;
        if ttl_hours <= 0 {
            bail!("PAIRCHAT_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            host: var("PAIRCHAT_HOST", "0.0.0.0"),
            port,
            jwt_secret,
            token_ttl: Duration::hours(ttl_hours),
            users: [
                SeedUser {
                    username: var("PAIRCHAT_USER1_NAME", "user1"),
                    password: var("PAIRCHAT_USER1_PASSWORD", "password123"),
                },
                SeedUser {
                    username: var("PAIRCHAT_USER2_NAME", "user2"),
                    password: var("PAIRCHAT_USER2_PASSWORD", "password456"),
                },
            ],
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// Hash the configured passwords into store rows with fresh ids.
    pub fn seed_users(&self) -> anyhow::Result<Vec<UserRow>> {
        self.users
            .iter()
            .map(|seed| -> anyhow::Result<UserRow> {
                let hash = hash_password(&seed.password)?;
                Ok(UserRow::new(Uuid::new_v4(), seed.username.clone(), hash))
            })
            .collect()
    }
}

/// A `.env` file that exists but could not be loaded. A missing file is the
/// normal case and is not reported.
pub fn dotenv_problem(result: &dotenvy::Result<PathBuf>) -> Option<&dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}
