use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow};
use platform_authz::GuardMode;

use crate::auth::AuthConfig;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind: SocketAddr,
    pub auth: AuthConfig,
    pub cors_allowed_origins: Vec<String>,
    /// Applies to read-only dashboard queries; mutations always enforce.
    pub guard_mode: GuardMode,
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL missing")?;

        let bind = lookup("BIND")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse::<SocketAddr>()
            .context("invalid BIND address")?;

        let jwt_secret = lookup("AUTH_SECRET").context("AUTH_SECRET missing")?;
        if jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(anyhow!("AUTH_SECRET must be at least {MIN_SECRET_BYTES} bytes"));
        }
        let token_ttl_minutes = match lookup("TOKEN_TTL_MINUTES") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or_else(|| anyhow!("TOKEN_TTL_MINUTES must be a positive integer"))?,
            None => 60,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        let guard_mode = match lookup("ROLE_GUARD_MODE") {
            Some(raw) => raw.parse::<GuardMode>().map_err(|err| anyhow!(err))?,
            None => GuardMode::default(),
        };

        let otlp_endpoint = lookup("OTLP_ENDPOINT").filter(|value| !value.trim().is_empty());

        Ok(Self {
            database_url,
            bind,
            auth: AuthConfig {
                jwt_secret,
                token_ttl_minutes,
            },
            cors_allowed_origins,
            guard_mode,
            otlp_endpoint,
        })
    }
}
