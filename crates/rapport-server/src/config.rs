use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Duration;
use tracing::warn;

use rapport_core::tokens::DEFAULT_TTL_HOURS;

const DEV_SECRET: &str = "dev-secret-change-me";

/// Server settings, read from `RAPPORT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub token_secret: String,
    pub token_ttl: Duration,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Base URL photos are served from, e.g. `http://localhost:3000/uploads`.
    pub public_url: String,
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token_secret = env::var("RAPPORT_TOKEN_SECRET").unwrap_or_else(|_| {
            warn!("RAPPORT_TOKEN_SECRET not set, using the development secret");
            DEV_SECRET.into()
        });

        let ttl_hours: i64 = match env::var("RAPPORT_TOKEN_TTL_HOURS") {
            Ok(v) => v.parse().context("RAPPORT_TOKEN_TTL_HOURS must be an integer")?,
            Err(_) => DEFAULT_TTL_HOURS,
        };
        if ttl_hours <= 0 {
            bail!("RAPPORT_TOKEN_TTL_HOURS must be positive");
        }

        let db_path = env::var("RAPPORT_DB_PATH").unwrap_or_else(|_| "rapport.db".into());
        let host = env::var("RAPPORT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("RAPPORT_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("RAPPORT_PORT must be a port number")?;
        let upload_dir = env::var("RAPPORT_UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
        let public_url = env::var("RAPPORT_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/uploads", port));

        let admin = match (
            env::var("RAPPORT_ADMIN_USERNAME"),
            env::var("RAPPORT_ADMIN_PASSWORD"),
        ) {
            (Ok(user), Ok(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        };

        Ok(Self {
            token_secret,
            token_ttl: Duration::hours(ttl_hours),
            db_path: PathBuf::from(db_path),
            host,
            port,
            upload_dir: PathBuf::from(upload_dir),
            public_url,
            admin,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
