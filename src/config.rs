use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_BIND: &str = "127.0.0.1:4000";
const DEV_JWT_SECRET: &str = "schoold-dev-secret";

/// Process-wide configuration, resolved once at startup and injected into the
/// shared state. Nothing here is mutated after `from_env` returns.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let bind_addr = env::var("SCHOOLD_BIND")
            .unwrap_or_else(|_| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .context("SCHOOLD_BIND must be a socket address")?;
        let data_dir = PathBuf::from(env::var("SCHOOLD_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
        let production = env::var("SCHOOLD_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let jwt_secret = match env::var("SCHOOLD_JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if production => {
                anyhow::bail!("SCHOOLD_JWT_SECRET is required in production")
            }
            _ => {
                tracing::warn!("SCHOOLD_JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Ok(Config {
            bind_addr,
            data_dir,
            jwt_secret,
            production,
        })
    }
}
