//! Engine configuration sourced from environment variables and optional YAML.
//!
//! The two platform switches are read once at startup and injected into the
//! global role resolver; nothing re-reads them afterwards. Unset switches are
//! off, so a missing variable can only narrow access.
use crate::global::PlatformSwitches;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;

pub const DEFAULT_PG_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_PG_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PG_ACQUIRE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_ms: u64,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Enables wildcard `subject/action` grants from the global RBAC tables.
    pub global_rbac_enabled: bool,
    /// Enables the superuser full bypass.
    pub superuser_enabled: bool,
    /// Durable store; `None` selects the in-memory store.
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Deserialize)]
struct PostgresConfigOverride {
    url: Option<String>,
    max_connections: Option<u32>,
    connect_timeout_ms: Option<u64>,
    acquire_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EngineConfigOverride {
    global_rbac_enabled: Option<bool>,
    superuser_enabled: Option<bool>,
    postgres: Option<PostgresConfigOverride>,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let global_rbac_enabled = env_flag("WARDEN_GLOBAL_RBAC_ENABLED")?;
        let superuser_enabled = env_flag("WARDEN_SUPERUSER_ENABLED")?;
        let postgres = match std::env::var("WARDEN_DATABASE_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_number(
                    "WARDEN_PG_MAX_CONNECTIONS",
                    DEFAULT_PG_MAX_CONNECTIONS,
                )?,
                connect_timeout_ms: env_number(
                    "WARDEN_PG_CONNECT_TIMEOUT_MS",
                    DEFAULT_PG_CONNECT_TIMEOUT_MS,
                )?,
                acquire_timeout_ms: env_number(
                    "WARDEN_PG_ACQUIRE_TIMEOUT_MS",
                    DEFAULT_PG_ACQUIRE_TIMEOUT_MS,
                )?,
            }),
            Err(_) => None,
        };
        Ok(Self {
            global_rbac_enabled,
            superuser_enabled,
            postgres,
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            let contents =
                fs::read_to_string(&path).with_context(|| format!("read WARDEN_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: EngineConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse warden config yaml")?;
        if let Some(value) = override_cfg.global_rbac_enabled {
            self.global_rbac_enabled = value;
        }
        if let Some(value) = override_cfg.superuser_enabled {
            self.superuser_enabled = value;
        }
        if let Some(pg) = override_cfg.postgres {
            let base = self.postgres.take();
            let url = match (pg.url, base.as_ref()) {
                (Some(url), _) => url,
                (None, Some(base)) => base.url.clone(),
                (None, None) => bail!("postgres.url is required when postgres is configured"),
            };
            self.postgres = Some(PostgresConfig {
                url,
                max_connections: pg
                    .max_connections
                    .or(base.as_ref().map(|b| b.max_connections))
                    .unwrap_or(DEFAULT_PG_MAX_CONNECTIONS),
                connect_timeout_ms: pg
                    .connect_timeout_ms
                    .or(base.as_ref().map(|b| b.connect_timeout_ms))
                    .unwrap_or(DEFAULT_PG_CONNECT_TIMEOUT_MS),
                acquire_timeout_ms: pg
                    .acquire_timeout_ms
                    .or(base.as_ref().map(|b| b.acquire_timeout_ms))
                    .unwrap_or(DEFAULT_PG_ACQUIRE_TIMEOUT_MS),
            });
        }
        Ok(())
    }

    pub fn switches(&self) -> PlatformSwitches {
        PlatformSwitches {
            global_rbac_enabled: self.global_rbac_enabled,
            superuser_enabled: self.superuser_enabled,
        }
    }
}

fn env_flag(key: &str) -> Result<bool> {
    match std::env::var(key) {
        Ok(value) => parse_flag(&value).with_context(|| format!("parse {key}")),
        Err(_) => Ok(false),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("invalid boolean: {other}"),
    }
}

fn env_number<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}
