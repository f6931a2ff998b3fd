//! Configuration management
//!
//! Built once at process start and passed down explicitly. Values come from the
//! process environment, optionally seeded from a `.env` file.

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::TableRef;
use crate::snapshot::SnapshotFormat;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Public BRT GPS feed of Rio de Janeiro.
pub const DEFAULT_FEED_URL: &str = "https://dados.mobilidade.rio/gps/brt";

/// Schema holding raw feed payloads.
pub const DEFAULT_DB_SCHEMA: &str = "raw_brt";

/// Table holding one payload row per run.
pub const DEFAULT_DB_TABLE: &str = "gps_brt";

/// Default maximum database connections in the pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default connection acquire timeout in seconds.
pub const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Snapshot directory when running from a checkout.
pub const LOCAL_SNAPSHOT_DIR: &str = "./data";

/// Snapshot directory inside the container image.
pub const CONTAINER_SNAPSHOT_DIR: &str = "/app/data";

/// Default interval between scheduled runs (one minute).
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Settings without which the pipeline cannot reach the database.
pub const REQUIRED_DB_KEYS: [&str; 5] = ["DB_USER", "DB_PASSWORD", "DB_HOST", "DB_PORT", "DB_NAME"];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub snapshot: SnapshotConfig,
    pub schedule: ScheduleConfig,
}

/// Database configuration
#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub schema: String,
    pub table: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Upstream feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
}

/// Snapshot store configuration
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub dir: PathBuf,
    pub format: SnapshotFormat,
}

/// Built-in scheduler configuration
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

/// Where the process runs; selects the default snapshot directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
    #[default]
    Local,
    Container,
}

impl Deployment {
    pub fn snapshot_dir(self) -> PathBuf {
        match self {
            Deployment::Local => PathBuf::from(LOCAL_SNAPSHOT_DIR),
            Deployment::Container => PathBuf::from(CONTAINER_SNAPSHOT_DIR),
        }
    }
}

impl FromStr for Deployment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Deployment::Local),
            "container" | "docker" => Ok(Deployment::Container),
            _ => Err(anyhow::anyhow!("Invalid deployment: {}", s)),
        }
    }
}

impl DatabaseConfig {
    /// Typed connection options built from the five connection settings
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }

    /// Connection string safe to log
    pub fn redacted_url(&self) -> String {
        format!(
            "postgresql://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.name
        )
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema, &self.table)
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.redacted_url())
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .finish()
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&str> = REQUIRED_DB_KEYS
            .iter()
            .copied()
            .filter(|&key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("Missing database settings: {}", missing.join(", "));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let deployment: Deployment = parse_or(&get, "BRT_DEPLOYMENT", Deployment::default())?;

        let config = Config {
            database: DatabaseConfig {
                user: required("DB_USER"),
                password: required("DB_PASSWORD"),
                host: required("DB_HOST"),
                port: required("DB_PORT")
                    .parse()
                    .with_context(|| format!("DB_PORT is not a valid port: {}", required("DB_PORT")))?,
                name: required("DB_NAME"),
                schema: get("DB_SCHEMA").unwrap_or_else(|| DEFAULT_DB_SCHEMA.to_string()),
                table: get("DB_TABLE").unwrap_or_else(|| DEFAULT_DB_TABLE.to_string()),
                max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
                acquire_timeout_secs: parse_or(
                    &get,
                    "DB_ACQUIRE_TIMEOUT",
                    DEFAULT_DB_ACQUIRE_TIMEOUT_SECS,
                )?,
            },
            feed: FeedConfig {
                url: get("BRT_FEED_URL").unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            },
            snapshot: SnapshotConfig {
                dir: get("BRT_SNAPSHOT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| deployment.snapshot_dir()),
                format: parse_or(&get, "BRT_SNAPSHOT_FORMAT", SnapshotFormat::default())?,
            },
            schedule: ScheduleConfig {
                interval_secs: parse_or(&get, "BRT_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.port == 0 {
            anyhow::bail!("DB_PORT must be greater than 0");
        }

        // Schema and table are interpolated into DDL
        for (key, ident) in [("DB_SCHEMA", &self.database.schema), ("DB_TABLE", &self.database.table)] {
            if !is_plain_identifier(ident) {
                anyhow::bail!("{} must be a plain SQL identifier, got '{}'", key, ident);
            }
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be greater than 0");
        }

        if self.schedule.interval_secs == 0 {
            anyhow::bail!("BRT_INTERVAL_SECS must be greater than 0");
        }

        if !self.feed.url.starts_with("http://") && !self.feed.url.starts_with("https://") {
            anyhow::bail!("BRT_FEED_URL must be an http(s) URL, got '{}'", self.feed.url);
        }

        Ok(())
    }
}

fn parse_or<T>(get: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", key, raw, e)),
        None => Ok(default),
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes (Postgres NAMEDATALEN - 1)
pub fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok && ident.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
