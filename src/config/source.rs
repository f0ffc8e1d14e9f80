//! Data source configuration
//!
//! Resolves which backend the dashboard reads from. The hosted REST API is
//! configured with a service URL and a public API key; a direct Postgres
//! connection is configured with a `postgres://` URL.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service URL for the hosted REST API
pub const ENV_SERVICE_URL: &str = "PUBLIC_SUPABASE_URL";
/// Public (anonymous tier) API key for the hosted REST API
pub const ENV_ANON_KEY: &str = "PUBLIC_SUPABASE_ANON_KEY";
/// Privileged key, used instead of the anon key by write jobs when set
pub const ENV_SERVICE_KEY: &str = "WARDEAD_SERVICE_KEY";
/// Direct Postgres connection URL
pub const ENV_DATABASE_URL: &str = "WARDEAD_DATABASE_URL";

/// Which backend to read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Rest,
    Postgres,
}

/// Resolved data source
#[derive(Debug, Clone)]
pub enum SourceConfig {
    /// Hosted PostgREST-style API
    Rest(RestConfig),
    /// Direct Postgres connection
    Postgres(ConnectionConfig),
    /// Directory of `<view>.json` files
    Fixtures(PathBuf),
}

/// Hosted REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Service base URL (e.g. `https://abc.supabase.co`)
    pub url: String,

    /// API key sent as `apikey` and bearer token
    #[serde(skip_serializing)]
    pub api_key: String,
}

impl RestConfig {
    /// Validate and normalize a service URL + key pair
    pub fn new(url: &str, api_key: &str) -> ConfigResult<Self> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(ConfigError::Missing(ENV_SERVICE_URL.to_string()));
        }
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ConfigError::Invalid(format!(
                "Service URL must start with http:// or https://: {}",
                url
            )));
        }
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::Missing(ENV_ANON_KEY.to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl SourceConfig {
    /// Resolve the source from the process environment.
    pub fn from_env(backend: Option<Backend>) -> ConfigResult<Self> {
        Self::from_lookup(backend, |name| std::env::var(name).ok())
    }

    /// Resolve the source for write jobs: prefers the service key over the
    /// anon key when both are present.
    pub fn from_env_privileged(backend: Option<Backend>) -> ConfigResult<Self> {
        Self::from_lookup(backend, |name| {
            if name == ENV_ANON_KEY {
                if let Some(key) = non_empty(std::env::var(ENV_SERVICE_KEY).ok()) {
                    return Some(key);
                }
            }
            std::env::var(name).ok()
        })
    }

    /// Resolve the source using an arbitrary variable lookup.
    ///
    /// Without an explicit backend, a database URL wins over the REST pair.
    pub fn from_lookup<F>(backend: Option<Backend>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = non_empty(lookup(ENV_DATABASE_URL));
        let backend = backend.unwrap_or(if database_url.is_some() {
            Backend::Postgres
        } else {
            Backend::Rest
        });

        match backend {
            Backend::Postgres => {
                let url =
                    database_url.ok_or_else(|| ConfigError::Missing(ENV_DATABASE_URL.into()))?;
                Ok(Self::Postgres(ConnectionConfig::from_url(&url)?))
            }
            Backend::Rest => {
                let url = non_empty(lookup(ENV_SERVICE_URL))
                    .ok_or_else(|| ConfigError::Missing(ENV_SERVICE_URL.into()))?;
                let key = non_empty(lookup(ENV_ANON_KEY))
                    .ok_or_else(|| ConfigError::Missing(ENV_ANON_KEY.into()))?;
                Ok(Self::Rest(RestConfig::new(&url, &key)?))
            }
        }
    }

    /// Short human-readable description (never includes secrets)
    pub fn describe(&self) -> String {
        match self {
            SourceConfig::Rest(cfg) => format!("rest {}", cfg.url),
            SourceConfig::Postgres(cfg) => format!("postgres {}", cfg.name),
            SourceConfig::Fixtures(dir) => format!("fixtures {}", dir.display()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Direct Postgres connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Display name (`database@host`)
    pub name: String,

    /// Database host
    pub host: String,

    /// Database port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name
    pub database: String,

    /// Username
    pub username: String,

    /// Password
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// SSL mode
    #[serde(default)]
    pub ssl_mode: SslMode,
}

/// SSL connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

fn default_port() -> u16 {
    5432
}

impl ConnectionConfig {
    /// Parse a postgres:// URL into a ConnectionConfig
    pub fn from_url(url: &str) -> ConfigResult<Self> {
        let url = url.trim();
        let rest = url
            .strip_prefix("postgres://")
            .or_else(|| url.strip_prefix("postgresql://"))
            .ok_or_else(|| ConfigError::Invalid("URL must start with postgres://".into()))?;

        // Hosted passwords may contain '@', the host never does
        let (creds, host_part) = rest
            .rsplit_once('@')
            .ok_or_else(|| ConfigError::Invalid("URL must contain @".into()))?;

        let (username, password) = match creds.split_once(':') {
            Some((u, p)) => (decode(u), Some(decode(p))),
            None => (decode(creds), None),
        };

        let (host_port, database) = host_part
            .split_once('/')
            .ok_or_else(|| ConfigError::Invalid("URL must contain /dbname".into()))?;

        let (database, ssl_mode) = match database.split_once('?') {
            Some((db, query)) => (db.to_string(), parse_sslmode_param(query)),
            None => (database.to_string(), SslMode::Prefer),
        };
        if database.is_empty() {
            return Err(ConfigError::Invalid("URL must contain /dbname".into()));
        }

        let (host, port) = match host_port.split_once(':') {
            Some((h, p)) => {
                let port = p
                    .parse::<u16>()
                    .map_err(|_| ConfigError::Invalid(format!("Invalid port: {}", p)))?;
                (h.to_string(), port)
            }
            None => (host_port.to_string(), default_port()),
        };

        Ok(Self {
            name: format!("{}@{}", database, host),
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
        })
    }

    /// Build a PostgreSQL connection string (without password)
    pub fn connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={}",
            self.host, self.port, self.database, self.username
        )
    }

    /// Build a full connection string including password
    pub fn connection_string_with_password(&self) -> String {
        let with_ssl = format!(
            "{} sslmode={}",
            self.connection_string(),
            match self.ssl_mode {
                SslMode::Disable => "disable",
                SslMode::Prefer => "prefer",
                SslMode::Require => "require",
            }
        );
        match self.password {
            Some(ref pw) => format!("{} password='{}'", with_ssl, escape_conn_value(pw)),
            None => with_ssl,
        }
    }
}

/// Percent-decode a URL userinfo component
fn decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

/// Escape a value for a single-quoted libpq key/value pair
fn escape_conn_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Parse the `sslmode` value from a URL query string
fn parse_sslmode_param(query: &str) -> SslMode {
    for param in query.split('&') {
        if let Some(value) = param.strip_prefix("sslmode=") {
            return match value {
                "disable" => SslMode::Disable,
                "require" | "verify-ca" | "verify-full" => SslMode::Require,
                _ => SslMode::Prefer,
            };
        }
    }
    SslMode::Prefer
}
