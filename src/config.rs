use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::logging::{LogConfig, LogLevel};
use crate::telemetry::TelemetryConfig;

/// Fallback signing secret, only meant for local development
pub const DEV_JWT_SECRET: &str = "dev-secret-key";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub telemetry: Option<TelemetryConfig>,
    pub postgres: Option<PostgresConfig>,
    pub sqlite: Option<SqliteConfig>,
    pub redis: Option<RedisConfig>,
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: bool,
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Full connection string; takes precedence over the discrete fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Full connection string; takes precedence over the discrete fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

#[derive(Clone, PartialEq, Eq)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry: Duration,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors: true,
            allow_origins: vec!["*".to_string()],
            allow_methods: vec!["*".to_string()],
            allow_headers: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

impl PostgresConfig {
    /// Replace zero or empty fields with the kit defaults
    pub fn with_defaults(mut self) -> Self {
        fn fill(value: &mut String, default: &str) {
            if value.is_empty() {
                *value = default.to_string();
            }
        }

        fill(&mut self.host, "localhost");
        fill(&mut self.username, "postgres");
        fill(&mut self.password, "postgres");
        fill(&mut self.database, "postgres");
        if self.port == 0 {
            self.port = 5432;
        }
        if self.max_connections == 0 {
            self.max_connections = 100;
        }
        if self.acquire_timeout.is_zero() {
            self.acquire_timeout = Duration::from_secs(30);
        }
        if self.idle_timeout.is_zero() {
            self.idle_timeout = Duration::from_secs(5 * 60);
        }
        if self.max_lifetime.is_zero() {
            self.max_lifetime = Duration::from_secs(30 * 60);
        }
        self.min_connections = self.min_connections.min(self.max_connections);
        self
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: String::new(),
            port: 0,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            min_connections: 0,
            max_connections: 0,
            acquire_timeout: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            max_lifetime: Duration::ZERO,
        }
        .with_defaults()
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

impl RedisConfig {
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(password),
                self.host,
                self.port,
                self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.url.as_ref().map(|_| "***"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .finish()
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"***")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Typed access to a variable lookup
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow!("{} must be {}: {}", key, what, e)),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => bail!("{} must be a boolean, got {:?}", key, raw),
            },
            None => Ok(default),
        }
    }

    fn list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(raw) => split_list(&raw),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn duration(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.get(key) {
            Some(raw) => {
                parse_duration(&raw).with_context(|| format!("{} must be a valid duration", key))
            }
            None => Ok(default),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        Ok(AppConfig {
            server: ServerConfig {
                host: vars.string("API_HOST", "0.0.0.0"),
                port: vars.parse("API_PORT", 8080, "a valid port number")?,
                cors: vars.flag("CORS_ENABLED", true)?,
                allow_origins: vars.list("CORS_ALLOW_ORIGINS", &["*"]),
                allow_methods: vars.list("CORS_ALLOW_METHODS", &["*"]),
                allow_headers: vars.list("CORS_ALLOW_HEADERS", &["*"]),
                allow_credentials: vars.flag("CORS_ALLOW_CREDENTIALS", false)?,
            },
            log: LogConfig {
                level: LogLevel::parse(&vars.string("LOG_LEVEL", "INFO")),
                pretty: vars.flag("LOG_PRETTY", false)?,
                log_to_file: vars.flag("LOG_TO_FILE", false)?,
                file_path: vars.string("LOG_FILE_PATH", "./logs"),
                directives: vars.get("LOG_DIRECTIVES").or_else(|| vars.get("RUST_LOG")),
            },
            telemetry: Self::telemetry_from(&vars)?,
            postgres: Self::postgres_from(&vars)?,
            sqlite: Self::sqlite_from(&vars)?,
            redis: Self::redis_from(&vars)?,
            jwt: JwtConfig {
                secret: vars.string("JWT_SECRET", DEV_JWT_SECRET),
                expiry: vars.duration("JWT_EXPIRY", Duration::from_secs(8 * 3600))?,
            },
        })
    }

    fn telemetry_from<F>(vars: &Vars<F>) -> Result<Option<TelemetryConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if !vars.flag("OTEL_ENABLED", false)? {
            return Ok(None);
        }

        let defaults = TelemetryConfig::default();
        Ok(Some(TelemetryConfig {
            service_name: vars.string("OTEL_SERVICE_NAME", &defaults.service_name),
            version: vars.string("OTEL_SERVICE_VERSION", &defaults.version),
            grpc_host: vars.string("OTEL_GRPC_HOST", &defaults.grpc_host),
            grpc_port: vars.parse("OTEL_GRPC_PORT", defaults.grpc_port, "a valid port number")?,
        }))
    }

    fn postgres_from<F>(vars: &Vars<F>) -> Result<Option<PostgresConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PostgreSQL is enabled by either a URL or a host
        let url = vars.get("DATABASE_URL");
        if url.is_none() && vars.get("POSTGRES_HOST").is_none() {
            return Ok(None);
        }

        let config = PostgresConfig {
            url,
            host: vars.string("POSTGRES_HOST", ""),
            port: vars.parse("POSTGRES_PORT", 0, "a valid port number")?,
            username: vars.string("POSTGRES_USER", ""),
            password: vars.string("POSTGRES_PASSWORD", ""),
            database: vars.string("POSTGRES_DB", ""),
            min_connections: vars.parse("POSTGRES_MIN_CONNECTIONS", 0, "a valid number")?,
            max_connections: vars.parse("POSTGRES_MAX_CONNECTIONS", 0, "a valid number")?,
            acquire_timeout: vars.duration("POSTGRES_ACQUIRE_TIMEOUT", Duration::ZERO)?,
            idle_timeout: vars.duration("POSTGRES_IDLE_TIMEOUT", Duration::ZERO)?,
            max_lifetime: vars.duration("POSTGRES_MAX_LIFETIME", Duration::ZERO)?,
        };
        Ok(Some(config.with_defaults()))
    }

    fn sqlite_from<F>(vars: &Vars<F>) -> Result<Option<SqliteConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(path) = vars.get("SQLITE_PATH") else {
            return Ok(None);
        };

        Ok(Some(SqliteConfig {
            path,
            max_connections: vars.parse("SQLITE_MAX_CONNECTIONS", 15, "a valid number")?,
            connection_timeout: vars.duration("SQLITE_CONNECTION_TIMEOUT", Duration::from_secs(30))?,
        }))
    }

    fn redis_from<F>(vars: &Vars<F>) -> Result<Option<RedisConfig>>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Redis is optional - only enabled if REDIS_ENABLED=true
        if !vars.flag("REDIS_ENABLED", false)? {
            return Ok(None);
        }

        let defaults = RedisConfig::default();
        Ok(Some(RedisConfig {
            url: vars.get("REDIS_URL"),
            host: vars.string("REDIS_HOST", &defaults.host),
            port: vars.parse("REDIS_PORT", defaults.port, "a valid port number")?,
            password: vars.get("REDIS_PASSWORD"),
            db: vars.parse("REDIS_DB", defaults.db, "a valid database index")?,
        }))
    }
}

/// Split a comma separated list, dropping empty entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a duration such as `300ms`, `1.5h` or `2h45m`.
///
/// Units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`. A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("invalid duration: empty string");
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        bail!("invalid duration {:?}: negative durations are not supported", input);
    }

    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total_nanos = 0f64;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            bail!("invalid duration {:?}: expected a number", input);
        }
        let value: f64 = rest[..number_end]
            .parse()
            .map_err(|_| anyhow!("invalid duration {:?}: bad number", input))?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => bail!("invalid duration {:?}: missing unit", input),
            unit => bail!("invalid duration {:?}: unknown unit {:?}", input, unit),
        };
        total_nanos += value * nanos_per_unit;
        rest = &rest[unit_end..];
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}
