use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub sequence: SequenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
    pub default_limit: i32,
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    pub allow_registration: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    pub bootstrap_admin_name: String,
}

/// How sequence numbers for cases and invoices are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStrategy {
    /// Atomic increment of a per (kind, year) counter record.
    Counter,
    /// Count existing identifiers with the year prefix and add one.
    /// Racy under concurrent writers; kept for compatibility.
    Count,
}

/// What the allocator does when the store cannot produce a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Issue a timestamp-suffixed identifier and flag the record as degraded.
    Degrade,
    /// Fail entity creation.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub strategy: SequenceStrategy,
    pub fallback: FallbackMode,
    /// Attempts against the store before the fallback kicks in.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Fresh allocations tried when an insert hits the uniqueness constraint.
    pub max_create_attempts: u32,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            strategy: SequenceStrategy::Counter,
            fallback: FallbackMode::Degrade,
            max_attempts: 3,
            retry_backoff_ms: 25,
            max_create_attempts: 5,
        }
    }
}

impl SequenceStrategy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "counter" | "atomic" => Some(Self::Counter),
            "count" | "legacy" => Some(Self::Count),
            _ => None,
        }
    }
}

impl FallbackMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "degrade" | "fallback" => Some(Self::Degrade),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "memory" | "mem" => Some(Self::Memory),
            _ => None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }
        if let Ok(v) = env::var("FILTER_DEFAULT_LIMIT") {
            self.filter.default_limit = v.parse().unwrap_or(self.filter.default_limit);
        }
        if let Ok(v) = env::var("FILTER_DEBUG_LOGGING") {
            self.filter.debug_logging = v.parse().unwrap_or(self.filter.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Some(port) = env::var("LEXCASE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }
        if let Ok(v) = env::var("SECURITY_ALLOW_REGISTRATION") {
            self.security.allow_registration = v.parse().unwrap_or(self.security.allow_registration);
        }

        // Storage overrides
        if let Some(backend) = env::var("STORAGE_BACKEND").ok().as_deref().and_then(StorageBackend::parse) {
            self.storage.backend = backend;
        }
        if let Ok(v) = env::var("STORAGE_BOOTSTRAP_ADMIN_EMAIL") {
            self.storage.bootstrap_admin_email = Some(v);
        }
        if let Ok(v) = env::var("STORAGE_BOOTSTRAP_ADMIN_PASSWORD") {
            self.storage.bootstrap_admin_password = Some(v);
        }
        if let Ok(v) = env::var("STORAGE_BOOTSTRAP_ADMIN_NAME") {
            self.storage.bootstrap_admin_name = v;
        }

        // Sequence overrides
        if let Some(strategy) = env::var("SEQUENCE_STRATEGY").ok().as_deref().and_then(SequenceStrategy::parse) {
            self.sequence.strategy = strategy;
        }
        if let Some(fallback) = env::var("SEQUENCE_FALLBACK").ok().as_deref().and_then(FallbackMode::parse) {
            self.sequence.fallback = fallback;
        }
        if let Ok(v) = env::var("SEQUENCE_MAX_ATTEMPTS") {
            self.sequence.max_attempts = v.parse().unwrap_or(self.sequence.max_attempts);
        }
        if let Ok(v) = env::var("SEQUENCE_RETRY_BACKOFF_MS") {
            self.sequence.retry_backoff_ms = v.parse().unwrap_or(self.sequence.retry_backoff_ms);
        }
        if let Ok(v) = env::var("SEQUENCE_MAX_CREATE_ATTEMPTS") {
            self.sequence.max_create_attempts = v.parse().unwrap_or(self.sequence.max_create_attempts);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            filter: FilterConfig {
                max_limit: Some(1000),
                default_limit: 100,
                debug_logging: true,
            },
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                bcrypt_cost: 4,
                allow_registration: true,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
                bootstrap_admin_name: "Administrator".to_string(),
            },
            sequence: SequenceConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            filter: FilterConfig {
                max_limit: Some(500),
                default_limit: 50,
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: 10,
                allow_registration: true,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
                bootstrap_admin_name: "Administrator".to_string(),
            },
            sequence: SequenceConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            filter: FilterConfig {
                max_limit: Some(100),
                default_limit: 25,
                debug_logging: false,
            },
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            api: ApiConfig {
                port: 3000,
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                bcrypt_cost: 12,
                allow_registration: false,
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                bootstrap_admin_email: None,
                bootstrap_admin_password: None,
                bootstrap_admin_name: "Administrator".to_string(),
            },
            sequence: SequenceConfig {
                fallback: FallbackMode::Strict,
                ..SequenceConfig::default()
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
