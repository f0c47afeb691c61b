//! Process configuration, assembled once at startup from environment
//! variables (spec §6 "Environment / configuration"). Unlike the
//! teacher's inline `env::var(...).expect(...)` calls scattered through
//! `main.rs`, this spec's surface is wide enough to warrant a single
//! struct so every other module can depend on `Arc<Config>` instead of
//! reading the environment itself.
//!
//! Parsing failures panic at startup (same as the teacher's
//! `.expect("DATABASE_URL must be set")`) — a half-configured
//! orchestrator should never accept traffic.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw {
            "production" => Environment::Production,
            "sandbox" => Environment::Sandbox,
            other => panic!("ENVIRONMENT must be 'sandbox' or 'production', got {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStoreBackend {
    File,
    Cloud,
}

impl SecretStoreBackend {
    fn parse(raw: &str) -> Self {
        match raw {
            "file" => SecretStoreBackend::File,
            "cloud" => SecretStoreBackend::Cloud,
            other => panic!("SECRET_STORE_BACKEND must be 'file' or 'cloud', got {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub pool: PoolConfig,
    pub host: String,
    pub port: u16,

    pub gateway_server_url: String,
    pub gateway_tokenization_url: String,
    pub gateway_socket_endpoint: String,

    pub secret_store_backend: SecretStoreBackend,
    pub secret_store_root: String,
    pub secret_cache_ttl: Duration,

    pub ip_allowlist_source: String,
    pub cron_secret: String,
    pub admin_secret: String,
    pub jwt_issuer_allowlist: Vec<String>,
    pub environment: Environment,

    pub credential_cache_capacity: usize,
    pub credential_cache_ttl: Duration,
}

fn env_var(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env_var("DATABASE_URL");

        let pool = PoolConfig {
            max_connections: env_parse_or("DB_POOL_MAX_CONNECTIONS", 10),
            min_connections: env_parse_or("DB_POOL_MIN_CONNECTIONS", 1),
            max_lifetime: Duration::from_secs(env_parse_or("DB_POOL_MAX_LIFETIME_SECS", 1800)),
            idle_timeout: Duration::from_secs(env_parse_or("DB_POOL_IDLE_TIMEOUT_SECS", 600)),
        };

        let host = env_var_or("HOST", "127.0.0.1");
        let port = env_parse_or("PORT", 3000u16);

        let gateway_server_url = env_var_or(
            "GATEWAY_SERVER_URL",
            "https://gateway.example.test/servlet/transact",
        );
        let gateway_tokenization_url = env_var_or(
            "GATEWAY_TOKENIZATION_URL",
            "https://gateway.example.test/servlet/tokenize",
        );
        let gateway_socket_endpoint =
            env_var_or("GATEWAY_SOCKET_ENDPOINT", "gateway.example.test:8086");

        let secret_store_backend = SecretStoreBackend::parse(&env_var_or(
            "SECRET_STORE_BACKEND",
            "file",
        ));
        let secret_store_root = env_var_or("SECRET_STORE_ROOT", "./secrets");
        let secret_cache_ttl =
            Duration::from_secs(env_parse_or("SECRET_CACHE_TTL_SECS", 300));

        let ip_allowlist_source = env_var_or("IP_ALLOWLIST_SOURCE", "database");
        let cron_secret = env_var("CRON_SECRET");
        let admin_secret = env_var("ADMIN_SECRET");
        let jwt_issuer_allowlist = env_var_or("JWT_ISSUER_ALLOWLIST", "")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let environment = Environment::parse(&env_var_or("ENVIRONMENT", "sandbox"));

        let credential_cache_capacity = env_parse_or("CREDENTIAL_CACHE_CAPACITY", 1024);
        let credential_cache_ttl =
            Duration::from_secs(env_parse_or("CREDENTIAL_CACHE_TTL_SECS", 300));

        Self {
            database_url,
            pool,
            host,
            port,
            gateway_server_url,
            gateway_tokenization_url,
            gateway_socket_endpoint,
            secret_store_backend,
            secret_store_root,
            secret_cache_ttl,
            ip_allowlist_source,
            cron_secret,
            admin_secret,
            jwt_issuer_allowlist,
            environment,
            credential_cache_capacity,
            credential_cache_ttl,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
