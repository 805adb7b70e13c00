/*
 * Responsibility
 * - 環境変数から設定を読み込む (.env は dotenvy)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 * - 署名用シークレットは Debug に出さない
 */
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Which implementation backs the credential and OTP stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("STORE_BACKEND")),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// First administrator, created at startup when no visible account has this username.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    pub auth_issuer: String,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub otp_ttl_seconds: u64,

    pub permission_catalog_path: PathBuf,
    pub admin_seed: Option<AdminSeed>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("store_backend", &self.store_backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("auth_issuer", &self.auth_issuer)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("otp_ttl_seconds", &self.otp_ttl_seconds)
            .field("permission_catalog_path", &self.permission_catalog_path)
            .field("admin_seed", &self.admin_seed)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&lookup, "AUTH_PORT", 8000)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("AUTH_PORT"))?;

        let app_env = lookup("APP_ENV")
            .map(|raw| AppEnv::parse(&raw))
            .unwrap_or(AppEnv::Development);

        let store_backend = match lookup("STORE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Postgres,
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?;

        let auth_issuer = lookup("AUTH_ISSUER").unwrap_or_else(|| "identity".to_string());

        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET"));
        }

        let access_token_ttl_seconds = parse_ttl(&lookup, "ACCESS_TOKEN_TTL_SECONDS", 3600)?;
        let refresh_token_ttl_seconds = parse_ttl(&lookup, "REFRESH_TOKEN_TTL_SECONDS", 21600)?;
        let otp_ttl_seconds = parse_ttl(&lookup, "OTP_TTL_SECONDS", 60)?;

        let permission_catalog_path = lookup("PERMISSION_CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./resources/permissions.json"));

        let admin_seed = admin_seed(&lookup)?;

        Ok(Self {
            addr,
            app_env,
            store_backend,
            database_url,
            database_max_connections,
            auth_issuer,
            jwt_secret,
            access_token_ttl_seconds,
            refresh_token_ttl_seconds,
            otp_ttl_seconds,
            permission_catalog_path,
            admin_seed,
        })
    }
}

// Absent → default; present but unparsable → Invalid (a typo should not silently fall back).
fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

// All three ADMIN_* keys or none of them.
fn admin_seed<F>(lookup: &F) -> Result<Option<AdminSeed>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let username = get("ADMIN_USERNAME");
    let email = get("ADMIN_EMAIL");
    let password = get("ADMIN_PASSWORD");

    if username.is_none() && email.is_none() && password.is_none() {
        return Ok(None);
    }

    Ok(Some(AdminSeed {
        username: username.ok_or(ConfigError::Missing("ADMIN_USERNAME"))?,
        email: email.ok_or(ConfigError::Missing("ADMIN_EMAIL"))?,
        password: password.ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?,
    }))
}

/// Longest lifetime accepted for any token or challenge (one year).
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

fn parse_ttl<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let ttl: u64 = parse_or(lookup, key, default)?;
    if ttl == 0 || ttl > MAX_TTL_SECONDS {
        return Err(ConfigError::Invalid(key));
    }
    Ok(ttl)
}
