use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub storage: StorageConfig,
    pub share: ShareConfig,
    pub reclamation: ReclamationConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
    /// Origin used to build `/d/<slug>` share links
    pub public_base_url: String,
    /// Origin encoded into QR codes
    pub qr_base_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// HS256 shared secret
    pub jwt_secret: String,
    pub jwt_leeway: Duration,
    pub access_token_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Public endpoint URL reported back to uploaders (defaults to endpoint)
    pub public_endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Generated namespace prepended to every object key
    pub key_prefix: String,
    /// Lifetime of presigned download URLs
    pub presign_ttl: Duration,
}

/// How an authorized download reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Relay the object bytes through the gateway
    Stream,
    /// Redirect the client to the presigned URL
    Redirect,
}

#[derive(Debug, Clone)]
pub struct ShareConfig {
    pub default_expiry_hours: i64,
    pub max_expiry_hours: i64,
    pub delivery: DeliveryMode,
    pub slug_max_attempts: u32,
    pub max_upload_size: usize,
}

#[derive(Debug, Clone)]
pub struct ReclamationConfig {
    pub interval: Duration,
    pub batch_size: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub per_second: u32,
    pub burst: u32,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// Key clients by X-Forwarded-For / X-Real-IP instead of the peer address
    pub trust_proxy_headers: bool,
}

fn parse_env<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr + ToString,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|_| format!("{} must be a valid number", key))
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            share: ShareConfig::from_env()?,
            reclamation: ReclamationConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024; // 50MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size =
            parse_env("MAX_REQUEST_BODY_SIZE", Self::DEFAULT_MAX_REQUEST_BODY_SIZE)?;

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let qr_base_url = env::var("QR_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| public_base_url.clone());

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
            public_base_url,
            qr_base_url,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_env(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_env("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;
    const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 900; // 15 minutes

    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "JWT_SECRET environment variable is required".to_string())?;

        let jwt_leeway_secs = parse_env("JWT_LEEWAY", Self::DEFAULT_JWT_LEEWAY_SECS)?;
        let access_token_ttl_secs =
            parse_env("JWT_ACCESS_TOKEN_TTL", Self::DEFAULT_ACCESS_TOKEN_TTL_SECS)?;

        Ok(Self {
            jwt_secret,
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
            access_token_ttl: Duration::from_secs(access_token_ttl_secs),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Fileshare Gateway API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Upload, share and download files through expiring links".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl StorageConfig {
    const DEFAULT_PRESIGN_TTL_SECS: u64 = 900; // 15 minutes

    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("STORAGE_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let public_endpoint =
            env::var("STORAGE_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let access_key =
            env::var("STORAGE_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let secret_key =
            env::var("STORAGE_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let bucket = env::var("STORAGE_BUCKET").unwrap_or_else(|_| "fileshare".to_string());

        let region = env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let key_prefix = env::var("STORAGE_KEY_PREFIX")
            .unwrap_or_else(|_| "files".to_string())
            .trim_matches('/')
            .to_string();

        let presign_ttl_secs =
            parse_env("STORAGE_PRESIGN_TTL_SECS", Self::DEFAULT_PRESIGN_TTL_SECS)?;
        if presign_ttl_secs == 0 {
            return Err("STORAGE_PRESIGN_TTL_SECS must be greater than zero".to_string());
        }

        Ok(Self {
            endpoint,
            public_endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            key_prefix,
            presign_ttl: Duration::from_secs(presign_ttl_secs),
        })
    }
}

impl ShareConfig {
    const DEFAULT_EXPIRY_HOURS: i64 = 7 * 24;
    const DEFAULT_MAX_EXPIRY_HOURS: i64 = 30 * 24;
    const DEFAULT_SLUG_MAX_ATTEMPTS: u32 = 5;
    const DEFAULT_MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024; // 50MB
    /// Upper bound accepted for MAX_EXPIRY_HOURS (10 years)
    const EXPIRY_HOURS_CEILING: i64 = 10 * 365 * 24;

    pub fn from_env() -> Result<Self, String> {
        let default_expiry_hours = parse_env("DEFAULT_EXPIRY_HOURS", Self::DEFAULT_EXPIRY_HOURS)?;
        let max_expiry_hours = parse_env("MAX_EXPIRY_HOURS", Self::DEFAULT_MAX_EXPIRY_HOURS)?;
        if !(1..=Self::EXPIRY_HOURS_CEILING).contains(&max_expiry_hours) {
            return Err(format!(
                "MAX_EXPIRY_HOURS must be between 1 and {}",
                Self::EXPIRY_HOURS_CEILING
            ));
        }
        if default_expiry_hours < 1 || default_expiry_hours > max_expiry_hours {
            return Err("DEFAULT_EXPIRY_HOURS must be between 1 and MAX_EXPIRY_HOURS".to_string());
        }

        let delivery = match env::var("DOWNLOAD_DELIVERY")
            .unwrap_or_else(|_| "stream".to_string())
            .to_lowercase()
            .as_str()
        {
            "stream" => DeliveryMode::Stream,
            "redirect" => DeliveryMode::Redirect,
            other => {
                return Err(format!(
                    "DOWNLOAD_DELIVERY must be 'stream' or 'redirect', got '{}'",
                    other
                ))
            }
        };

        let slug_max_attempts = parse_env("SLUG_MAX_ATTEMPTS", Self::DEFAULT_SLUG_MAX_ATTEMPTS)?.max(1);
        let max_upload_size = parse_env("MAX_UPLOAD_SIZE", Self::DEFAULT_MAX_UPLOAD_SIZE)?;

        Ok(Self {
            default_expiry_hours,
            max_expiry_hours,
            delivery,
            slug_max_attempts,
            max_upload_size,
        })
    }
}

impl ReclamationConfig {
    const DEFAULT_INTERVAL_SECS: u64 = 3600; // hourly
    const DEFAULT_BATCH_SIZE: i64 = 500;

    pub fn from_env() -> Result<Self, String> {
        let interval_secs = parse_env("RECLAMATION_INTERVAL_SECS", Self::DEFAULT_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err("RECLAMATION_INTERVAL_SECS must be greater than zero".to_string());
        }

        Ok(Self {
            interval: Duration::from_secs(interval_secs),
            batch_size: parse_env("RECLAMATION_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?.max(1),
        })
    }
}

impl RateLimitConfig {
    const DEFAULT_PER_SECOND: u32 = 1;
    const DEFAULT_BURST: u32 = 5;
    const DEFAULT_IDLE_SECS: u64 = 180; // 3 minutes
    const DEFAULT_SWEEP_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let per_second = parse_env("RATE_LIMIT_PER_SECOND", Self::DEFAULT_PER_SECOND)?;
        let burst = parse_env("RATE_LIMIT_BURST", Self::DEFAULT_BURST)?;
        if per_second == 0 || burst == 0 {
            return Err("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be positive".to_string());
        }

        let idle_secs = parse_env("RATE_LIMIT_IDLE_SECS", Self::DEFAULT_IDLE_SECS)?;
        let sweep_secs = parse_env("RATE_LIMIT_SWEEP_SECS", Self::DEFAULT_SWEEP_SECS)?.max(1);

        let trust_proxy_headers = env::var("RATE_LIMIT_TRUST_PROXY")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            per_second,
            burst,
            idle_timeout: Duration::from_secs(idle_secs),
            sweep_interval: Duration::from_secs(sweep_secs),
            trust_proxy_headers,
        })
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: Self::DEFAULT_PER_SECOND,
            burst: Self::DEFAULT_BURST,
            idle_timeout: Duration::from_secs(Self::DEFAULT_IDLE_SECS),
            sweep_interval: Duration::from_secs(Self::DEFAULT_SWEEP_SECS),
            trust_proxy_headers: false,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            default_expiry_hours: Self::DEFAULT_EXPIRY_HOURS,
            max_expiry_hours: Self::DEFAULT_MAX_EXPIRY_HOURS,
            delivery: DeliveryMode::Stream,
            slug_max_attempts: Self::DEFAULT_SLUG_MAX_ATTEMPTS,
            max_upload_size: Self::DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}
