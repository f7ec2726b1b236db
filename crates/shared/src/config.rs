//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

/// Prefix for environment variable overrides, e.g. `FILEGATE__MINIO__ENDPOINT`.
pub const ENV_PREFIX: &str = "FILEGATE";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Application identity and environment.
    #[serde(default)]
    pub app: AppInfo,
    /// MinIO connection settings.
    #[serde(default)]
    pub minio: MinioConfig,
    /// Cloudflare R2 settings; R2 endpoints are disabled when absent.
    #[serde(default)]
    pub r2: Option<R2Config>,
    /// Storage limits and presigning.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Token verification service.
    #[serde(default)]
    pub auth: AuthConfig,
    /// CORS policy.
    #[serde(default)]
    pub cors: CorsConfig,
    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Grace period for in-flight requests on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> u64 {
    5
}

/// Application identity.
#[derive(Debug, Clone, Deserialize)]
pub struct AppInfo {
    /// Deployment environment (`development`, `dev`, `staging`, `production`, ...).
    #[serde(default = "default_env")]
    pub env: String,
    /// Service name reported in logs.
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            env: default_env(),
            name: default_app_name(),
        }
    }
}

fn default_env() -> String {
    "development".to_string()
}

fn default_app_name() -> String {
    "filegate".to_string()
}

/// MinIO connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MinioConfig {
    /// Host name of the MinIO server, without scheme or port.
    #[serde(default = "default_minio_endpoint")]
    pub endpoint: String,
    /// Port of the MinIO server.
    #[serde(default = "default_minio_port")]
    pub port: u16,
    /// Access key.
    #[serde(default)]
    pub access_key: String,
    /// Secret key.
    #[serde(default)]
    pub secret_key: String,
    /// Use HTTPS.
    #[serde(default)]
    pub use_ssl: bool,
    /// Bucket holding uploaded files.
    #[serde(default = "default_minio_bucket")]
    pub bucket: String,
    /// Signing region.
    #[serde(default = "default_minio_region")]
    pub region: String,
    /// Create the bucket at startup when it does not exist.
    #[serde(default = "default_true")]
    pub create_bucket: bool,
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_minio_endpoint(),
            port: default_minio_port(),
            access_key: String::new(),
            secret_key: String::new(),
            use_ssl: false,
            bucket: default_minio_bucket(),
            region: default_minio_region(),
            create_bucket: true,
        }
    }
}

impl MinioConfig {
    /// Full endpoint URL, e.g. `http://localhost:9000`.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.endpoint, self.port)
    }
}

fn default_minio_endpoint() -> String {
    "localhost".to_string()
}

fn default_minio_port() -> u16 {
    9000
}

fn default_minio_bucket() -> String {
    "api-uploads".to_string()
}

fn default_minio_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

/// Cloudflare R2 settings.
#[derive(Debug, Clone, Deserialize)]
pub struct R2Config {
    /// Cloudflare account ID.
    pub account_id: String,
    /// R2 access key ID.
    pub access_key_id: String,
    /// R2 secret access key.
    pub secret_access_key: String,
    /// Signing region.
    #[serde(default = "default_r2_region")]
    pub region: String,
}

impl R2Config {
    /// R2 S3 API endpoint for the account.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

fn default_r2_region() -> String {
    "auto".to_string()
}

/// Which storage backend serves the `/files` endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// MinIO / S3-compatible server from the `minio` section.
    #[default]
    Minio,
    /// Local directory (development only).
    Local,
}

/// Storage limits and presigning.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend for the `/files` endpoints.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Root directory for the local backend.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Default presigned URL lifetime in seconds.
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
    /// Upper bound accepted for a requested presigned URL lifetime.
    #[serde(default = "default_max_presign_expiry")]
    pub max_presign_expiry_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_root: default_local_root(),
            max_file_size: default_max_file_size(),
            presign_expiry_secs: default_presign_expiry(),
            max_presign_expiry_secs: default_max_presign_expiry(),
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_max_file_size() -> u64 {
    104_857_600 // 100 MiB
}

fn default_presign_expiry() -> u64 {
    3600 // 1 hour
}

fn default_max_presign_expiry() -> u64 {
    604_800 // 7 days
}

/// Token verification service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the auth service; authentication is disabled when unset.
    #[serde(default)]
    pub service_url: Option<String>,
    /// Verification request timeout in seconds.
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            timeout_secs: default_auth_timeout(),
        }
    }
}

impl AuthConfig {
    /// Returns the service URL when set to a non-blank value.
    #[must_use]
    pub fn service_url(&self) -> Option<&str> {
        self.service_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

fn default_auth_timeout() -> u64 {
    5
}

/// CORS policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed outside development mode.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Log output.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Explicit format; defaults depend on the environment.
    #[serde(default)]
    pub format: Option<LogFormat>,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{APP_ENV}`,
    /// then `FILEGATE__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("APP_ENV").unwrap_or_else(|_| default_env());

        let config = config::Config::builder()
            .set_default("app.env", run_mode.clone())?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Development mode relaxes CORS and switches to human-readable logs.
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self.app.env.as_str(), "development" | "dev")
    }

    /// Resolved log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log.format.unwrap_or(if self.is_development() {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        })
    }
}
