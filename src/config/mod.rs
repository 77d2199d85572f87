use std::env;

/// Runtime configuration, loaded from the environment once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT signing secret (required in production)
    pub jwt_secret: String,

    /// Issuer claim pinned on every token
    pub jwt_issuer: String,

    /// Audience claim pinned on every token
    pub jwt_audience: String,

    /// Token lifetime in hours (default: 24)
    pub token_ttl_hours: i64,

    /// Maximum upload size per file in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Maximum number of files per multipart request (default: 5)
    pub max_files_per_request: usize,

    /// Presigned download URL lifetime in seconds (default: 12 months)
    pub presign_expiry_secs: u64,

    /// Rate limit: requests per window per user-or-IP (default: 100)
    pub rate_limit_max_requests: u32,

    /// Rate limit window in seconds (default: 60)
    pub rate_limit_window_secs: u64,

    /// Upload extension allow-list
    pub allowed_extensions: Vec<String>,

    /// Allowed CORS origins (comma separated)
    pub allowed_origins: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    [
        "pdf", "doc", "docx", "odt", "txt", "md", "ppt", "pptx", "xls", "xlsx", "csv", "jpg",
        "jpeg", "png", "gif", "webp", "svg", "mp3", "wav", "ogg", "mp4", "webm", "avi", "mov",
        "zip",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            jwt_issuer: "diagana-school".to_string(),
            jwt_audience: "diagana-school-api".to_string(),
            token_ttl_hours: 24,
            max_file_size: 50 * 1024 * 1024, // 50 MB
            max_files_per_request: 5,
            presign_expiry_secs: 365 * 24 * 3600,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
            allowed_extensions: default_extensions(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            jwt_issuer: env::var("JWT_ISSUER").unwrap_or(default.jwt_issuer),

            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or(default.jwt_audience),

            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.token_ttl_hours),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            max_files_per_request: env::var("MAX_FILES_PER_REQUEST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_files_per_request),

            presign_expiry_secs: env::var("PRESIGN_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.presign_expiry_secs),

            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_max_requests),

            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_window_secs),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_lowercase()).collect())
                .unwrap_or(default.allowed_extensions),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for tests (relaxed rate limit so suites don't trip 429)
    pub fn development() -> Self {
        Self {
            rate_limit_max_requests: 10_000,
            ..Self::default()
        }
    }

    /// Create config for production (secret strictly required)
    pub fn production() -> Self {
        Self {
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            ..Self::from_env()
        }
    }
}
