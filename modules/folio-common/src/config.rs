use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Sidecar services
    pub reader_url: String,
    pub ai_service_url: String,

    // Auth
    pub jwt_secret: String,

    // Blob storage (R2). All-or-nothing: image rehosting is disabled
    // unless every field is present.
    pub r2: Option<R2Config>,

    // Web server
    pub host: String,
    pub port: u16,

    // Worker pool
    pub worker_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct R2Config {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_name: String,
    pub public_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            reader_url: env_or("READER_URL", "http://localhost:3000"),
            ai_service_url: env_or("AI_SERVICE_URL", "http://localhost:8000"),
            jwt_secret: required_env("JWT_SECRET"),
            r2: R2Config::from_env(),
            host: env_or("HOST", "0.0.0.0"),
            port: env_or("PORT", "8080")
                .parse()
                .expect("PORT must be a number"),
            worker_concurrency: env_or("WORKER_CONCURRENCY", "10")
                .parse()
                .expect("WORKER_CONCURRENCY must be a number"),
        }
    }
}

impl R2Config {
    fn from_env() -> Option<Self> {
        let endpoint = env::var("R2_ENDPOINT").ok()?;
        let access_key = env::var("R2_ACCESS_KEY").ok()?;
        let secret_key = env::var("R2_SECRET_KEY").ok()?;
        let public_url = env::var("R2_PUBLIC_URL").ok()?;
        Some(Self {
            endpoint,
            access_key,
            secret_key,
            bucket_name: env_or("R2_BUCKET_NAME", "folio-images"),
            public_url,
        })
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| fallback.to_string())
}
