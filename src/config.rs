use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Absent means recipes and users live in memory.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    /// Absent means images are kept in memory.
    pub storage: Option<StorageConfig>,
    pub host: String,
    pub port: u16,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: var_or("JWT_ISSUER", "recipeshare"),
            audience: var_or("JWT_AUDIENCE", "recipeshare-users"),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let storage = std::env::var("MINIO_ENDPOINT")
            .ok()
            .map(|endpoint| -> anyhow::Result<StorageConfig> {
                Ok(StorageConfig {
                    endpoint,
                    bucket: var_or("MINIO_BUCKET", "recipes"),
                    access_key: std::env::var("MINIO_ACCESS_KEY")?,
                    secret_key: std::env::var("MINIO_SECRET_KEY")?,
                    region: var_or("MINIO_REGION", "us-east-1"),
                })
            })
            .transpose()?;

        Ok(Self {
            database_url,
            jwt,
            storage,
            host: var_or("APP_HOST", "0.0.0.0"),
            port: parse_or("APP_PORT", 8080),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            storage: None,
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}
