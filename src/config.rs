use anyhow::Context;
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Every variable
    /// except issuer and audience is required.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("missing required environment variable {}", key))
        };

        let database = DatabaseConfig {
            host: required("DATABASE_HOST")?,
            port: required("DATABASE_PORT")?
                .parse()
                .context("DATABASE_PORT must be a port number")?,
            user: required("DATABASE_USER")?,
            password: required("DATABASE_PASSWORD")?,
            name: required("DATABASE_NAME")?,
        };

        let jwt = JwtConfig {
            secret: required("SECRET_KEY")?,
            algorithm: required("ALGORITHM")?,
            issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "postboard".into()),
            audience: lookup("JWT_AUDIENCE").unwrap_or_else(|| "postboard-users".into()),
            ttl_minutes: required("ACCESS_TOKEN_EXPIRE_MINUTES")?
                .parse()
                .context("ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?,
        };
        anyhow::ensure!(jwt.ttl_minutes > 0, "ACCESS_TOKEN_EXPIRE_MINUTES must be positive");

        Ok(Self { database, jwt })
    }
}
