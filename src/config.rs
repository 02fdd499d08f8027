use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2 cost parameters used for new hashes.
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Credentials for the admin account ensured at startup.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub admin: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "storefront-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "storefront-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_parse("PASSWORD_HASH_MEMORY_KIB").unwrap_or(defaults.memory_kib),
            iterations: env_parse("PASSWORD_HASH_ITERATIONS").unwrap_or(defaults.iterations),
            parallelism: env_parse("PASSWORD_HASH_PARALLELISM").unwrap_or(defaults.parallelism),
        };
        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminSeed {
                name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".into()),
                email,
                password,
            }),
            _ => None,
        };
        Ok(Self {
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            password,
            admin,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
