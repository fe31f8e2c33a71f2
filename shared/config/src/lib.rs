use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database pool connections (default: 10)
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// Redis connection URL for the per-tenant run lock
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Tenant lock lease TTL in seconds (default: 300 = 5 minutes)
    #[serde(default = "default_lock_ttl_seconds")]
    pub lock_ttl_seconds: u32,

    /// Whether a sale may consume lots received after the sale date (default: true = may not)
    #[serde(default = "default_require_date_guard")]
    pub require_date_guard: bool,

    /// Policy for lots uploaded with an already-known lot id: "upsert_increase_only" or "reject"
    #[serde(default = "default_lot_merge_policy")]
    pub lot_merge_policy: String,

    /// Final rounding scale for currency amounts (default: 2)
    #[serde(default = "default_monetary_scale")]
    pub monetary_scale: u32,

    /// Intermediate rounding scale for unit costs (default: 4)
    #[serde(default = "default_intermediate_scale")]
    pub intermediate_scale: u32,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_lock_ttl_seconds() -> u32 {
    300 // 5 minutes
}

fn default_require_date_guard() -> bool {
    true
}

fn default_lot_merge_policy() -> String {
    "upsert_increase_only".to_string()
}

fn default_monetary_scale() -> u32 {
    2
}

fn default_intermediate_scale() -> u32 {
    4
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .set_default("database_url", "")?
            .set_default("database_max_connections", 10)?
            .set_default("redis_url", "redis://localhost:6379")?
            .set_default("lock_ttl_seconds", 300)?
            .set_default("require_date_guard", true)?
            .set_default("lot_merge_policy", "upsert_increase_only")?
            .set_default("monetary_scale", 2)?
            .set_default("intermediate_scale", 4)?
            .add_source(config::Environment::default());

        builder.build()?.try_deserialize::<Config>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        let config = Config::from_env().expect("config should load from defaults");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.lock_ttl_seconds, 300);
        assert!(config.require_date_guard);
        assert_eq!(config.lot_merge_policy, "upsert_increase_only");
        assert_eq!(config.monetary_scale, 2);
        assert_eq!(config.intermediate_scale, 4);
    }
}
