//! Store configuration.

/// Redis store configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Prefix for every key written by the stores
    pub key_prefix: String,
    /// TTL for a day's quota counter; must outlive the UTC day
    pub quota_ttl_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "vdigest".to_string(),
            quota_ttl_secs: 172_800, // 48 hours
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: std::env::var("QUEUE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            quota_ttl_secs: std::env::var("QUOTA_KEY_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.quota_ttl_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.key_prefix, "vdigest");
        assert!(config.quota_ttl_secs > 86_400);
    }
}
