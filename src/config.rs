//! Recognized configuration surface (spec §6). A plain struct constructed
//! once at process start and threaded through the composition root, the
//! same way the teacher threads its `Context` rather than reaching for a
//! global. No config-file crate is introduced: every key here is read from
//! the environment, with typed defaults.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub worker_general_pool_size: usize,
    pub worker_k8s_pool_size: usize,
    pub k8s_operation_timeout: Duration,
    pub k8s_cluster_concurrency: usize,
    pub notification_retention_days: i64,
    pub vnc_token_ttl: Duration,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        EngineConfig {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/vmgov".to_string()),
            worker_general_pool_size: read_usize("WORKER_GENERAL_POOL_SIZE", 16),
            worker_k8s_pool_size: read_usize("WORKER_K8S_POOL_SIZE", 8),
            k8s_operation_timeout: Duration::from_secs(read_u64("K8S_OPERATION_TIMEOUT_SECS", 60)),
            k8s_cluster_concurrency: read_usize("K8S_CLUSTER_CONCURRENCY", 4),
            notification_retention_days: read_u64("NOTIFICATION_RETENTION_DAYS", 90) as i64,
            vnc_token_ttl: Duration::from_secs(read_u64("VNC_TOKEN_TTL_SECS", 300)),
        }
    }
}

fn read_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn read_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::from_env()
    }
}

/// Default platform rate-limit caps (C12), overridable per-user in the
/// `rate_limit_overrides` table.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDefaults {
    pub max_open_parent_batches: u32,
    pub max_open_child_tickets: u32,
    pub min_submission_cooldown: Duration,
}

impl Default for RateLimitDefaults {
    fn default() -> Self {
        RateLimitDefaults {
            max_open_parent_batches: 3,
            max_open_child_tickets: 50,
            min_submission_cooldown: Duration::from_secs(2),
        }
    }
}
