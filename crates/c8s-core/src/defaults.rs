//! Cluster-wide defaults (section 4.2, 6.1). These are overridden by
//! `OperatorConfig` at process startup (see `c8s-operator`); the constants
//! here are the fallback values a bare `Defaults::default()` carries, used
//! directly by unit tests across the pure-function crates.

#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub cpu_request: String,
    pub memory_request: String,
    pub step_timeout_seconds: u64,
    pub run_timeout_seconds: u64,
    pub job_ttl_seconds_after_finished: u32,
    pub log_ring_buffer_bytes: usize,
    pub log_subscriber_channel_depth: usize,
    pub signed_url_expiry_seconds: u64,
    pub reconcile_requeue_seconds: u64,
    pub error_requeue_seconds: u64,
    pub workspace_path: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            cpu_request: "1".to_string(),
            memory_request: "2Gi".to_string(),
            step_timeout_seconds: 30 * 60,
            run_timeout_seconds: 60 * 60,
            job_ttl_seconds_after_finished: 60 * 60,
            log_ring_buffer_bytes: 10 * 1024 * 1024,
            log_subscriber_channel_depth: 100,
            signed_url_expiry_seconds: 60 * 60,
            reconcile_requeue_seconds: 30,
            error_requeue_seconds: 15,
            workspace_path: "/workspace".to_string(),
        }
    }
}
