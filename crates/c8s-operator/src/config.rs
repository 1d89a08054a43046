//! Process-lifecycle configuration object: one `OperatorConfig`, read once at
//! start-up from environment variables, no config file, no CLI flags. Reads
//! each `C8S_*` variable with the same plain `std::env::var(...).unwrap_or_else(...)`
//! idiom a server binary's `main` would use for a database URL or executor
//! mode, rather than a derive-based CLI parser — there are no user-supplied
//! flags here, only process configuration.

use std::net::SocketAddr;
use std::time::Duration;

use c8s_core::Defaults;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub namespace: Option<String>,
    pub storage: StorageConfig,
    pub log_prefix: String,
    pub artifact_prefix: String,
    pub signed_url_expiry: Duration,
    pub log_ring_buffer_bytes: usize,
    pub log_subscriber_channel_depth: usize,
    pub defaults: Defaults,
    pub job_ttl_seconds_after_finished: u32,
    pub reconcile_requeue: Duration,
    pub error_requeue: Duration,
    pub webhook_bind_addr: SocketAddr,
    pub admission_bind_addr: SocketAddr,
    pub log_api_bind_addr: SocketAddr,
    pub log_filter: String,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_addr(key: &str, default: &str) -> SocketAddr {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| default.parse().expect("default bind address is valid"))
}

impl OperatorConfig {
    /// Read the full configuration from the process environment, falling
    /// back to the defaults named in section 6.1 for anything unset.
    pub fn from_env() -> Self {
        let defaults = Defaults::default();

        let storage = StorageConfig {
            bucket: env_string("C8S_STORAGE_BUCKET", "c8s"),
            region: env_string("C8S_STORAGE_REGION", "us-east-1"),
            endpoint: env_opt_string("C8S_STORAGE_ENDPOINT"),
            access_key: env_opt_string("C8S_STORAGE_ACCESS_KEY"),
            secret_key: env_opt_string("C8S_STORAGE_SECRET_KEY"),
        };

        OperatorConfig {
            namespace: env_opt_string("C8S_NAMESPACE"),
            storage,
            log_prefix: env_string("C8S_LOG_PREFIX", "logs"),
            artifact_prefix: env_string("C8S_ARTIFACT_PREFIX", "artifacts"),
            signed_url_expiry: Duration::from_secs(env_u64(
                "C8S_SIGNED_URL_EXPIRY_SECONDS",
                defaults.signed_url_expiry_seconds,
            )),
            log_ring_buffer_bytes: env_usize(
                "C8S_LOG_RING_BUFFER_BYTES",
                defaults.log_ring_buffer_bytes,
            ),
            log_subscriber_channel_depth: env_usize(
                "C8S_LOG_SUBSCRIBER_CHANNEL_DEPTH",
                defaults.log_subscriber_channel_depth,
            ),
            defaults: Defaults {
                cpu_request: env_string("C8S_DEFAULT_CPU_REQUEST", &defaults.cpu_request),
                memory_request: env_string(
                    "C8S_DEFAULT_MEMORY_REQUEST",
                    &defaults.memory_request,
                ),
                step_timeout_seconds: env_u64(
                    "C8S_DEFAULT_STEP_TIMEOUT_SECONDS",
                    defaults.step_timeout_seconds,
                ),
                run_timeout_seconds: env_u64(
                    "C8S_DEFAULT_RUN_TIMEOUT_SECONDS",
                    defaults.run_timeout_seconds,
                ),
                reconcile_requeue_seconds: env_u64(
                    "C8S_RECONCILE_REQUEUE_SECONDS",
                    defaults.reconcile_requeue_seconds,
                ),
                error_requeue_seconds: env_u64(
                    "C8S_ERROR_REQUEUE_SECONDS",
                    defaults.error_requeue_seconds,
                ),
                ..defaults.clone()
            },
            job_ttl_seconds_after_finished: env_u32(
                "C8S_JOB_TTL_SECONDS_AFTER_FINISHED",
                defaults.job_ttl_seconds_after_finished,
            ),
            reconcile_requeue: Duration::from_secs(env_u64(
                "C8S_RECONCILE_REQUEUE_SECONDS",
                defaults.reconcile_requeue_seconds,
            )),
            error_requeue: Duration::from_secs(env_u64(
                "C8S_ERROR_REQUEUE_SECONDS",
                defaults.error_requeue_seconds,
            )),
            webhook_bind_addr: env_addr("C8S_WEBHOOK_BIND_ADDR", "0.0.0.0:8080"),
            admission_bind_addr: env_addr("C8S_ADMISSION_BIND_ADDR", "0.0.0.0:8443"),
            log_api_bind_addr: env_addr("C8S_LOG_API_BIND_ADDR", "0.0.0.0:8081"),
            log_filter: std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("C8S_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Build the `opendal` S3-backed operator for log/artifact storage,
    /// falling back to an in-memory backend when no endpoint/credentials are
    /// configured (local/dev runs, matching `agentsphere-platform`'s e2e
    /// test-helper fallback).
    pub fn build_object_store(&self) -> anyhow::Result<opendal::Operator> {
        if self.storage.endpoint.is_none() && self.storage.access_key.is_none() {
            tracing::warn!("no object store configured, using in-memory backend");
            return Ok(opendal::Operator::new(opendal::services::Memory::default())?.finish());
        }

        let mut builder = opendal::services::S3::default()
            .bucket(&self.storage.bucket)
            .region(&self.storage.region);
        if let Some(endpoint) = &self.storage.endpoint {
            builder = builder.endpoint(endpoint);
        }
        if let Some(access_key) = &self.storage.access_key {
            builder = builder.access_key_id(access_key);
        }
        if let Some(secret_key) = &self.storage.secret_key {
            builder = builder.secret_access_key(secret_key);
        }
        Ok(opendal::Operator::new(builder)?.finish())
    }
}
