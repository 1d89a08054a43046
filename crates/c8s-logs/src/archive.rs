//! Archive phase (section 4.7): on finalizer-driven cleanup, every step
//! pipeline still tracked for the run gets its buffered bytes uploaded to
//! the object store and its registry entry dropped. Implements
//! `c8s_core::LogArchiver`, the narrow trait the reconciler depends on.
//!
//! Grounds the `opendal::Operator::write` call on
//! `agentsphere-platform::src/pipeline/executor.rs`'s `state.minio.write(...)`
//! use, and the layout on section 6's `{log-prefix}/{namespace}/{run}/{step}.log`.

use std::sync::Arc;

use async_trait::async_trait;
use c8s_core::{Error, LogArchiver};
use opendal::Operator;
use tracing::{info, warn};

use crate::pipeline::LogRegistry;

pub struct ObjectStoreArchiver {
    registry: Arc<LogRegistry>,
    operator: Operator,
    log_prefix: String,
}

impl ObjectStoreArchiver {
    pub fn new(registry: Arc<LogRegistry>, operator: Operator, log_prefix: impl Into<String>) -> Self {
        ObjectStoreArchiver {
            registry,
            operator,
            log_prefix: log_prefix.into(),
        }
    }
}

#[async_trait]
impl LogArchiver for ObjectStoreArchiver {
    /// Best-effort by design (section 7: "log archival runs opportunistically
    /// so that logs for steps that did start remain retrievable") — one
    /// step's upload failure doesn't block the others, and the overall
    /// cleanup action never fails because of it.
    async fn finalize_run(&self, namespace: &str, run_name: &str) -> Result<(), Error> {
        for (key, pipeline) in self.registry.steps_for_run(namespace, run_name) {
            let step = &key.2;
            let path = archive_key(&self.log_prefix, namespace, run_name, step);
            let bytes = pipeline.snapshot();
            match self.operator.write(&path, bytes).await {
                Ok(()) => {
                    info!(namespace, run = run_name, step, path, "archived step log");
                    self.registry.remove(&key);
                }
                Err(err) => {
                    warn!(namespace, run = run_name, step, error = %err, "failed to archive step log");
                }
            }
        }
        Ok(())
    }
}

pub fn archive_key(log_prefix: &str, namespace: &str, run: &str, step: &str) -> String {
    format!("{log_prefix}/{namespace}/{run}/{step}.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_layout_from_section_6() {
        assert_eq!(archive_key("logs", "ci", "build-1", "test"), "logs/ci/build-1/test.log");
    }
}
