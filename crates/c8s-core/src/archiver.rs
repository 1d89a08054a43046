//! The reconciler's view of the log pipeline (component 7): a narrow trait
//! so `c8s-reconciler` can depend on "finalize a run's logs" without
//! depending on `c8s-logs`'s `opendal`/ring-buffer machinery directly. Kept
//! here, in the shared taxonomy crate, rather than in either endpoint crate,
//! since both sides need it and neither should own the other.

use async_trait::async_trait;

use crate::Error;

/// Finalizes a run's log archival as part of finalizer-driven cleanup
/// (section 4.4 step 8): flush any still-buffered output for the run's
/// steps to the object store and release the in-memory ring buffers.
#[async_trait]
pub trait LogArchiver: Send + Sync {
    async fn finalize_run(&self, namespace: &str, run_name: &str) -> Result<(), Error>;
}

/// A no-op archiver for contexts with no log pipeline wired up (unit tests,
/// or a reconciler running ahead of `c8s-logs` start-up).
pub struct NullArchiver;

#[async_trait]
impl LogArchiver for NullArchiver {
    async fn finalize_run(&self, _namespace: &str, _run_name: &str) -> Result<(), Error> {
        Ok(())
    }
}
