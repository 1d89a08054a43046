//! Label and annotation key constants shared by the mapper, reconciler, and
//! store so that no component hand-rolls a key string.

pub const MANAGED_BY: &str = "c8s.dev/managed-by";
pub const MANAGED_BY_VALUE: &str = "c8s";

pub const LABEL_PIPELINE_CONFIG: &str = "c8s.dev/pipeline-config";
pub const LABEL_PIPELINE_RUN: &str = "c8s.dev/pipeline-run";
pub const LABEL_STEP: &str = "c8s.dev/step";
pub const LABEL_COMMIT: &str = "c8s.dev/commit";
pub const LABEL_BRANCH: &str = "c8s.dev/branch";
pub const LABEL_MATRIX_PARENT: &str = "c8s.dev/matrix-parent";
pub const LABEL_REPOSITORY_CONNECTION: &str = "c8s.dev/repository-connection";

/// Matrix dimension labels are namespaced as `c8s.dev/matrix-<dimension>`.
pub fn matrix_dimension_label(dimension: &str) -> String {
    format!("c8s.dev/matrix-{dimension}")
}

pub const ANNOTATION_COMMIT_MESSAGE: &str = "c8s.dev/commit-message";
pub const ANNOTATION_AUTHOR: &str = "c8s.dev/author";
pub const ANNOTATION_TRIGGERED_BY: &str = "c8s.dev/triggered-by";
pub const ANNOTATION_LOG_URL: &str = "c8s.dev/log-url";
pub const ANNOTATION_ARTIFACT_URL_PREFIX: &str = "c8s.dev/artifact-url";
pub const ANNOTATION_CLONE_URL: &str = "c8s.dev/clone-url";

/// Set on a PipelineRun to request cancellation (section 4.4).
pub const ANNOTATION_CANCEL: &str = "c8s.dev/cancel";

pub const FINALIZER_CLEANUP: &str = "c8s.dev/cleanup";

/// Environment variable names injected by the workload mapper for run
/// identity (section 4.2).
pub mod env_vars {
    pub const COMMIT: &str = "C8S_COMMIT";
    pub const BRANCH: &str = "C8S_BRANCH";
    pub const RUN_NAME: &str = "C8S_RUN_NAME";
    pub const STEP_NAME: &str = "C8S_STEP_NAME";
    pub const WORKSPACE: &str = "C8S_WORKSPACE";
    pub const NAMESPACE: &str = "C8S_NAMESPACE";
}
