pub mod pipeline_config;
pub mod pipeline_run;
pub mod repository_connection;

pub use pipeline_config::{
    Conditional, MatrixSpec, PipelineConfig, PipelineConfigSpec, PipelineConfigStatus,
    ResourceRequirements, RetryPolicy, SecretRef, Step,
};
pub use pipeline_run::{
    PipelineRun, PipelineRunSpec, PipelineRunStatus, ResourceUsage, StepStatus,
};
pub use repository_connection::{
    GitProvider, RepositoryConnection, RepositoryConnectionSpec, RepositoryConnectionStatus,
};
