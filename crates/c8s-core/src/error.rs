//! Shared error taxonomy for the c8s pipeline engine.

use thiserror::Error;

/// What kind of reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    PipelineConfig(String),
    RepositoryConnection(String),
    Secret(String),
    SecretKey { secret: String, key: String },
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::PipelineConfig(name) => write!(f, "PipelineConfig {name}"),
            ReferenceKind::RepositoryConnection(name) => write!(f, "RepositoryConnection {name}"),
            ReferenceKind::Secret(name) => write!(f, "Secret {name}"),
            ReferenceKind::SecretKey { secret, key } => write!(f, "key {key} in Secret {secret}"),
        }
    }
}

/// The one error type shared by every c8s crate.
///
/// The DAG builder, mapper, and projector are pure functions and only ever
/// produce `Validation`; the reconciler additionally produces everything else.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("reference not found: {0}")]
    Reference(ReferenceKind),

    #[error("quota exceeded for {resource}: requested over available by {deficit}")]
    Quota { resource: String, deficit: String },

    #[error("auth: {0}")]
    Auth(String),

    #[error("optimistic concurrency conflict")]
    Conflict,

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("fatal I/O error: {0}")]
    FatalIo(String),

    #[error("run was cancelled")]
    UserCancelled,
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Whether this error should keep the object in `Pending` (validation,
    /// reference, quota) rather than be treated as retryable infrastructure
    /// failure.
    pub fn is_surfaceable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Reference(_) | Error::Quota { .. }
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo(_) | Error::Conflict)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classify a `kube::Error` into one of our error kinds. Connection resets,
/// timeouts, and 5xx responses are transient; 409s are conflicts; everything
/// else that escapes the cluster client is treated as fatal, since a
/// malformed request against a well-formed client is a programming error
/// the caller cannot recover from by retrying.
impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        if let kube::Error::Api(resp) = &err {
            return match resp.code {
                409 => Error::Conflict,
                404 => Error::Reference(ReferenceKind::PipelineConfig(resp.reason.clone())),
                code if code >= 500 => Error::TransientIo(resp.message.clone()),
                _ => Error::FatalIo(resp.message.clone()),
            };
        }
        // Everything that isn't a structured API response (transport resets,
        // timeouts, TLS handshake failures) is treated as transient: the
        // reconciler's requeue-with-backoff loop is the right place to
        // absorb these, not a terminal Failed.
        Error::TransientIo(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(err.to_string())
    }
}
