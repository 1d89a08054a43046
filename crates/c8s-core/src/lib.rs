//! Shared taxonomy and types for the c8s pipeline reconciliation engine:
//! CRD type definitions, phase enumerations, label/annotation keys, and
//! cluster-wide defaults.

pub mod archiver;
pub mod crds;
pub mod defaults;
pub mod duration;
pub mod error;
pub mod labels;
pub mod phase;
pub mod quantity;

pub use archiver::{LogArchiver, NullArchiver};
pub use defaults::Defaults;
pub use error::{Error, ReferenceKind, Result};
pub use phase::{Condition, ConditionStatus, RunPhase, StepPhase};
