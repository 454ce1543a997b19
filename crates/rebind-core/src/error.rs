use thiserror::Error;

use crate::class::ClassId;

/// Failure to deliver a message to a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("class {0:?} is not registered with this runtime")]
    UnknownClass(ClassId),
    #[error("unrecognized selector `{method}` sent to `{class}`")]
    UnrecognizedSelector { class: String, method: String },
}

/// Contract violations reported by [`Runtime::install`](crate::Runtime::install).
///
/// None of these are transient. They indicate a programming error in the
/// installer and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterceptError {
    #[error("class {0:?} is not registered with this runtime")]
    UnknownClass(ClassId),
    #[error("method `{method}` is not implemented by `{class}` or any of its ancestors")]
    MethodNotFound { class: String, method: String },
    #[error("install called from inside an interception factory on the same runtime")]
    ReentrantInstall,
}
