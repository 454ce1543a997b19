use rebind_core::Object;
use thiserror::Error;

/// Reported by an observer that could not handle an event. The multicaster
/// logs it and moves on to the next observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Receives lifecycle notifications for every view controller.
///
/// All handlers are optional. Each one is called after the controller's own
/// implementation of the corresponding method has run.
pub trait LifecycleObserver: Send + Sync {
    fn load_view(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }

    fn did_load(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }

    fn will_appear(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Fires every time the toolkit sends it; not deduplicated.
    fn is_appearing(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Fires once per appearance cycle even if the toolkit repeats the call.
    fn did_appear(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }

    fn will_disappear(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }

    fn did_disappear(&self, _controller: &Object) -> Result<(), ObserverError> {
        Ok(())
    }
}
