//! View-controller lifecycle notifications built on `rebind-core`.
//!
//! [`LifecycleMulticaster::setup`] intercepts each lifecycle method of the
//! host's base controller class once; from then on every controller in that
//! lineage reports its transitions to the registered [`LifecycleObserver`]s.

pub mod controller;
pub mod event;
pub mod multicaster;
pub mod observer;
pub mod visibility;

pub use controller::{define_view_controller_class, send_lifecycle, VIEW_CONTROLLER_CLASS_NAME};
pub use event::LifecycleEvent;
pub use multicaster::LifecycleMulticaster;
pub use observer::{LifecycleObserver, ObserverError};
pub use visibility::VisibilityFlags;

#[cfg(test)]
#[path = "tests/visibility_tests.rs"]
mod visibility_tests;
