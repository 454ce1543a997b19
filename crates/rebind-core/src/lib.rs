#![doc = r"Runtime method interception for Rebind: a portable class/method-slot object model and the engine that substitutes implementations in it."]

pub mod associations;
pub mod class;
pub mod collections;
pub mod error;
pub mod interceptor;
pub mod method;
pub mod object;
pub mod registry;
pub mod runtime;
pub mod value;

pub use associations::WeakKeyedTable;
pub use class::{ClassId, DispatchTable};
pub use error::{DispatchError, InterceptError};
pub use interceptor::{InterceptMode, ResolutionHandle};
pub use method::{InterceptKey, MethodId};
pub use object::{Object, ObjectId, WeakObject};
pub use registry::InterceptionRecord;
pub use runtime::Runtime;
pub use value::{implementation, Implementation, Receiver, Value};

#[cfg(test)]
#[path = "tests/interceptor_tests.rs"]
mod interceptor_tests;

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod runtime_tests;
