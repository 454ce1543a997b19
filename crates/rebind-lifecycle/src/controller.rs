//! The host toolkit's base view-controller type.
//!
//! Real hosts bring their own class; this one exists so the multicaster can
//! be embedded in hosts (and tests) that have no controller hierarchy yet.

use rebind_core::{
    implementation, ClassId, DispatchError, DispatchTable, Object, Runtime, Value,
};

use crate::event::LifecycleEvent;

pub const VIEW_CONTROLLER_CLASS_NAME: &str = "ViewController";

/// Defines the base controller class with a no-op binding for every
/// lifecycle method.
pub fn define_view_controller_class(
    runtime: &Runtime,
    superclass: Option<ClassId>,
) -> Result<ClassId, DispatchError> {
    let class = runtime.define_class(VIEW_CONTROLLER_CLASS_NAME, superclass)?;
    for event in LifecycleEvent::ALL {
        runtime.add_method(
            class,
            DispatchTable::Instance,
            event.method(),
            implementation(|_, _| Value::Unit),
        )?;
    }
    Ok(class)
}

/// Sends the lifecycle method for `event` to `controller` the way the
/// toolkit would.
pub fn send_lifecycle(
    runtime: &Runtime,
    controller: &Object,
    event: LifecycleEvent,
    animated: bool,
) -> Result<Value, DispatchError> {
    if event.takes_animated_flag() {
        runtime.send(controller, event.method(), &[Value::Bool(animated)])
    } else {
        runtime.send(controller, event.method(), &[])
    }
}
