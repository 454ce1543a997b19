use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rebind_core::{
    implementation, ClassId, DispatchError, DispatchTable, Object, ObjectId, Runtime, Value,
};
use rebind_lifecycle::{
    define_view_controller_class, send_lifecycle, LifecycleEvent, LifecycleObserver,
    ObserverError,
};

/// A private runtime with the base controller class already defined.
pub struct ControllerFixture {
    pub runtime: Runtime,
    pub base: ClassId,
}

impl ControllerFixture {
    pub fn new() -> Self {
        let runtime = Runtime::new();
        let base = define_view_controller_class(&runtime, None)
            .expect("base controller class is defined on a fresh runtime");
        Self { runtime, base }
    }

    pub fn subclass(&self, name: &str, superclass: ClassId) -> ClassId {
        self.runtime
            .define_class(name, Some(superclass))
            .expect("superclass belongs to this runtime")
    }

    /// Overrides `event` on `class` with a binding that appends `tag` to
    /// `trace` and then calls up to the inherited implementation.
    pub fn override_recording(
        &self,
        class: ClassId,
        event: LifecycleEvent,
        tag: &'static str,
        trace: &CallTrace,
    ) {
        let superclass = self
            .runtime
            .superclass(class)
            .expect("overrides are added to subclasses");
        let method = event.method();
        // Holds the runtime strongly; fixtures live for a single test.
        let runtime = self.runtime.clone();
        let trace = trace.clone();
        self.runtime
            .add_method(
                class,
                DispatchTable::Instance,
                method,
                implementation(move |receiver, args| {
                    trace.push(tag);
                    runtime
                        .implementation(superclass, DispatchTable::Instance, method)
                        .map_or(Value::Unit, |inherited| inherited(receiver, args))
                }),
            )
            .expect("class belongs to this runtime");
    }

    pub fn controller(&self, class: ClassId) -> Object {
        self.runtime
            .instantiate(class)
            .expect("class belongs to this runtime")
    }

    pub fn send(
        &self,
        controller: &Object,
        event: LifecycleEvent,
    ) -> Result<Value, DispatchError> {
        send_lifecycle(&self.runtime, controller, event, true)
    }

    /// Sends `events` in order, stopping at the first dispatch failure.
    pub fn drive(
        &self,
        controller: &Object,
        events: &[LifecycleEvent],
    ) -> Result<(), DispatchError> {
        for &event in events {
            self.send(controller, event)?;
        }
        Ok(())
    }

    pub fn present(&self, controller: &Object) -> Result<(), DispatchError> {
        self.drive(controller, PRESENT)
    }

    pub fn dismiss(&self, controller: &Object) -> Result<(), DispatchError> {
        self.drive(controller, DISMISS)
    }
}

impl Default for ControllerFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Load followed by the full appearance sequence.
pub const PRESENT: &[LifecycleEvent] = &[
    LifecycleEvent::LoadView,
    LifecycleEvent::DidLoad,
    LifecycleEvent::WillAppear,
    LifecycleEvent::IsAppearing,
    LifecycleEvent::DidAppear,
];

pub const DISMISS: &[LifecycleEvent] = &[
    LifecycleEvent::WillDisappear,
    LifecycleEvent::DidDisappear,
];

/// Shared, ordered log of tags pushed by test bindings.
#[derive(Clone, Default)]
pub struct CallTrace {
    entries: Arc<Mutex<Vec<&'static str>>>,
}

impl CallTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, tag: &'static str) {
        self.lock().push(tag);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<&'static str>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Observer that records every notification it receives, optionally
/// tagging a shared [`CallTrace`] so ordering across observers is visible.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(LifecycleEvent, ObjectId)>>,
    trace: Option<(CallTrace, &'static str)>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn tagged(tag: &'static str, trace: &CallTrace) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            trace: Some((trace.clone(), tag)),
        })
    }

    pub fn events(&self) -> Vec<(LifecycleEvent, ObjectId)> {
        self.lock().clone()
    }

    /// Events received for `controller`, in order.
    pub fn events_for(&self, controller: &Object) -> Vec<LifecycleEvent> {
        let id = controller.id();
        self.lock()
            .iter()
            .filter(|(_, object)| *object == id)
            .map(|(event, _)| *event)
            .collect()
    }

    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.lock().iter().filter(|(seen, _)| *seen == event).count()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(LifecycleEvent, ObjectId)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, event: LifecycleEvent, controller: &Object) -> Result<(), ObserverError> {
        self.lock().push((event, controller.id()));
        if let Some((trace, tag)) = &self.trace {
            trace.push(tag);
        }
        Ok(())
    }
}

impl LifecycleObserver for RecordingObserver {
    fn load_view(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::LoadView, controller)
    }

    fn did_load(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::DidLoad, controller)
    }

    fn will_appear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::WillAppear, controller)
    }

    fn is_appearing(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::IsAppearing, controller)
    }

    fn did_appear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::DidAppear, controller)
    }

    fn will_disappear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::WillDisappear, controller)
    }

    fn did_disappear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.record(LifecycleEvent::DidDisappear, controller)
    }
}

/// How a [`FaultyObserver`] misbehaves.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fault {
    Error,
    Panic,
}

/// Observer that fails on every "will appear" notification.
pub struct FaultyObserver {
    fault: Fault,
}

impl FaultyObserver {
    pub fn new(fault: Fault) -> Arc<Self> {
        Arc::new(Self { fault })
    }
}

impl LifecycleObserver for FaultyObserver {
    fn will_appear(&self, _controller: &Object) -> Result<(), ObserverError> {
        match self.fault {
            Fault::Error => Err(ObserverError::new("observer refused will-appear")),
            Fault::Panic => panic!("observer blew up on will-appear"),
        }
    }
}
