use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use once_cell::sync::Lazy;
use rebind_core::{
    implementation, ClassId, InterceptError, InterceptKey, InterceptMode, Object, Runtime,
};

use crate::event::LifecycleEvent;
use crate::observer::LifecycleObserver;
use crate::visibility::VisibilityFlags;

static SHARED: Lazy<Arc<LifecycleMulticaster>> =
    Lazy::new(|| Arc::new(LifecycleMulticaster::new()));

/// Fans every lifecycle call on the base controller class (and all of its
/// subclasses) out to a set of observers.
///
/// Observers are held weakly: the multicaster never keeps one alive, and a
/// dropped observer silently leaves the set.
pub struct LifecycleMulticaster {
    // One private key per event, indexed like `LifecycleEvent::ALL`.
    keys: [InterceptKey; LifecycleEvent::COUNT],
    observers: Mutex<Vec<Weak<dyn LifecycleObserver>>>,
    visibility: VisibilityFlags,
}

impl LifecycleMulticaster {
    pub fn new() -> Self {
        Self {
            keys: LifecycleEvent::ALL.map(|_| InterceptKey::unique()),
            observers: Mutex::new(Vec::new()),
            visibility: VisibilityFlags::new(),
        }
    }

    /// The process-wide multicaster, paired with [`Runtime::global`].
    pub fn shared() -> Arc<LifecycleMulticaster> {
        Arc::clone(&SHARED)
    }

    /// Hooks the shared multicaster into `base_class` of the global runtime.
    pub fn setup_shared(base_class: ClassId) -> Result<usize, InterceptError> {
        Self::shared().setup(&Runtime::global(), base_class)
    }

    /// Idempotency key of the interception this multicaster installs for
    /// `event`.
    ///
    /// Keys are private to the instance: a second multicaster hooks the same
    /// lineage again rather than being skipped in favor of one it cannot
    /// reach.
    pub fn intercept_key(&self, event: LifecycleEvent) -> InterceptKey {
        self.keys[event.index()]
    }

    /// Intercepts every lifecycle method of `base_class`.
    ///
    /// Safe to call repeatedly and from several subsystems: this multicaster
    /// intercepts each method at most once per lineage. Returns how many
    /// methods were newly intercepted by this call.
    pub fn setup(
        self: &Arc<Self>,
        runtime: &Runtime,
        base_class: ClassId,
    ) -> Result<usize, InterceptError> {
        let mut installed = 0;
        for event in LifecycleEvent::ALL {
            let mode = InterceptMode::OncePerClassAndAncestors(self.intercept_key(event));
            let multicaster = Arc::downgrade(self);
            let fresh = runtime.install(base_class, event.method(), mode, move |handle| {
                implementation(move |receiver, args| {
                    // The toolkit and every interceptor installed before us
                    // depend on the original running.
                    let result = handle.call_original(receiver, args);
                    if let (Some(multicaster), Some(controller)) =
                        (multicaster.upgrade(), receiver.as_object())
                    {
                        multicaster.deliver(event, controller);
                    }
                    result
                })
            })?;
            if fresh {
                installed += 1;
            }
        }
        log::debug!("lifecycle multicaster hooked {installed} methods on {base_class:?}");
        Ok(installed)
    }

    fn observers(&self) -> MutexGuard<'_, Vec<Weak<dyn LifecycleObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `observer`. Adding the same observer twice notifies it twice.
    ///
    /// Only a weak reference is kept; the caller owns the observer.
    pub fn add_observer<O: LifecycleObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        let mut observers = self.observers();
        observers.retain(|entry| entry.strong_count() > 0);
        observers.push(weak);
    }

    /// Removes every registration of `observer`.
    pub fn remove_observer<O: LifecycleObserver + 'static>(&self, observer: &Arc<O>) {
        let target = Arc::as_ptr(observer) as *const ();
        self.observers().retain(|entry| {
            entry.strong_count() > 0 && entry.as_ptr() as *const () != target
        });
    }

    pub fn observer_count(&self) -> usize {
        self.observers()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn visibility(&self) -> &VisibilityFlags {
        &self.visibility
    }

    /// Applies appearance bookkeeping for `event`, then notifies observers
    /// unless it is a repeated "did appear" within one appearance cycle.
    pub fn deliver(&self, event: LifecycleEvent, controller: &Object) {
        match event {
            LifecycleEvent::DidAppear => {
                if !self.visibility.mark_appeared(controller) {
                    log::trace!("suppressed repeated {event} for {:?}", controller.id());
                    return;
                }
            }
            LifecycleEvent::WillDisappear | LifecycleEvent::DidDisappear => {
                self.visibility.clear(controller);
            }
            _ => {}
        }
        self.notify(event, controller);
    }

    /// Calls each live observer's handler for `event`, in registration order.
    ///
    /// Works on a snapshot of the set: observers added or removed by a
    /// handler take effect from the next notification on. A handler that
    /// errors or panics is logged and skipped.
    pub fn notify(&self, event: LifecycleEvent, controller: &Object) {
        let snapshot: Vec<Arc<dyn LifecycleObserver>> = {
            let mut observers = self.observers();
            observers.retain(|entry| entry.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for (index, observer) in snapshot.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                event.deliver(observer.as_ref(), controller)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    log::warn!("lifecycle observer #{index} failed on {event}: {err}");
                }
                Err(payload) => {
                    log::error!(
                        "lifecycle observer #{index} panicked on {event}: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

impl Default for LifecycleMulticaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleMulticaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMulticaster")
            .field("observers", &self.observer_count())
            .field("visibility", &self.visibility)
            .finish()
    }
}
