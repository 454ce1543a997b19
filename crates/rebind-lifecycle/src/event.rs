use std::fmt;

use rebind_core::{MethodId, Object};

use crate::observer::{LifecycleObserver, ObserverError};

/// Well-known points in a view controller's life that observers can hear about.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LifecycleEvent {
    LoadView,
    DidLoad,
    WillAppear,
    IsAppearing,
    DidAppear,
    WillDisappear,
    DidDisappear,
}

impl LifecycleEvent {
    pub const COUNT: usize = 7;

    /// Every event, in the order a controller first goes through them.
    pub const ALL: [LifecycleEvent; Self::COUNT] = [
        LifecycleEvent::LoadView,
        LifecycleEvent::DidLoad,
        LifecycleEvent::WillAppear,
        LifecycleEvent::IsAppearing,
        LifecycleEvent::DidAppear,
        LifecycleEvent::WillDisappear,
        LifecycleEvent::DidDisappear,
    ];

    /// Position of `self` in [`ALL`](Self::ALL).
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Selector the host toolkit sends for this event.
    pub fn selector(self) -> &'static str {
        match self {
            LifecycleEvent::LoadView => "loadView",
            LifecycleEvent::DidLoad => "viewDidLoad",
            LifecycleEvent::WillAppear => "viewWillAppear:",
            LifecycleEvent::IsAppearing => "viewIsAppearing:",
            LifecycleEvent::DidAppear => "viewDidAppear:",
            LifecycleEvent::WillDisappear => "viewWillDisappear:",
            LifecycleEvent::DidDisappear => "viewDidDisappear:",
        }
    }

    pub fn method(self) -> MethodId {
        MethodId::named(self.selector())
    }

    /// Appearance transitions carry an `animated` flag; loading does not.
    pub fn takes_animated_flag(self) -> bool {
        !matches!(self, LifecycleEvent::LoadView | LifecycleEvent::DidLoad)
    }

    pub(crate) fn deliver(
        self,
        observer: &dyn LifecycleObserver,
        controller: &Object,
    ) -> Result<(), ObserverError> {
        match self {
            LifecycleEvent::LoadView => observer.load_view(controller),
            LifecycleEvent::DidLoad => observer.did_load(controller),
            LifecycleEvent::WillAppear => observer.will_appear(controller),
            LifecycleEvent::IsAppearing => observer.is_appearing(controller),
            LifecycleEvent::DidAppear => observer.did_appear(controller),
            LifecycleEvent::WillDisappear => observer.will_disappear(controller),
            LifecycleEvent::DidDisappear => observer.did_disappear(controller),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}
