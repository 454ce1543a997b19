use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rebind_core::{implementation, DispatchTable, Object, Runtime, Value};
use rebind_lifecycle::{
    define_view_controller_class, send_lifecycle, LifecycleEvent, LifecycleMulticaster,
    LifecycleObserver, ObserverError,
};

/// Logs every transition it hears about.
struct LoggingObserver {
    runtime: Runtime,
}

impl LoggingObserver {
    fn log(&self, event: LifecycleEvent, controller: &Object) -> Result<(), ObserverError> {
        let class = self
            .runtime
            .class_name(controller.class())
            .ok_or_else(|| ObserverError::new("controller class is not registered"))?;
        log::info!("{class} {:?}: {event}", controller.id());
        Ok(())
    }
}

impl LifecycleObserver for LoggingObserver {
    fn load_view(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::LoadView, controller)
    }

    fn did_load(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::DidLoad, controller)
    }

    fn will_appear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::WillAppear, controller)
    }

    fn is_appearing(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::IsAppearing, controller)
    }

    fn did_appear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::DidAppear, controller)
    }

    fn will_disappear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::WillDisappear, controller)
    }

    fn did_disappear(&self, controller: &Object) -> Result<(), ObserverError> {
        self.log(LifecycleEvent::DidDisappear, controller)
    }
}

/// Counts screen views, the way an analytics collector would.
#[derive(Default)]
struct ScreenViewCounter {
    views: AtomicUsize,
}

impl LifecycleObserver for ScreenViewCounter {
    fn did_appear(&self, _controller: &Object) -> Result<(), ObserverError> {
        self.views.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let runtime = Runtime::global();
    let base = define_view_controller_class(&runtime, None)?;

    // A host screen with its own appearance logic that calls up to the base.
    let settings = runtime.define_class("SettingsController", Some(base))?;
    let did_appear = LifecycleEvent::DidAppear.method();
    let host = runtime.clone();
    runtime.add_method(
        settings,
        DispatchTable::Instance,
        did_appear,
        implementation(move |receiver, args| {
            log::debug!("SettingsController refreshing its rows");
            host.implementation(base, DispatchTable::Instance, did_appear)
                .map_or(Value::Unit, |inherited| inherited(receiver, args))
        }),
    )?;

    let hooked = LifecycleMulticaster::setup_shared(base)?;
    let again = LifecycleMulticaster::setup_shared(base)?;
    println!("hooked {hooked} lifecycle methods (second setup hooked {again})");

    let multicaster = LifecycleMulticaster::shared();
    let logger = Arc::new(LoggingObserver {
        runtime: runtime.clone(),
    });
    let counter = Arc::new(ScreenViewCounter::default());
    multicaster.add_observer(&logger);
    multicaster.add_observer(&counter);

    let screen = runtime.instantiate(settings)?;
    for event in [
        LifecycleEvent::LoadView,
        LifecycleEvent::DidLoad,
        LifecycleEvent::WillAppear,
        LifecycleEvent::IsAppearing,
        LifecycleEvent::DidAppear,
        // Some containers send this twice; only the first is reported.
        LifecycleEvent::DidAppear,
        LifecycleEvent::WillDisappear,
        LifecycleEvent::DidDisappear,
        LifecycleEvent::WillAppear,
        LifecycleEvent::DidAppear,
    ] {
        send_lifecycle(&runtime, &screen, event, true)?;
    }

    println!(
        "screen views recorded: {}",
        counter.views.load(Ordering::Relaxed)
    );
    multicaster.remove_observer(&logger);
    multicaster.remove_observer(&counter);
    Ok(())
}

fn main() {
    env_logger::init();

    println!("=== Rebind Lifecycle Demo ===");
    println!("Set RUST_LOG=debug to see each interception and notification.");

    if let Err(err) = run() {
        log::error!("lifecycle demo failed: {err}");
        std::process::exit(1);
    }
}
