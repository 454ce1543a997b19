//! Installing replacement implementations into class method slots.
//!
//! A replacement never learns "the original" at install time. It is handed a
//! [`ResolutionHandle`] and asks it, on every call, for the behavior that
//! would have run had this interception not happened:
//!
//! * if the class bound the method itself, that is exactly the value the
//!   install displaced;
//! * otherwise it is whatever the nearest ancestor binds *at call time*, so
//!   an ancestor intercepted later is still observed.
//!
//! Installs are serialized per runtime by a single lock. Calls are not.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::class::{ClassId, DispatchTable};
use crate::error::InterceptError;
use crate::method::{InterceptKey, MethodId};
use crate::registry::InterceptionRecord;
use crate::runtime::{Runtime, RuntimeId, WeakRuntime};
use crate::value::{DebugImplementation, Implementation, Receiver, Value};

/// Whether an install may be skipped because an equivalent one already ran.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InterceptMode {
    /// Always install.
    Always,
    /// Skip if this class was already intercepted with the key.
    OncePerClass(InterceptKey),
    /// Skip if this class or one of its ancestors was already intercepted
    /// with the key.
    ///
    /// Installing on a subclass first and its ancestor second performs both
    /// installs, and a call on the subclass then runs the replacement twice.
    /// Only re-installation on the same class or beneath an intercepted
    /// ancestor is deduplicated.
    OncePerClassAndAncestors(InterceptKey),
}

impl InterceptMode {
    pub fn key(&self) -> Option<InterceptKey> {
        match self {
            InterceptMode::Always => None,
            InterceptMode::OncePerClass(key) | InterceptMode::OncePerClassAndAncestors(key) => {
                Some(*key)
            }
        }
    }
}

enum Fallback {
    /// The class bound the method itself; this is what the install displaced.
    Displaced(Implementation),
    /// The class inherited the method; look it up from here at call time.
    Inherited { superclass: Option<ClassId> },
}

/// Lets an installed replacement reach the implementation it superseded.
///
/// Owned by exactly one replacement. The fallback is fixed at the moment the
/// replacement is written into its slot, before any call can observe it.
#[derive(Clone)]
pub struct ResolutionHandle {
    runtime: WeakRuntime,
    class: ClassId,
    table: DispatchTable,
    method: MethodId,
    fallback: Arc<OnceCell<Fallback>>,
}

impl ResolutionHandle {
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn table(&self) -> DispatchTable {
        self.table
    }

    /// The implementation to defer to, resolved against the current slots.
    ///
    /// # Panics
    ///
    /// When called from the factory itself, before the replacement has been
    /// installed, or after the owning runtime was dropped.
    pub fn original(&self) -> Implementation {
        let fallback = self
            .fallback
            .get()
            .expect("fallback requested before the replacement was installed");
        match fallback {
            Fallback::Displaced(imp) => imp.clone(),
            Fallback::Inherited { superclass } => {
                let runtime = self
                    .runtime
                    .upgrade()
                    .expect("runtime dropped while its replacement was still reachable");
                superclass
                    .and_then(|superclass| runtime.implementation(superclass, self.table, self.method))
                    .expect("inherited implementation vanished from the class hierarchy")
            }
        }
    }

    /// Invokes [`original`](Self::original) with the replacement's receiver
    /// and arguments.
    pub fn call_original(&self, receiver: &Receiver, args: &[Value]) -> Value {
        let original = self.original();
        original(receiver, args)
    }
}

impl fmt::Debug for ResolutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ResolutionHandle");
        debug
            .field("class", &self.class)
            .field("table", &self.table)
            .field("method", &self.method);
        match self.fallback.get() {
            Some(Fallback::Displaced(imp)) => debug.field("displaced", &DebugImplementation(imp)),
            Some(Fallback::Inherited { superclass }) => debug.field("inherited_from", superclass),
            None => debug.field("pending", &true),
        };
        debug.finish()
    }
}

thread_local! {
    static INSTALLING: RefCell<Vec<RuntimeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as inside an install on one runtime.
struct InstallScope {
    runtime: RuntimeId,
}

impl InstallScope {
    fn enter(runtime: RuntimeId) -> Result<Self, InterceptError> {
        INSTALLING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&runtime) {
                return Err(InterceptError::ReentrantInstall);
            }
            stack.push(runtime);
            Ok(InstallScope { runtime })
        })
    }
}

impl Drop for InstallScope {
    fn drop(&mut self) {
        INSTALLING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(index) = stack.iter().rposition(|id| *id == self.runtime) {
                stack.remove(index);
            }
        });
    }
}

impl Runtime {
    /// Replaces the instance method `method` of `class` with the behavior
    /// built by `factory`.
    ///
    /// Returns `Ok(false)` when `mode` says an equivalent install already
    /// happened; the slot is left untouched in that case. The factory runs
    /// under the install lock: it must not install on the same runtime and
    /// should do nothing but build the replacement.
    pub fn install<F>(
        &self,
        class: ClassId,
        method: MethodId,
        mode: InterceptMode,
        factory: F,
    ) -> Result<bool, InterceptError>
    where
        F: FnOnce(ResolutionHandle) -> Implementation,
    {
        self.install_in(DispatchTable::Instance, class, method, mode, factory)
    }

    /// Same contract as [`install`](Self::install), against the class-level
    /// method table.
    pub fn install_class_level<F>(
        &self,
        class: ClassId,
        method: MethodId,
        mode: InterceptMode,
        factory: F,
    ) -> Result<bool, InterceptError>
    where
        F: FnOnce(ResolutionHandle) -> Implementation,
    {
        self.install_in(DispatchTable::Class, class, method, mode, factory)
    }

    fn install_in<F>(
        &self,
        table: DispatchTable,
        class: ClassId,
        method: MethodId,
        mode: InterceptMode,
        factory: F,
    ) -> Result<bool, InterceptError>
    where
        F: FnOnce(ResolutionHandle) -> Implementation,
    {
        let _scope = InstallScope::enter(self.id())?;
        let mut registry = self.registry();

        let (class_name, ancestors) = {
            let classes = self.classes();
            if !classes.contains(class) {
                return Err(InterceptError::UnknownClass(class));
            }
            if classes.lookup(class, table, method).is_none() {
                return Err(InterceptError::MethodNotFound {
                    class: classes.display_name(class),
                    method: method.name().to_string(),
                });
            }
            (classes.display_name(class), classes.ancestors(class))
        };

        let already = match mode {
            InterceptMode::Always => false,
            InterceptMode::OncePerClass(key) => registry.contains(table, class, key),
            InterceptMode::OncePerClassAndAncestors(key) => {
                registry.contains_in_lineage(table, class, &ancestors, key)
            }
        };
        if already {
            log::trace!("skipped {table:?} `{method}` on `{class_name}`: {mode:?} already applied");
            return Ok(false);
        }

        let fallback = Arc::new(OnceCell::new());
        let handle = ResolutionHandle {
            runtime: self.downgrade(),
            class,
            table,
            method,
            fallback: Arc::clone(&fallback),
        };
        let replacement = factory(handle);

        let displaced = {
            let mut classes = self.classes_mut();
            let displaced = classes.replace(class, table, method, replacement);
            // Set while the write guard is held: no send can reach the new
            // slot before its fallback is known.
            let resolved = match displaced {
                Some(imp) => Fallback::Displaced(imp),
                None => Fallback::Inherited {
                    superclass: ancestors.first().copied(),
                },
            };
            let displaced = matches!(resolved, Fallback::Displaced(_));
            let first_write = fallback.set(resolved).is_ok();
            debug_assert!(
                first_write,
                "fallback is only written by the install that created it"
            );
            displaced
        };

        if let Some(key) = mode.key() {
            registry.record(table, class, key);
        }
        log::debug!(
            "intercepted {table:?} `{method}` on `{class_name}` ({mode:?}, {})",
            if displaced { "displaced own binding" } else { "was inherited" }
        );
        Ok(true)
    }

    /// True if an install keyed by `key` completed on exactly `class`.
    ///
    /// Takes the install lock, so it must not be called from a factory.
    pub fn is_intercepted(&self, class: ClassId, table: DispatchTable, key: InterceptKey) -> bool {
        self.registry().contains(table, class, key)
    }

    /// Every interception record written so far, in no particular order.
    pub fn interception_records(&self) -> Vec<InterceptionRecord> {
        self.registry().records()
    }
}
