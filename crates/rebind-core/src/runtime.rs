use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};

use once_cell::sync::Lazy;

use crate::class::{ClassId, ClassTable, DispatchTable};
use crate::error::DispatchError;
use crate::method::MethodId;
use crate::object::Object;
use crate::registry::InterceptionRegistry;
use crate::value::{Implementation, Receiver, Value};

pub(crate) type RuntimeId = usize;

static NEXT_RUNTIME_ID: AtomicUsize = AtomicUsize::new(1);
static GLOBAL_RUNTIME: Lazy<Runtime> = Lazy::new(Runtime::new);

fn next_runtime_id() -> RuntimeId {
    NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed)
}

struct RuntimeInner {
    id: RuntimeId,
    classes: RwLock<ClassTable>,
    // Guards the check-record-write sequence of every install. Sends never
    // take it.
    registry: Mutex<InterceptionRegistry>,
}

/// Object model of the host: classes, their method slots and message sends.
///
/// Cloning yields another handle to the same runtime. Tests and embedders
/// construct their own with [`Runtime::new`]; code that has no runtime to be
/// handed uses [`Runtime::global`].
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                id: next_runtime_id(),
                classes: RwLock::new(ClassTable::default()),
                registry: Mutex::new(InterceptionRegistry::default()),
            }),
        }
    }

    /// The process-wide runtime. Created on first use, never torn down.
    pub fn global() -> Runtime {
        GLOBAL_RUNTIME.clone()
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn id(&self) -> RuntimeId {
        self.inner.id
    }

    // Replacements live in this runtime's own tables; a strong handle
    // inside them would keep the runtime alive forever.
    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    pub(crate) fn classes(&self) -> RwLockReadGuard<'_, ClassTable> {
        self.inner
            .classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn classes_mut(&self) -> RwLockWriteGuard<'_, ClassTable> {
        self.inner
            .classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A factory that panicked left no partial write behind: records are
    // added only after the slot swap, so the poisoned state is still valid.
    pub(crate) fn registry(&self) -> MutexGuard<'_, InterceptionRegistry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn define_class(
        &self,
        name: &str,
        superclass: Option<ClassId>,
    ) -> Result<ClassId, DispatchError> {
        let mut classes = self.classes_mut();
        if let Some(parent) = superclass {
            if !classes.contains(parent) {
                return Err(DispatchError::UnknownClass(parent));
            }
        }
        let id = classes.define(name, superclass);
        log::trace!("defined class `{name}` as {id:?} (superclass {superclass:?})");
        Ok(id)
    }

    pub fn class_name(&self, class: ClassId) -> Option<Arc<str>> {
        self.classes().name(class)
    }

    pub fn superclass(&self, class: ClassId) -> Option<ClassId> {
        self.classes().superclass(class)
    }

    /// Ancestors of `class`, nearest first.
    pub fn ancestors(&self, class: ClassId) -> Vec<ClassId> {
        self.classes().ancestors(class)
    }

    /// True if `class` is `ancestor` or inherits from it.
    pub fn is_subclass_of(&self, class: ClassId, ancestor: ClassId) -> bool {
        class == ancestor || self.ancestors(class).contains(&ancestor)
    }

    pub fn class_count(&self) -> usize {
        self.classes().len()
    }

    /// Binds `imp` directly on `class`, returning the displaced direct binding.
    ///
    /// This is how the host defines methods. It does not consult or write the
    /// interception registry and is not serialized against installs.
    pub fn add_method(
        &self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
        imp: Implementation,
    ) -> Result<Option<Implementation>, DispatchError> {
        let mut classes = self.classes_mut();
        if !classes.contains(class) {
            return Err(DispatchError::UnknownClass(class));
        }
        Ok(classes.replace(class, table, method, imp))
    }

    /// The slot bound on `class` itself, ignoring ancestors.
    pub fn direct_implementation(
        &self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
    ) -> Option<Implementation> {
        self.classes().direct(class, table, method)
    }

    /// The slot a send to `class` would run right now.
    pub fn implementation(
        &self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
    ) -> Option<Implementation> {
        self.classes()
            .lookup(class, table, method)
            .map(|(_, imp)| imp)
    }

    pub fn responds_to(&self, class: ClassId, table: DispatchTable, method: MethodId) -> bool {
        self.classes().lookup(class, table, method).is_some()
    }

    pub fn instantiate(&self, class: ClassId) -> Result<Object, DispatchError> {
        if !self.classes().contains(class) {
            return Err(DispatchError::UnknownClass(class));
        }
        Ok(Object::new(class, None))
    }

    /// Creates an instance of `class` that forwards messages it does not
    /// implement to `target`.
    pub fn instantiate_proxy(&self, class: ClassId, target: &Object) -> Result<Object, DispatchError> {
        if !self.classes().contains(class) {
            return Err(DispatchError::UnknownClass(class));
        }
        Ok(Object::new(class, Some(target.clone())))
    }

    /// The object that will actually handle `method` when sent to `object`.
    ///
    /// A proxy that implements `method` itself handles it; otherwise the
    /// forwarding chain is followed to the first target that does. When no
    /// one in the chain implements it, `object` is returned unchanged.
    pub fn real_delegate(&self, object: &Object, method: MethodId) -> Object {
        let classes = self.classes();
        let mut cursor = Some(object);
        while let Some(candidate) = cursor {
            if classes
                .lookup(candidate.class(), DispatchTable::Instance, method)
                .is_some()
            {
                return candidate.clone();
            }
            cursor = candidate.forwarding_target();
        }
        object.clone()
    }

    /// Sends `method` to `object`, following forwarding targets if needed.
    pub fn send(
        &self,
        object: &Object,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let receiver = self.real_delegate(object, method);
        let imp = self.resolve(receiver.class(), DispatchTable::Instance, method)?;
        Ok(imp(&Receiver::Object(receiver), args))
    }

    /// Sends a class-level `method` to `class`.
    pub fn send_class(
        &self,
        class: ClassId,
        method: MethodId,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let imp = self.resolve(class, DispatchTable::Class, method)?;
        Ok(imp(&Receiver::Class(class), args))
    }

    // The read guard is released before the caller invokes the slot, so
    // implementations may freely send further messages or install.
    fn resolve(
        &self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
    ) -> Result<Implementation, DispatchError> {
        let classes = self.classes();
        if !classes.contains(class) {
            return Err(DispatchError::UnknownClass(class));
        }
        classes
            .lookup(class, table, method)
            .map(|(_, imp)| imp)
            .ok_or_else(|| DispatchError::UnrecognizedSelector {
                class: classes.display_name(class),
                method: method.name().to_string(),
            })
    }
}

#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("classes", &self.class_count())
            .finish()
    }
}
