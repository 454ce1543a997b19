use std::fmt;
use std::sync::{Arc, Weak};

use crate::class::ClassId;

/// Identity of a live instance. Only meaningful while the instance is alive;
/// the address may be reused afterwards.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct ObjectId(usize);

impl ObjectId {
    fn of(inner: &Arc<ObjectInner>) -> Self {
        ObjectId(Arc::as_ptr(inner) as *const () as usize)
    }
}

struct ObjectInner {
    class: ClassId,
    forwarding_target: Option<Object>,
}

/// An instance of a runtime class. Cloning shares the instance.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

impl Object {
    pub(crate) fn new(class: ClassId, forwarding_target: Option<Object>) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                class,
                forwarding_target,
            }),
        }
    }

    pub fn class(&self) -> ClassId {
        self.inner.class
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::of(&self.inner)
    }

    /// The object messages are forwarded to when this instance is a proxy.
    pub fn forwarding_target(&self) -> Option<&Object> {
        self.inner.forwarding_target.as_ref()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakObject {
        WeakObject {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("class", &self.inner.class)
            .field("proxy", &self.inner.forwarding_target.is_some())
            .finish()
    }
}

/// Non-owning reference to an [`Object`].
#[derive(Clone)]
pub struct WeakObject {
    inner: Weak<ObjectInner>,
}

impl WeakObject {
    pub fn upgrade(&self) -> Option<Object> {
        self.inner.upgrade().map(|inner| Object { inner })
    }

    /// True when `object` is the instance this reference was taken from.
    pub fn refers_to(&self, object: &Object) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&object.inner))
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObject")
            .field("alive", &self.is_alive())
            .finish()
    }
}
