//! Process-global identifiers for methods and interception keys.
//!
//! Both are interned: the same name always yields the same token no matter
//! which runtime, class or thread asks for it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use indexmap::IndexSet;
use once_cell::sync::Lazy;

struct Interner {
    names: Mutex<IndexSet<Arc<str>>>,
}

impl Interner {
    fn new() -> Self {
        Self {
            names: Mutex::new(IndexSet::new()),
        }
    }

    fn intern(&self, name: &str) -> u32 {
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = names.get_index_of(name) {
            return index as u32;
        }
        let (index, _) = names.insert_full(Arc::from(name));
        index as u32
    }

    fn resolve(&self, index: u32) -> Arc<str> {
        let names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        names
            .get_index(index as usize)
            .cloned()
            .expect("interned index issued by this interner")
    }
}

static METHOD_NAMES: Lazy<Interner> = Lazy::new(Interner::new);
static KEY_NAMES: Lazy<Interner> = Lazy::new(Interner::new);
static NEXT_UNIQUE_KEY: AtomicU64 = AtomicU64::new(1);

/// Names a method independently of the class that defines it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    pub fn named(name: &str) -> Self {
        MethodId(METHOD_NAMES.intern(name))
    }

    pub fn name(self) -> Arc<str> {
        METHOD_NAMES.resolve(self.0)
    }
}

impl fmt::Debug for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodId({})", self.name())
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum KeyRepr {
    Named(u32),
    Unique(u64),
}

/// Caller-chosen token used to detect that an interception already happened.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterceptKey(KeyRepr);

impl InterceptKey {
    /// Keys with equal names are equal, so independent call sites can agree
    /// on a key without sharing a value.
    pub fn named(name: &str) -> Self {
        InterceptKey(KeyRepr::Named(KEY_NAMES.intern(name)))
    }

    /// A key no other call to `unique` or `named` will ever produce.
    pub fn unique() -> Self {
        InterceptKey(KeyRepr::Unique(
            NEXT_UNIQUE_KEY.fetch_add(1, Ordering::Relaxed),
        ))
    }
}

impl fmt::Debug for InterceptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            KeyRepr::Named(index) => write!(f, "InterceptKey({})", KEY_NAMES.resolve(index)),
            KeyRepr::Unique(id) => write!(f, "InterceptKey(#{id})"),
        }
    }
}
