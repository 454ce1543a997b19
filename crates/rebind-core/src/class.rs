use std::sync::Arc;

use crate::collections::map::HashMap;
use crate::method::MethodId;
use crate::value::Implementation;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ClassId(u32);

/// Which of a class's two method tables an operation addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DispatchTable {
    /// Methods sent to instances.
    Instance,
    /// Methods sent to the class itself (the metatype).
    Class,
}

pub(crate) struct ClassEntry {
    name: Arc<str>,
    superclass: Option<ClassId>,
    instance_methods: HashMap<MethodId, Implementation>,
    class_methods: HashMap<MethodId, Implementation>,
}

impl ClassEntry {
    fn new(name: &str, superclass: Option<ClassId>) -> Self {
        Self {
            name: Arc::from(name),
            superclass,
            instance_methods: HashMap::default(),
            class_methods: HashMap::default(),
        }
    }

    fn methods(&self, table: DispatchTable) -> &HashMap<MethodId, Implementation> {
        match table {
            DispatchTable::Instance => &self.instance_methods,
            DispatchTable::Class => &self.class_methods,
        }
    }

    fn methods_mut(&mut self, table: DispatchTable) -> &mut HashMap<MethodId, Implementation> {
        match table {
            DispatchTable::Instance => &mut self.instance_methods,
            DispatchTable::Class => &mut self.class_methods,
        }
    }
}

/// Classes of one runtime, indexed by [`ClassId`].
#[derive(Default)]
pub(crate) struct ClassTable {
    classes: Vec<ClassEntry>,
}

impl ClassTable {
    pub(crate) fn define(&mut self, name: &str, superclass: Option<ClassId>) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassEntry::new(name, superclass));
        id
    }

    fn entry(&self, class: ClassId) -> Option<&ClassEntry> {
        self.classes.get(class.0 as usize)
    }

    pub(crate) fn contains(&self, class: ClassId) -> bool {
        self.entry(class).is_some()
    }

    pub(crate) fn name(&self, class: ClassId) -> Option<Arc<str>> {
        self.entry(class).map(|entry| entry.name.clone())
    }

    /// Name for diagnostics; unknown ids render as their debug form.
    pub(crate) fn display_name(&self, class: ClassId) -> String {
        self.name(class)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("{class:?}"))
    }

    pub(crate) fn superclass(&self, class: ClassId) -> Option<ClassId> {
        self.entry(class).and_then(|entry| entry.superclass)
    }

    /// Ancestors of `class`, nearest first, excluding `class` itself.
    pub(crate) fn ancestors(&self, class: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut cursor = self.superclass(class);
        while let Some(ancestor) = cursor {
            chain.push(ancestor);
            cursor = self.superclass(ancestor);
        }
        chain
    }

    pub(crate) fn direct(
        &self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
    ) -> Option<Implementation> {
        self.entry(class)
            .and_then(|entry| entry.methods(table).get(&method).cloned())
    }

    /// Walks from `class` (inclusive) to the root and returns the first class
    /// that binds `method` directly, with its current slot value.
    pub(crate) fn lookup(
        &self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
    ) -> Option<(ClassId, Implementation)> {
        let mut cursor = Some(class);
        while let Some(current) = cursor {
            let entry = self.entry(current)?;
            if let Some(imp) = entry.methods(table).get(&method) {
                return Some((current, imp.clone()));
            }
            cursor = entry.superclass;
        }
        None
    }

    /// Binds `imp` directly on `class` and returns the value it displaced.
    /// `None` means the method was previously inherited or absent.
    pub(crate) fn replace(
        &mut self,
        class: ClassId,
        table: DispatchTable,
        method: MethodId,
        imp: Implementation,
    ) -> Option<Implementation> {
        let entry = self.classes.get_mut(class.0 as usize)?;
        entry.methods_mut(table).insert(method, imp)
    }

    pub(crate) fn len(&self) -> usize {
        self.classes.len()
    }
}
