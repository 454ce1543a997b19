use rebind_core::{Object, WeakKeyedTable};

/// Per-controller "has appeared" flag, stored beside the instance rather
/// than in it. Missing entries read as `false`.
#[derive(Debug, Default)]
pub struct VisibilityFlags {
    did_appear: WeakKeyedTable<bool>,
}

impl VisibilityFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn did_appear(&self, controller: &Object) -> bool {
        self.did_appear.get(controller).unwrap_or(false)
    }

    /// Sets the flag and returns true only if it was previously clear.
    pub fn mark_appeared(&self, controller: &Object) -> bool {
        !self.did_appear.replace(controller, true).unwrap_or(false)
    }

    pub fn clear(&self, controller: &Object) {
        self.did_appear.set(controller, false);
    }

    /// Controllers still alive that have a flag attached.
    pub fn tracked(&self) -> usize {
        self.did_appear.len()
    }
}
