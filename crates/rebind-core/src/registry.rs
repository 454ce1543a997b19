use crate::class::{ClassId, DispatchTable};
use crate::collections::map::HashSet;
use crate::method::InterceptKey;

/// Marks that an interception keyed by `key` completed on one class table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct InterceptionRecord {
    pub table: DispatchTable,
    pub class: ClassId,
    pub key: InterceptKey,
}

/// Which (class, key) pairs have been intercepted. Records are never removed.
#[derive(Default)]
pub(crate) struct InterceptionRegistry {
    records: HashSet<InterceptionRecord>,
}

impl InterceptionRegistry {
    pub(crate) fn contains(&self, table: DispatchTable, class: ClassId, key: InterceptKey) -> bool {
        self.records.contains(&InterceptionRecord { table, class, key })
    }

    /// True if `class` or any class in `ancestors` holds a record for `key`.
    pub(crate) fn contains_in_lineage(
        &self,
        table: DispatchTable,
        class: ClassId,
        ancestors: &[ClassId],
        key: InterceptKey,
    ) -> bool {
        std::iter::once(&class)
            .chain(ancestors)
            .any(|candidate| self.contains(table, *candidate, key))
    }

    pub(crate) fn record(&mut self, table: DispatchTable, class: ClassId, key: InterceptKey) {
        self.records.insert(InterceptionRecord { table, class, key });
    }

    pub(crate) fn records(&self) -> Vec<InterceptionRecord> {
        self.records.iter().copied().collect()
    }
}
