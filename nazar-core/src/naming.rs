//! Unique, human-readable operation names.
//!
//! Base names follow the member: `new` for constructors, the method name
//! for methods, `get_x`, `set_x` and `inject_x` for field operations. When
//! two operations of a bean share a base name, later ones (by id) get a
//! `#2`, `#3`, ... suffix.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::bean::Bean;
use crate::operation::{AccessMode, Operation, OperationId};

fn base_name(operation: &Operation) -> String {
    let member = operation.member_name();
    match operation.mode() {
        AccessMode::Construct => "new".to_string(),
        AccessMode::Invoke => member.to_string(),
        AccessMode::Get => format!("get_{member}"),
        AccessMode::Set => format!("set_{member}"),
        AccessMode::Inject => format!("inject_{member}"),
    }
}

pub(crate) fn assign_names(operations: &[Operation]) -> BTreeMap<OperationId, String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut names = BTreeMap::new();

    for operation in operations {
        let base = base_name(operation);
        let mut name = base.clone();
        let mut suffix = 2;
        while !used.insert(name.clone()) {
            name = format!("{base}#{suffix}");
            suffix += 1;
        }
        names.insert(operation.id(), name);
    }
    names
}

impl Bean {
    /// Names of all operations, keyed by id.
    ///
    /// Cached; the cache is rebuilt when the operation count changed since
    /// it was computed.
    pub fn operation_names(&self) -> Arc<BTreeMap<OperationId, String>> {
        let mut cache = self.names.lock();
        if let Some(names) = cache.as_ref() {
            if names.len() == self.operations.len() {
                return Arc::clone(names);
            }
        }

        let names = Arc::new(assign_names(&self.operations));
        *cache = Some(Arc::clone(&names));
        names
    }

    /// The name of one operation.
    pub fn operation_name(&self, id: OperationId) -> Option<String> {
        self.operation_names().get(&id).cloned()
    }
}
