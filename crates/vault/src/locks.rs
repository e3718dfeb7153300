//! Per-alias write locks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Serializes writers of the same alias while leaving other aliases free.
#[derive(Debug, Default)]
pub(crate) struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    /// The lock guarding `alias`. The map lock is held only while looking it up.
    pub(crate) fn get(&self, alias: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(alias.to_string()).or_default())
    }

    /// Drop locks nobody is holding.
    pub(crate) fn prune(&self) {
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.lock().len()
    }
}
