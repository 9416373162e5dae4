// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

/// Something that can be silenced in bulk.
pub trait Shutdown: Send + Sync {
    /// Stops everything this object has sounding or scheduled.
    fn shutdown(&self);

    /// A name for logging.
    fn name(&self) -> String;
}

/// Identifies a registration so that it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

/// The set of live samples and playbacks owned by a performance. Objects register themselves
/// on construction; [`Registry::shutdown_all`] stops every one that is still alive.
///
/// Only weak references are held, so the registry never keeps anything alive.
pub struct Registry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(RegistrationId, Weak<dyn Shutdown>)>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Adds an object to the registry. Entries whose objects have been dropped are pruned, so
    /// only register objects that are fully constructed.
    pub fn register(&self, entry: Weak<dyn Shutdown>) -> RegistrationId {
        let id = self.reserve();
        self.register_as(id, entry);
        id
    }

    /// Hands out an id ahead of registration, for objects that store their own id.
    pub(crate) fn reserve(&self) -> RegistrationId {
        RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register_as(&self, id: RegistrationId, entry: Weak<dyn Shutdown>) {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(_, weak)| weak.strong_count() > 0);
        if entries.len() != before {
            debug!(pruned = before - entries.len(), "Pruned dropped registrations");
        }
        entries.push((id, entry));
    }

    /// Removes an object from the registry. Returns false if it wasn't registered.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Returns the number of registered objects that are still alive.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Returns true if nothing alive is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shuts down every live object and empties the registry.
    pub fn shutdown_all(&self) {
        // Taken out of the lock first so that shutdown can unregister without deadlocking.
        let entries = std::mem::take(&mut *self.entries.lock());
        let mut count = 0;
        for (_, weak) in entries {
            if let Some(entry) = weak.upgrade() {
                debug!(name = entry.name(), "Shutting down");
                entry.shutdown();
                count += 1;
            }
        }
        info!(count, "Shut down registered objects");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.len())
            .finish()
    }
}

/// Builds an object around a reserved id and registers it once it exists.
pub(crate) fn register_new<T: Shutdown + 'static>(
    registry: &Registry,
    build: impl FnOnce(RegistrationId) -> Arc<T>,
) -> Arc<T> {
    let id = registry.reserve();
    let entry = build(id);
    let weak: Weak<dyn Shutdown> = Arc::downgrade(&entry) as Weak<T>;
    registry.register_as(id, weak);
    entry
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    struct Counter {
        shutdowns: AtomicUsize,
    }

    impl Shutdown for Counter {
        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> String {
            "counter".to_string()
        }
    }

    fn registered(entry: &Arc<dyn Shutdown>, registry: &Registry) -> RegistrationId {
        registry.register(Arc::downgrade(entry))
    }

    fn counter() -> Arc<Counter> {
        Arc::new(Counter {
            shutdowns: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_shutdown_all() {
        let registry = Registry::new();
        let first = counter();
        let second = counter();
        let first_dyn: Arc<dyn Shutdown> = first.clone();
        let second_dyn: Arc<dyn Shutdown> = second.clone();
        registered(&first_dyn, &registry);
        registered(&second_dyn, &registry);
        assert_eq!(registry.len(), 2);

        registry.shutdown_all();
        assert_eq!(first.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(second.shutdowns.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());

        // The registry was cleared, so a second sweep does nothing.
        registry.shutdown_all();
        assert_eq!(first.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = Registry::new();
        let entry = counter();
        let entry_dyn: Arc<dyn Shutdown> = entry.clone();
        let id = registered(&entry_dyn, &registry);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        registry.shutdown_all();
        assert_eq!(entry.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dropped_entries_are_skipped() {
        let registry = Registry::new();
        {
            let entry: Arc<dyn Shutdown> = counter();
            registered(&entry, &registry);
        }
        assert!(registry.is_empty());
        registry.shutdown_all();
    }

    #[test]
    fn test_register_new() {
        let registry = Registry::new();
        let mut reserved = None;
        let entry = register_new(&registry, |id| {
            assert!(registry.is_empty());
            reserved = Some(id);
            counter()
        });
        assert_eq!(registry.len(), 1);
        assert!(reserved.is_some_and(|id| registry.unregister(id)));
        assert!(registry.is_empty());
        registry.shutdown_all();
        assert_eq!(entry.shutdowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_prunes_dropped_entries() {
        let registry = Registry::new();
        for _ in 0..10 {
            let entry: Arc<dyn Shutdown> = counter();
            registered(&entry, &registry);
        }
        let kept: Arc<dyn Shutdown> = counter();
        registered(&kept, &registry);
        assert_eq!(registry.entries.lock().len(), 1);
        assert_eq!(registry.len(), 1);
    }
}
