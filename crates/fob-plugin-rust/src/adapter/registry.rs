use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::ModuleDescriptor;
use crate::error::Result;

/// One descriptor per unit per build.
///
/// However many importers ask for a unit, the descriptor (and with it the
/// single memoized `init()`) is created once until the next
/// [`begin_build`](Self::begin_build).
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    generation: AtomicU64,
    modules: DashMap<String, Arc<ModuleDescriptor>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new build generation, forgetting every descriptor.
    pub fn begin_build(&self) -> u64 {
        self.modules.clear();
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self, unit_name: &str) -> Option<Arc<ModuleDescriptor>> {
        self.modules.get(unit_name).map(|d| Arc::clone(d.value()))
    }

    /// Return the unit's descriptor, creating it with `create` on first use.
    pub fn get_or_create(
        &self,
        unit_name: &str,
        create: impl FnOnce() -> Result<ModuleDescriptor>,
    ) -> Result<Arc<ModuleDescriptor>> {
        match self.modules.entry(unit_name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let descriptor = Arc::new(create()?);
                entry.insert(Arc::clone(&descriptor));
                Ok(descriptor)
            }
        }
    }

    /// Swap in a freshly built descriptor, as after an incremental rebuild.
    pub fn replace(&self, descriptor: ModuleDescriptor) -> Arc<ModuleDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.modules
            .insert(descriptor.unit_name.clone(), Arc::clone(&descriptor));
        descriptor
    }

    /// Unit served for an import specifier: `wasm:<unit>` or a bare `<unit>`.
    pub fn resolve_specifier(&self, specifier: &str) -> Option<String> {
        let name = specifier.strip_prefix("wasm:").unwrap_or(specifier);
        self.modules.contains_key(name).then(|| name.to_string())
    }

    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
