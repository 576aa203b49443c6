//! Component registry
//!
//! Ordered (position, name, handle) entries in pipeline order, plus a
//! handle → name map for diagnostics and callback routing. Owned by the
//! worker thread; never shared.

use crate::framework::ComponentHandle;
use std::collections::HashMap;

/// One instantiated component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEntry {
    pub position: usize,
    pub name: String,
    pub handle: ComponentHandle,
}

#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entries: Vec<ComponentEntry>,
    names: HashMap<ComponentHandle, String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry keeping pipeline order by position
    pub fn insert(&mut self, position: usize, name: &str, handle: ComponentHandle) {
        let index = self.entries.partition_point(|e| e.position < position);
        self.entries.insert(
            index,
            ComponentEntry {
                position,
                name: name.to_string(),
                handle,
            },
        );
        self.names.insert(handle, name.to_string());
    }

    pub fn remove(&mut self, handle: ComponentHandle) -> Option<ComponentEntry> {
        self.names.remove(&handle)?;
        let index = self.entries.iter().position(|e| e.handle == handle)?;
        Some(self.entries.remove(index))
    }

    pub fn name_of(&self, handle: ComponentHandle) -> Option<&str> {
        self.names.get(&handle).map(String::as_str)
    }

    pub fn contains(&self, handle: ComponentHandle) -> bool {
        self.names.contains_key(&handle)
    }

    /// Handles in pipeline order
    pub fn handles(&self) -> Vec<ComponentHandle> {
        self.entries.iter().map(|e| e.handle).collect()
    }

    pub fn entries(&self) -> &[ComponentEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ComponentEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of `handle`, or its raw value when it is not registered
    pub fn describe(&self, handle: ComponentHandle) -> String {
        self.name_of(handle)
            .map(str::to_string)
            .unwrap_or_else(|| handle.to_string())
    }
}
