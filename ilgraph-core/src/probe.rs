//! Component discovery collaborator
//!
//! Before a graph instantiates anything it asks the probe whether each
//! component it needs exists and which capability role it implements.

use std::collections::HashMap;

/// Resolves component names to their capability role
pub trait CapabilityProbe: Send + Sync {
    /// Role implemented by `component`, or `None` if no such component is known
    fn resolve_role(&self, component: &str) -> Option<String>;
}

/// Probe backed by a fixed name → role table
///
/// Useful when the set of installed components is known up front (embedded
/// builds, tests).
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    roles: HashMap<String, String>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` as implementing `role`; replaces any earlier entry
    pub fn with(mut self, component: impl Into<String>, role: impl Into<String>) -> Self {
        self.roles.insert(component.into(), role.into());
        self
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl CapabilityProbe for RoleTable {
    fn resolve_role(&self, component: &str) -> Option<String> {
        self.roles.get(component).cloned()
    }
}
