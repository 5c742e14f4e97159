//! Base identity shared by every simulation object.

use std::collections::HashMap;

use crate::time::TickTime;

/// Name and creation time of a component, resource, state or collection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity {
    pub name: String,
    pub created_at: TickTime,
}

impl Entity {
    /// An entity named `name`, created at `created_at`.
    pub fn new(name: impl Into<String>, created_at: TickTime) -> Self {
        Entity {
            name: name.into(),
            created_at,
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Hands out auto-numbered names.
///
/// A requested name ending in `.` gets a per-prefix counter appended
/// (`"Customer."` becomes `"Customer.1"`, `"Customer.2"`, ...). Any other
/// name is used verbatim.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    counters: HashMap<String, u64>,
}

impl NameRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `requested` to a unique name, numbering names that end in `.`.
    pub fn assign(&mut self, requested: &str) -> String {
        if !requested.ends_with('.') {
            return requested.to_string();
        }
        let counter = self.counters.entry(requested.to_string()).or_insert(0);
        *counter += 1;
        format!("{}{}", requested, counter)
    }
}
