//! Get-by-type dependency registry.
//!
//! Process bodies look up shared singletons (resource handles, states,
//! model parameters) here instead of capturing them at construction.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::error::{SimError, SimResult};

#[derive(Default)]
pub struct Registry {
    entries: HashMap<TypeId, Box<dyn Any>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value`, replacing and returning any previous value of
    /// the same type.
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        self.entries
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Borrow the value of type `T`. Missing types are `DependencyMissing`.
    pub fn get<T: 'static>(&self) -> SimResult<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
            .ok_or(SimError::DependencyMissing(std::any::type_name::<T>()))
    }

    /// Mutably borrow the value of type `T`.
    pub fn get_mut<T: 'static>(&mut self) -> SimResult<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut::<T>())
            .ok_or(SimError::DependencyMissing(std::any::type_name::<T>()))
    }

    /// Returns `true` if a `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Take the `T` out of the registry.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
