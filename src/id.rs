//! Typed arena identifiers.
//!
//! Every simulation object lives in a table owned by the
//! [`Environment`](crate::Environment). Other objects refer to it by one of
//! these lightweight, ordered, copyable ids, never by reference.

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw table index.
            #[inline]
            pub fn new(raw: u32) -> Self {
                $name(raw)
            }

            /// Return the underlying table index.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                $name(index as u32)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a component (process) in the environment.
    ComponentId,
    "C"
);

define_id!(
    /// Identifies a `Resource` or `DepletableResource`.
    ResourceId,
    "R"
);

define_id!(
    /// Untyped handle to a state cell. See [`State`](crate::State) for the
    /// typed wrapper.
    StateId,
    "S"
);

define_id!(
    /// Identifies a `ComponentQueue`.
    QueueId,
    "Q"
);

define_id!(
    /// Identifies a `ComponentList`.
    ListId,
    "L"
);
