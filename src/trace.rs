//! Model-level trace records and listeners.
//!
//! The environment publishes a [`TraceRecord`] for every lifecycle step a
//! model author may care about. Records go to any registered
//! [`TraceListener`] and, when `EnvConfig::record_trace` is set, to an
//! in-memory log whose [`trace_hash`] is the determinism fingerprint of a
//! run. Diagnostics for the engine itself go through `tracing` instead.

use crate::component::ComponentState;
use crate::id::{ComponentId, ResourceId, StateId};
use crate::priority::Priority;
use crate::time::TickTime;

// ── TraceKind ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TraceKind {
    ComponentCreated {
        component: ComponentId,
        name: String,
    },
    StateTransition {
        component: ComponentId,
        from: ComponentState,
        to: ComponentState,
    },
    Rescheduled {
        component: ComponentId,
        at: TickTime,
        priority: Priority,
        urgent: bool,
    },
    Requested {
        component: ComponentId,
        resource: ResourceId,
        quantity: f64,
    },
    Claimed {
        component: ComponentId,
        resource: ResourceId,
        quantity: f64,
    },
    Released {
        component: Option<ComponentId>,
        resource: ResourceId,
        quantity: f64,
    },
    Bumped {
        component: ComponentId,
        resource: ResourceId,
        by: ComponentId,
    },
    /// A request or wait timed out, or was withdrawn by activation.
    Reneged {
        component: ComponentId,
    },
    CapacityChanged {
        resource: ResourceId,
        capacity: f64,
    },
    QueueEntered {
        collection: String,
        component: ComponentId,
    },
    QueueLeft {
        collection: String,
        component: ComponentId,
        stay: f64,
    },
    StateValueChanged {
        state: StateId,
        name: String,
        value: String,
    },
    Interrupted {
        component: ComponentId,
        level: u32,
    },
    Resumed {
        component: ComponentId,
    },
    SimulationStopped {
        by: Option<ComponentId>,
    },
}

impl std::fmt::Display for TraceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceKind::ComponentCreated { component, name } => {
                write!(f, "create {} ({})", component, name)
            }
            TraceKind::StateTransition { component, from, to } => {
                write!(f, "{} {} -> {}", component, from, to)
            }
            TraceKind::Rescheduled {
                component,
                at,
                priority,
                urgent,
            } => write!(
                f,
                "schedule {} at {} {}{}",
                component,
                at,
                priority,
                if *urgent { " urgent" } else { "" }
            ),
            TraceKind::Requested {
                component,
                resource,
                quantity,
            } => write!(f, "{} requests {} from {}", component, quantity, resource),
            TraceKind::Claimed {
                component,
                resource,
                quantity,
            } => write!(f, "{} claims {} from {}", component, quantity, resource),
            TraceKind::Released {
                component,
                resource,
                quantity,
            } => match component {
                Some(c) => write!(f, "{} releases {} to {}", c, quantity, resource),
                None => write!(f, "release {} to {}", quantity, resource),
            },
            TraceKind::Bumped {
                component,
                resource,
                by,
            } => write!(f, "{} bumped from {} by {}", component, resource, by),
            TraceKind::Reneged { component } => write!(f, "{} reneged", component),
            TraceKind::CapacityChanged { resource, capacity } => {
                write!(f, "capacity of {} set to {}", resource, capacity)
            }
            TraceKind::QueueEntered {
                collection,
                component,
            } => write!(f, "{} entered {}", component, collection),
            TraceKind::QueueLeft {
                collection,
                component,
                stay,
            } => write!(f, "{} left {} after {}", component, collection, stay),
            TraceKind::StateValueChanged { state, name, value } => {
                write!(f, "{} ({}) = {}", state, name, value)
            }
            TraceKind::Interrupted { component, level } => {
                write!(f, "{} interrupted (level {})", component, level)
            }
            TraceKind::Resumed { component } => write!(f, "{} resumed", component),
            TraceKind::SimulationStopped { by } => match by {
                Some(c) => write!(f, "stopped by {}", c),
                None => write!(f, "stopped"),
            },
        }
    }
}

// ── TraceRecord ───────────────────────────────────────────────────────

/// One published notification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceRecord {
    /// Publication order, strictly increasing within a run.
    pub seq: u64,
    pub time: TickTime,
    /// The component that was current when the record was published.
    pub current: Option<ComponentId>,
    pub kind: TraceKind,
}

impl std::fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.current {
            Some(c) => write!(f, "[{} #{} {}] {}", self.time, self.seq, c, self.kind),
            None => write!(f, "[{} #{} -] {}", self.time, self.seq, self.kind),
        }
    }
}

// ── TraceListener ─────────────────────────────────────────────────────

/// Receiver of trace records.
///
/// Listeners only see an immutable record and cannot reach the
/// environment, so they cannot mutate simulation state from a callback.
pub trait TraceListener {
    fn on_record(&mut self, record: &TraceRecord);
}

impl<F> TraceListener for F
where
    F: FnMut(&TraceRecord),
{
    fn on_record(&mut self, record: &TraceRecord) {
        (self)(record)
    }
}

// ── Hashing ───────────────────────────────────────────────────────────

/// Combine two hashes into one (order-dependent).
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// FNV-1a over a byte slice.
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

/// Fold a sequence of records into a single fingerprint.
///
/// Two runs of the same model with the same seed produce the same hash.
pub fn trace_hash<'a>(records: impl IntoIterator<Item = &'a TraceRecord>) -> u64 {
    records.into_iter().fold(0, |h, r| {
        let h = hash_combine(h, r.time.ticks().to_bits());
        hash_combine(h, hash_bytes(r.kind.to_string().as_bytes()))
    })
}
