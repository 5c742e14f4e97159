//! # Kairos — Process-Oriented Discrete-Event Simulation
//!
//! A single-threaded simulation kernel in which model entities are
//! *components* running resumable process bodies against a virtual tick
//! clock. Components hold for time, claim and release resources, wait on
//! observable states and interrupt each other. Everything is
//! deterministic: the same model and seed always produce the same trace.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │           Environment            │ ← owns every table, runs the loop
//! │  ┌────────────────────────────┐  │
//! │  │ Components  (Process)      │  │ ← resumable bodies + lifecycle
//! │  ├────────────────────────────┤  │
//! │  │ Resources   (arbitration)  │  │ ← claims, levels, honor policies
//! │  ├────────────────────────────┤  │
//! │  │ States      (waiters)      │  │ ← predicate waits, triggers
//! │  ├────────────────────────────┤  │
//! │  │ Queues / Lists             │  │ ← ordered collections + stats
//! │  ├────────────────────────────┤  │
//! │  │ Scheduler                  │  │ ← deterministic min-heap
//! │  ├────────────────────────────┤  │
//! │  │ Trace       (listeners)    │  │ ← records, hashing
//! │  ├────────────────────────────┤  │
//! │  │ TickTime                   │  │ ← virtual clock
//! │  └────────────────────────────┘  │
//! └──────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kairos::{process_fn, Environment, Outcome, Request, ResourceSpec, RunUntil};
//!
//! let mut env = Environment::default();
//! let clerk = env.create_resource(ResourceSpec::new("clerk", 1.0)).unwrap();
//!
//! for _ in 0..3 {
//!     let mut phase = 0;
//!     env.spawn("Customer.", process_fn(move |cx| {
//!         phase += 1;
//!         match phase {
//!             1 => {
//!                 if let Outcome::Suspended(y) = cx.request(Request::new(clerk))? {
//!                     return Ok(y);
//!                 }
//!                 phase += 1;
//!                 cx.hold(5.0)
//!             }
//!             2 => cx.hold(5.0),
//!             _ => {
//!                 cx.release(clerk)?;
//!                 cx.terminate()
//!             }
//!         }
//!     }))
//!     .unwrap();
//! }
//!
//! let summary = env.run(RunUntil::Quiescent).unwrap();
//! assert_eq!(summary.final_time.ticks(), 15.0);
//! ```

pub mod builder;
pub mod collections;
pub mod component;
pub mod config;
pub mod context;
pub mod entity;
pub mod environment;
pub mod error;
pub mod event;
pub mod generator;
pub mod id;
pub mod monitor;
pub mod priority;
pub mod process;
pub mod registry;
pub mod resource;
pub mod sampler;
pub mod scheduler;
pub mod state;
pub mod time;
pub mod trace;
pub mod transform;

// Re-exports for convenience.
pub use builder::EnvironmentBuilder;
pub use collections::{
    CollectionStatistics, ComponentList, ComponentQueue, ListEntry, QueueEntry, QueueOrder,
};
pub use component::{ActivateOptions, ComponentState};
pub use config::{EmptyQueuePolicy, EnvConfig, TrackingConfig};
pub use context::{Context, HoldOptions};
pub use environment::{Environment, RunSummary, RunUntil, StopReason};
pub use error::{SimError, SimResult};
pub use event::{Event, EventId};
pub use generator::Generator;
pub use id::{ComponentId, ListId, QueueId, ResourceId, StateId};
pub use monitor::{LevelTimeline, SampleStatistics, SampleSummary, TimelineSummary};
pub use priority::Priority;
pub use process::{process_fn, Outcome, Process, ProcessMode, Suspension, Yield};
pub use registry::Registry;
pub use resource::{
    CapacityLimitMode, FailAfter, HonorPolicy, Request, Resource, ResourceKind, ResourceSpec,
    ResourceStatistics, SelectionPolicy,
};
pub use sampler::{Sampler, SeededSampler};
pub use state::{State, StateRequest, StateValue, Wait};
pub use time::TickTime;
pub use trace::{TraceKind, TraceListener, TraceRecord};
pub use transform::{OffsetTransform, TickTransform};
