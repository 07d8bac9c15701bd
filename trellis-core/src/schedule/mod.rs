//! Execution Scheduling
//!
//! This module decides the order in which graph nodes should be processed
//! once a set of source nodes fires. It never runs user work itself; it only
//! answers "what comes next?" and "what is ready now?".
//!
//! # Overview
//!
//! Two schedulers cover the two ways callers consume an ordering:
//!
//! - [`TopologicalScheduler`] walks the whole reachable graph eagerly at
//!   `fire` time and hands out a complete processing order via `pop`. Use it
//!   when every step runs to completion before the next one starts.
//!
//! - [`TopologicalAsyncScheduler`] computes readiness incrementally. Nodes
//!   become pending as their incoming edges resolve, in whatever order the
//!   caller's external work actually finishes. Use it when completions arrive
//!   out of order.
//!
//! Both are single-threaded synchronous state machines. Nothing here blocks,
//! awaits, or spawns; callers drive them from one logical thread of control
//! and translate their own timeouts into `reject` calls.

mod resolver;
mod topological;

use indexmap::{IndexMap, IndexSet};

/// Directed edge relation consumed by [`TopologicalScheduler`].
///
/// Each key triggers every id in its set; traversal moves key -> member.
/// Multiple edges into the same target are significant and are counted,
/// not deduplicated away.
pub type EdgeMap<ID> = IndexMap<ID, IndexSet<ID>>;

pub use resolver::TopologicalAsyncScheduler;
pub use topological::TopologicalScheduler;
