//! Trellis Core
//!
//! This crate provides the dependency-graph scheduling engine at the heart
//! of the Trellis incremental computation framework. It implements:
//!
//! - An invertible bidirectional relation between nodes and the nodes they
//!   trigger
//! - Eager topological ordering for whole-graph propagation
//! - Incremental readiness tracking for work that completes out of order
//!
//! The engine decides *order* and *readiness* only. It never executes user
//! work, performs no I/O, and holds no locks; callers drive it from a single
//! logical thread of control and plug in whatever execution machinery they
//! like on top.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `relation`: the [`InvertibleMap`] container keeping forward and reverse
//!   views of the edge relation in sync
//! - `schedule`: the two schedulers built on top of it
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{InvertibleMap, TopologicalAsyncScheduler};
//!
//! // Build the graph: compile feeds link, and both tests and link feed
//! // package.
//! let mut edges = InvertibleMap::new();
//! edges.add("compile", ["link", "tests"]);
//! edges.add("link", ["package"]);
//! edges.add("tests", ["package"]);
//!
//! let mut scheduler = TopologicalAsyncScheduler::new(edges);
//! scheduler.fire(["compile"]);
//!
//! // External work finishes in its own time; the scheduler reports what
//! // each completion unlocks.
//! let unlocked = scheduler.resolve(["compile"]);
//! assert_eq!(unlocked, vec!["link", "tests"]);
//!
//! let unlocked = scheduler.resolve(["tests"]);
//! assert!(unlocked.is_empty()); // "package" still waits on "link"
//!
//! let unlocked = scheduler.resolve(["link"]);
//! assert_eq!(unlocked, vec!["package"]);
//! ```

pub mod relation;
pub mod schedule;

pub use relation::{InvertibleMap, RelationError};
pub use schedule::{EdgeMap, TopologicalAsyncScheduler, TopologicalScheduler};
