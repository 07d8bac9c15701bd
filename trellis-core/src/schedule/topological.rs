//! Topological Scheduler
//!
//! The synchronous scheduler: one `fire` call walks everything reachable
//! from the fired sources and produces a complete processing order up front.
//!
//! # Algorithm
//!
//! 1. `fire` runs a memoized depth-first visit from each source. Visiting a
//!    node first visits every child that has not been seen this cycle; a
//!    child that has been seen only gets its counter incremented, recording
//!    one more active incoming path without re-traversing.
//!
//! 2. A node's own counter is bumped only after all of its children are
//!    closed out, so the `visits` map's insertion order is children before
//!    ancestors.
//!
//! 3. The stack is rebuilt from `visits` in that insertion order, keeping
//!    entries whose count is positive. Reading from the tail therefore
//!    yields the fired sources first: for every edge u -> v reachable from
//!    the sources, u pops before v.
//!
//! 4. `block` zeroes a node's counter and decrements each of its children
//!    by one. A child whose count drops to zero lost its last active path
//!    and is cascade-unvisited in turn; a child still above zero is reached
//!    by another live path and survives. This is what keeps diamond shapes
//!    alive when only one of their parents is blocked.
//!
//! The counters are the whole trick: they track how many active incoming
//! paths currently reach each node, so partial blocking subtracts exactly
//! the paths that went away and nothing more.

use std::hash::Hash;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::EdgeMap;

/// Eager whole-graph ordering over a directed edge relation.
///
/// The scheduler owns its edge map. Mutations through
/// [`edges_mut`](Self::edges_mut), [`add_edge`](Self::add_edge), or
/// [`remove_edge`](Self::remove_edge) take effect on the next
/// [`fire`](Self::fire).
///
/// # Example
///
/// ```
/// use trellis_core::TopologicalScheduler;
///
/// let mut scheduler = TopologicalScheduler::default();
/// scheduler.add_edge("fetch", "parse");
/// scheduler.add_edge("parse", "render");
/// scheduler.fire(["fetch"]);
///
/// let order: Vec<_> = scheduler.by_ref().collect();
/// assert_eq!(order, vec!["fetch", "parse", "render"]);
/// ```
pub struct TopologicalScheduler<ID> {
    /// The edge relation being scheduled over.
    edges: EdgeMap<ID>,

    /// Active incoming-path count per node, in traversal insertion order.
    /// Rebuilt by every `fire`; counts may go negative under repeated
    /// blocking and are simply filtered out of the stack.
    visits: IndexMap<ID, isize>,

    /// Processing order derived from `visits`; drained from the tail.
    stack: Vec<ID>,

    /// Target of the no-argument block form.
    last_popped: Option<ID>,
}

impl<ID> TopologicalScheduler<ID>
where
    ID: Hash + Eq + Clone,
{
    /// Create a scheduler over the given edge relation.
    pub fn new(edges: EdgeMap<ID>) -> Self {
        Self {
            edges,
            visits: IndexMap::new(),
            stack: Vec::new(),
            last_popped: None,
        }
    }

    /// The edge relation.
    pub fn edges(&self) -> &EdgeMap<ID> {
        &self.edges
    }

    /// Mutable access to the edge relation. Changes apply to the next
    /// [`fire`](Self::fire).
    pub fn edges_mut(&mut self) -> &mut EdgeMap<ID> {
        &mut self.edges
    }

    /// Add a single edge `from -> to`.
    pub fn add_edge(&mut self, from: ID, to: ID) {
        self.edges.entry(from).or_default().insert(to);
    }

    /// Remove a single edge `from -> to`.
    pub fn remove_edge(&mut self, from: &ID, to: &ID) {
        if let Some(targets) = self.edges.get_mut(from) {
            targets.shift_remove(to);
        }
    }

    /// Start a new propagation cycle from the given sources.
    ///
    /// All state from the previous cycle is discarded first.
    pub fn fire<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = ID>,
    {
        self.visits.clear();
        self.last_popped = None;
        let mut fired = 0usize;
        for id in sources {
            self.visit(id);
            fired += 1;
        }
        self.rebuild_stack();
        trace!(
            sources = fired,
            active = self.stack.len(),
            "fired traversal cycle"
        );
    }

    /// Memoized depth-first visit. Children close out before `id` itself, so
    /// `visits` insertion order is the reverse of the pop order.
    fn visit(&mut self, id: ID) {
        let children: SmallVec<[ID; 8]> = self
            .edges
            .get(&id)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            if let Some(count) = self.visits.get_mut(&child) {
                // One more active path into an already-visited node.
                *count += 1;
            } else {
                self.visit(child);
            }
        }
        *self.visits.entry(id).or_insert(0) += 1;
    }

    /// Remove and return the next node in processing order.
    ///
    /// Returns `None` when the stack is empty (including before any `fire`).
    /// The popped id becomes the target of [`block_last`](Self::block_last).
    pub fn pop(&mut self) -> Option<ID> {
        let id = self.stack.pop()?;
        if let Some(count) = self.visits.get_mut(&id) {
            *count = 0;
        }
        self.last_popped = Some(id.clone());
        Some(id)
    }

    /// The next node in processing order, without removing it.
    pub fn seek(&self) -> Option<&ID> {
        self.stack.last()
    }

    /// Block the given ids, cascading to descendants that lose their last
    /// active path. Ids with no counter this cycle are skipped.
    pub fn block<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ID>,
    {
        let mut blocked = 0usize;
        for id in ids {
            self.unvisit(&id);
            blocked += 1;
        }
        self.rebuild_stack();
        trace!(blocked, active = self.stack.len(), "blocked ids");
    }

    /// Block the most recently popped id, if any.
    pub fn block_last(&mut self) {
        if let Some(id) = self.last_popped.clone() {
            self.unvisit(&id);
            self.rebuild_stack();
        }
    }

    /// Zero `id`'s counter and withdraw one path from each child. Children
    /// dropping to (or below) zero are cascade-unvisited.
    fn unvisit(&mut self, id: &ID) {
        match self.visits.get_mut(id) {
            Some(count) => *count = 0,
            // Never visited this cycle: it contributed no paths to undo.
            None => return,
        }
        let children: SmallVec<[ID; 8]> = self
            .edges
            .get(id)
            .map(|targets| targets.iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            if let Some(count) = self.visits.get_mut(&child) {
                *count -= 1;
                if *count <= 0 {
                    self.unvisit(&child);
                }
            }
        }
    }

    /// Discard all traversal state.
    pub fn clear(&mut self) {
        self.visits.clear();
        self.stack.clear();
        self.last_popped = None;
    }

    fn rebuild_stack(&mut self) {
        self.stack = self
            .visits
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id.clone())
            .collect();
    }
}

impl<ID> Default for TopologicalScheduler<ID>
where
    ID: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new(EdgeMap::new())
    }
}

/// Single-pass drain: `next` is [`pop`](TopologicalScheduler::pop). The
/// iterator does not refire; once exhausted it stays empty until the next
/// `fire`.
impl<ID> Iterator for TopologicalScheduler<ID>
where
    ID: Hash + Eq + Clone,
{
    type Item = ID;

    fn next(&mut self) -> Option<ID> {
        self.pop()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
