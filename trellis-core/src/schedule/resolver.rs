//! Incremental Resolution Scheduler
//!
//! The event-driven scheduler: instead of computing a whole processing order
//! up front, it tracks how many unresolved incoming edges each node still
//! has and surfaces nodes the moment their last dependency resolves.
//!
//! # How It Works
//!
//! 1. `fire` snapshots every node's incoming-edge count from the reverse
//!    view of the relation and marks the fired sources pending.
//!
//! 2. The caller runs its own work for pending nodes, in any order and with
//!    any degree of external concurrency, and reports completions back via
//!    `resolve` or failures via `reject`.
//!
//! 3. `resolve` decrements the remaining count of each dependent; a count
//!    reaching zero means every dependency is in, and the dependent joins
//!    the pending set.
//!
//! 4. `reject` counts rejected incoming edges instead. Only when a node's
//!    entire reverse set is rejected does the rejection cascade to it; one
//!    surviving incoming edge keeps it eligible.
//!
//! "Async" refers to the decoupling of completion events from traversal.
//! The scheduler itself is synchronous and never awaits; callers invoke
//! `resolve`/`reject` whenever their external work actually finishes, one
//! call at a time.
//!
//! # Known Limitation
//!
//! An edge wired up while a cycle is in flight is seeded from its target's
//! reverse set as first observed by `resolve`. Resolutions consumed earlier
//! in the same cycle are not replayed against it, so such a dependent can
//! remain pending forever. Callers that mutate the graph mid-cycle need
//! their own liveness policy (typically a timeout translated into `reject`).

use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::trace;

use crate::relation::InvertibleMap;

/// Incremental, out-of-order readiness tracking over an invertible edge
/// relation.
///
/// The scheduler owns its relation. Mutations through
/// [`edges_mut`](Self::edges_mut) take effect on the next
/// [`fire`](Self::fire), with the mid-cycle caveat in the module docs.
///
/// # Example
///
/// ```
/// use trellis_core::{InvertibleMap, TopologicalAsyncScheduler};
///
/// let mut edges = InvertibleMap::new();
/// edges.add("fetch", ["render"]);
/// edges.add("layout", ["render"]);
///
/// let mut scheduler = TopologicalAsyncScheduler::new(edges);
/// scheduler.fire(["fetch", "layout"]);
///
/// // "render" waits for both of its incoming edges.
/// assert!(scheduler.resolve(["fetch"]).is_empty());
/// assert_eq!(scheduler.resolve(["layout"]), vec!["render"]);
/// ```
pub struct TopologicalAsyncScheduler<ID> {
    /// The edge relation; `get` yields dependents, `rget` dependencies.
    edges: InvertibleMap<ID, ID>,

    /// Ids currently eligible for `resolve`/`reject`.
    pending: IndexSet<ID>,

    /// Remaining unresolved incoming edges per node with dependencies.
    ins_count: IndexMap<ID, isize>,

    /// Rejected incoming edges per node; entries appear on first rejection.
    rejected_ins_count: IndexMap<ID, usize>,
}

impl<ID> TopologicalAsyncScheduler<ID>
where
    ID: Hash + Eq + Clone,
{
    /// Create a scheduler over the given invertible edge relation.
    pub fn new(invertible_edges: InvertibleMap<ID, ID>) -> Self {
        Self {
            edges: invertible_edges,
            pending: IndexSet::new(),
            ins_count: IndexMap::new(),
            rejected_ins_count: IndexMap::new(),
        }
    }

    /// The edge relation.
    pub fn edges(&self) -> &InvertibleMap<ID, ID> {
        &self.edges
    }

    /// Mutable access to the edge relation.
    pub fn edges_mut(&mut self) -> &mut InvertibleMap<ID, ID> {
        &mut self.edges
    }

    /// Ids presently eligible to be resolved or rejected.
    pub fn pending(&self) -> &IndexSet<ID> {
        &self.pending
    }

    /// Reset all cycle state and snapshot incoming-edge counts from the
    /// reverse view.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.ins_count.clear();
        for (id, dependencies) in self.edges.rentries() {
            if !dependencies.is_empty() {
                self.ins_count
                    .insert(id.clone(), dependencies.len() as isize);
            }
        }
        self.rejected_ins_count.clear();
    }

    /// Start a new resolution cycle. The fired sources are treated as
    /// already-resolved triggers: they wait on nothing and go straight into
    /// the pending set.
    pub fn fire<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = ID>,
    {
        self.clear();
        for id in sources {
            self.pending.insert(id);
        }
        trace!(
            pending = self.pending.len(),
            tracked = self.ins_count.len(),
            "fired resolution cycle"
        );
    }

    /// Mark pending ids as completed and return the dependents that became
    /// ready as a result.
    ///
    /// Ids that are not currently pending are silently skipped. Each
    /// resolved id withdraws one unresolved edge from every dependent; a
    /// dependent reaching zero joins both the returned list and the pending
    /// set.
    pub fn resolve<I>(&mut self, ids: I) -> Vec<ID>
    where
        I: IntoIterator<Item = ID>,
    {
        let mut ready = Vec::new();
        for id in ids {
            if !self.pending.shift_remove(&id) {
                continue;
            }
            let dependents: SmallVec<[ID; 8]> = self
                .edges
                .get(&id)
                .map(|targets| targets.iter().cloned().collect())
                .unwrap_or_default();
            for to in dependents {
                let seeded = self.ins_count.get(&to).copied().unwrap_or_else(|| {
                    // First touch this cycle: seed from the current reverse
                    // set, covering dependents wired up after `fire`.
                    self.edges.rget(&to).map_or(1, |deps| deps.len() as isize)
                });
                let remaining = seeded - 1;
                if remaining <= 0 {
                    ready.push(to.clone());
                    self.pending.insert(to.clone());
                }
                self.ins_count.insert(to, remaining);
            }
        }
        trace!(
            ready = ready.len(),
            pending = self.pending.len(),
            "resolved ids"
        );
        ready
    }

    /// Mark ids as failed and cascade the rejection to dependents whose
    /// entire reverse set is rejected.
    ///
    /// Every given id is removed from the pending set whether or not it was
    /// there. Returns the originals plus every cascade descendant, in
    /// breadth-first discovery order.
    pub fn reject<I>(&mut self, ids: I) -> Vec<ID>
    where
        I: IntoIterator<Item = ID>,
    {
        // The result doubles as the worklist; `cursor` marks the frontier.
        let mut rejected: Vec<ID> = ids.into_iter().collect();
        let mut cursor = 0;
        while cursor < rejected.len() {
            let id = rejected[cursor].clone();
            cursor += 1;
            self.pending.shift_remove(&id);
            let dependents: SmallVec<[ID; 8]> = self
                .edges
                .get(&id)
                .map(|targets| targets.iter().cloned().collect())
                .unwrap_or_default();
            for to in dependents {
                let threshold = self.edges.rget(&to).map(|deps| deps.len());
                let count = self.rejected_ins_count.entry(to.clone()).or_insert(0);
                *count += 1;
                if threshold.map_or(false, |t| *count >= t) {
                    // Every incoming edge is gone; the node can never
                    // resolve.
                    rejected.push(to);
                }
            }
        }
        trace!(
            rejected = rejected.len(),
            pending = self.pending.len(),
            "rejected ids"
        );
        rejected
    }
}

impl<ID> Default for TopologicalAsyncScheduler<ID>
where
    ID: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new(InvertibleMap::new())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_edges() -> InvertibleMap<&'static str, &'static str> {
        let mut edges = InvertibleMap::new();
        edges.add("A", ["D", "H"]);
        edges.add("B", ["E"]);
        edges.add("C", ["F", "E"]);
        edges.add("D", ["E", "G"]);
        edges.add("E", ["G"]);
        edges.add("F", ["E", "I"]);
        edges.add("G", ["H"]);
        edges
    }

    fn pending_of(scheduler: &TopologicalAsyncScheduler<&'static str>) -> Vec<&'static str> {
        scheduler.pending().iter().copied().collect()
    }

    #[test]
    fn fire_seeds_counts_from_the_reverse_view() {
        let mut scheduler = TopologicalAsyncScheduler::new(scenario_edges());
        scheduler.fire(["A", "C", "B"]);

        assert_eq!(pending_of(&scheduler), vec!["A", "C", "B"]);
        assert_eq!(scheduler.ins_count.get("D"), Some(&1));
        assert_eq!(scheduler.ins_count.get("H"), Some(&2));
        assert_eq!(scheduler.ins_count.get("E"), Some(&4));
        assert_eq!(scheduler.ins_count.get("G"), Some(&2));
        assert_eq!(scheduler.ins_count.get("F"), Some(&1));
        assert_eq!(scheduler.ins_count.get("I"), Some(&1));
        assert!(scheduler.rejected_ins_count.is_empty());
    }

    #[test]
    fn resolve_returns_only_dependents_that_reached_zero() {
        let mut scheduler = TopologicalAsyncScheduler::new(scenario_edges());
        scheduler.fire(["A", "C", "B"]);

        let ready = scheduler.resolve(["A", "B"]);
        assert_eq!(ready, vec!["D"]);
        assert_eq!(pending_of(&scheduler), vec!["C", "D"]);

        // "H" and "E" each lost one edge but still wait on others.
        assert_eq!(scheduler.ins_count.get("H"), Some(&1));
        assert_eq!(scheduler.ins_count.get("E"), Some(&3));
    }

    #[test]
    fn resolve_skips_ids_that_are_not_pending() {
        let mut scheduler = TopologicalAsyncScheduler::new(scenario_edges());
        scheduler.fire(["A"]);

        // "B" never fired and "Z" is unknown; neither may perturb counts.
        assert!(scheduler.resolve(["B", "Z"]).is_empty());
        assert_eq!(pending_of(&scheduler), vec!["A"]);
        assert_eq!(scheduler.ins_count.get("E"), Some(&4));
    }

    #[test]
    fn full_cycle_drains_every_reachable_node() {
        let mut scheduler = TopologicalAsyncScheduler::new(scenario_edges());
        scheduler.fire(["A", "B", "C"]);

        let mut completed = Vec::new();
        while !scheduler.pending().is_empty() {
            let batch = pending_of(&scheduler);
            completed.extend(batch.iter().copied());
            scheduler.resolve(batch);
        }

        assert_eq!(completed.len(), 9);
        let position = |id: &str| completed.iter().position(|x| *x == id).unwrap();
        for (from, to) in [
            ("A", "D"),
            ("A", "H"),
            ("B", "E"),
            ("C", "F"),
            ("C", "E"),
            ("D", "E"),
            ("D", "G"),
            ("E", "G"),
            ("F", "E"),
            ("F", "I"),
            ("G", "H"),
        ] {
            assert!(position(from) < position(to), "{from} completed after {to}");
        }
    }

    #[test]
    fn reject_spares_nodes_with_a_surviving_edge() {
        let mut edges = InvertibleMap::new();
        edges.add("A", ["C"]);
        edges.add("B", ["C"]);
        edges.add("C", ["D"]);

        let mut scheduler = TopologicalAsyncScheduler::new(edges);
        scheduler.fire(["A", "B"]);

        // "C" still has the edge from "B"; no cascade yet.
        assert_eq!(scheduler.reject(["A"]), vec!["A"]);
        assert!(!scheduler.pending().contains("A"));

        assert_eq!(scheduler.resolve(["B"]), Vec::<&str>::new());
        assert_eq!(scheduler.ins_count.get("C"), Some(&1));
    }

    #[test]
    fn reject_cascades_once_every_edge_is_rejected() {
        let mut edges = InvertibleMap::new();
        edges.add("A", ["C"]);
        edges.add("B", ["C"]);
        edges.add("C", ["D"]);

        let mut scheduler = TopologicalAsyncScheduler::new(edges);
        scheduler.fire(["A", "B"]);

        scheduler.reject(["A"]);
        // The second rejection exhausts "C"'s reverse set and the cascade
        // swallows "D" too.
        assert_eq!(scheduler.reject(["B"]), vec!["B", "C", "D"]);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn reject_reports_cascades_breadth_first() {
        let mut edges = InvertibleMap::new();
        edges.add("A", ["B", "C"]);
        edges.add("B", ["D"]);
        edges.add("C", ["E"]);

        let mut scheduler = TopologicalAsyncScheduler::new(edges);
        scheduler.fire(["A"]);

        assert_eq!(scheduler.reject(["A"]), vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn reject_of_unknown_id_returns_it_without_cascade() {
        let mut scheduler = TopologicalAsyncScheduler::new(scenario_edges());
        scheduler.fire(["A"]);

        assert_eq!(scheduler.reject(["Z"]), vec!["Z"]);
        assert_eq!(pending_of(&scheduler), vec!["A"]);
    }

    #[test]
    fn fire_discards_the_previous_cycle() {
        let mut scheduler = TopologicalAsyncScheduler::new(scenario_edges());
        scheduler.fire(["A", "B", "C"]);
        scheduler.resolve(["A"]);
        scheduler.reject(["B"]);

        scheduler.fire(["A"]);
        assert_eq!(pending_of(&scheduler), vec!["A"]);
        assert_eq!(scheduler.ins_count.get("D"), Some(&1));
        assert_eq!(scheduler.ins_count.get("E"), Some(&4));
        assert!(scheduler.rejected_ins_count.is_empty());
    }

    #[test]
    fn edge_added_mid_cycle_misses_prior_resolutions() {
        let mut edges = InvertibleMap::new();
        edges.add("A", ["C"]);
        edges.add("B", ["C"]);

        let mut scheduler = TopologicalAsyncScheduler::new(edges);
        scheduler.fire(["A", "B"]);
        assert!(scheduler.resolve(["A"]).is_empty());

        // Wire a new dependent of both sources while the cycle is in
        // flight.
        scheduler.edges_mut().add("A", ["D"]);
        scheduler.edges_mut().add("B", ["D"]);

        assert_eq!(scheduler.resolve(["B"]), vec!["C"]);

        // "D" was seeded from its full reverse set after "A" had already
        // resolved; the consumed resolution is never replayed, so "D"
        // stays unready.
        assert_eq!(scheduler.ins_count.get("D"), Some(&1));
        assert!(!scheduler.pending().contains("D"));
    }
}
