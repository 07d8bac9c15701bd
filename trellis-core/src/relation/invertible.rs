//! Invertible Map Implementation
//!
//! An [`InvertibleMap`] is a one-to-many relation between keys of type `K`
//! and keys of type `V`, stored as two synchronized maps:
//!
//! - `fmap: K -> IndexSet<V>` (the forward view)
//! - `rmap: V -> IndexSet<K>` (the reverse view)
//!
//! # Invariant
//!
//! After every public mutation: `v ∈ fmap[k]` if and only if `k ∈ rmap[v]`.
//!
//! Every mutating method updates both sides in lockstep. Read accessors come
//! in mirrored pairs (`get`/`rget`, `has`/`rhas`, ...) so callers can work
//! with whichever direction is natural for them.
//!
//! # Missing Keys
//!
//! Lookups of absent keys return `None`/`false`/empty, and mutations of
//! absent keys are no-ops. Nothing here panics or returns an error; the one
//! fallible entry point is [`InvertibleMap::try_from_parts`], which validates
//! caller-supplied maps before trusting them.

use std::fmt;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

/// Error returned by [`InvertibleMap::try_from_parts`] when the supplied
/// forward and reverse maps disagree about an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelationError {
    /// A forward entry references a value whose reverse set does not contain
    /// the key.
    #[error("forward entry has no matching reverse entry")]
    MissingReverse,

    /// A reverse entry references a key whose forward set does not contain
    /// the value.
    #[error("reverse entry has no matching forward entry")]
    MissingForward,
}

/// Build the opposite direction of a one-to-many map with a single full scan.
///
/// Every value found across all sets becomes a key of the result, mapped to
/// the set of keys whose sets contained it.
fn invert<A, B>(map: &IndexMap<A, IndexSet<B>>) -> IndexMap<B, IndexSet<A>>
where
    A: Hash + Eq + Clone,
    B: Hash + Eq + Clone,
{
    let mut inverted: IndexMap<B, IndexSet<A>> = IndexMap::new();
    for (key, values) in map {
        for value in values {
            inverted
                .entry(value.clone())
                .or_default()
                .insert(key.clone());
        }
    }
    inverted
}

/// A bidirectional one-to-many relation.
///
/// # Example
///
/// ```
/// use trellis_core::InvertibleMap;
///
/// let mut deps = InvertibleMap::new();
/// deps.add("parse", ["typecheck", "lint"]);
/// deps.add("typecheck", ["codegen"]);
///
/// // Forward: what does "parse" trigger?
/// assert!(deps.get(&"parse").unwrap().contains("typecheck"));
///
/// // Reverse: what feeds into "codegen"?
/// assert!(deps.rget(&"codegen").unwrap().contains("typecheck"));
/// ```
#[derive(Clone)]
pub struct InvertibleMap<K, V> {
    /// Forward view: key -> set of values.
    fmap: IndexMap<K, IndexSet<V>>,

    /// Reverse view: value -> set of keys.
    rmap: IndexMap<V, IndexSet<K>>,
}

impl<K, V> InvertibleMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    /// Create an empty relation.
    pub fn new() -> Self {
        Self {
            fmap: IndexMap::new(),
            rmap: IndexMap::new(),
        }
    }

    /// Build a relation from a forward map, deriving the reverse map.
    pub fn from_forward(forward: IndexMap<K, IndexSet<V>>) -> Self {
        let rmap = invert(&forward);
        Self {
            fmap: forward,
            rmap,
        }
    }

    /// Build a relation from a reverse map, deriving the forward map.
    pub fn from_reverse(reverse: IndexMap<V, IndexSet<K>>) -> Self {
        let fmap = invert(&reverse);
        Self {
            fmap,
            rmap: reverse,
        }
    }

    /// Build a relation from both maps without checking them.
    ///
    /// The caller is responsible for the two maps being consistent with each
    /// other; no inversion or validation is performed. Prefer
    /// [`try_from_parts`](Self::try_from_parts) when the maps come from
    /// outside the current module.
    pub fn from_parts(forward: IndexMap<K, IndexSet<V>>, reverse: IndexMap<V, IndexSet<K>>) -> Self {
        Self {
            fmap: forward,
            rmap: reverse,
        }
    }

    /// Build a relation from both maps, validating that they mirror each
    /// other exactly.
    pub fn try_from_parts(
        forward: IndexMap<K, IndexSet<V>>,
        reverse: IndexMap<V, IndexSet<K>>,
    ) -> Result<Self, RelationError> {
        for (key, values) in &forward {
            for value in values {
                let mirrored = reverse.get(value).map_or(false, |keys| keys.contains(key));
                if !mirrored {
                    return Err(RelationError::MissingReverse);
                }
            }
        }
        for (value, keys) in &reverse {
            for key in keys {
                let mirrored = forward.get(key).map_or(false, |values| values.contains(value));
                if !mirrored {
                    return Err(RelationError::MissingForward);
                }
            }
        }
        Ok(Self {
            fmap: forward,
            rmap: reverse,
        })
    }

    /// Insert `items` into `key`'s forward set, registering `key` in each
    /// newly inserted item's reverse set.
    ///
    /// The key's entry is created even when `items` is empty. Items already
    /// present are skipped entirely; the reverse side is only touched for
    /// genuinely new members.
    pub fn add<I>(&mut self, key: K, items: I)
    where
        I: IntoIterator<Item = V>,
    {
        self.fmap.entry(key.clone()).or_default();
        for item in items {
            let newly_inserted = match self.fmap.get_mut(&key) {
                Some(values) => values.insert(item.clone()),
                None => false,
            };
            if newly_inserted {
                self.rmap.entry(item).or_default().insert(key.clone());
            }
        }
    }

    /// Mirror of [`add`](Self::add) operating on the reverse side.
    pub fn radd<I>(&mut self, key: V, items: I)
    where
        I: IntoIterator<Item = K>,
    {
        self.rmap.entry(key.clone()).or_default();
        for item in items {
            let newly_inserted = match self.rmap.get_mut(&key) {
                Some(keys) => keys.insert(item.clone()),
                None => false,
            };
            if newly_inserted {
                self.fmap.entry(item).or_default().insert(key.clone());
            }
        }
    }

    /// Remove `items` from `key`'s forward set. For every item actually
    /// removed, `key` is deleted from that item's reverse set.
    ///
    /// Sets emptied by removal stay in place; use [`delete`](Self::delete)
    /// to drop a key's entry.
    pub fn remove<I>(&mut self, key: &K, items: I)
    where
        I: IntoIterator<Item = V>,
    {
        for item in items {
            let removed = match self.fmap.get_mut(key) {
                Some(values) => values.shift_remove(&item),
                None => false,
            };
            if removed {
                if let Some(keys) = self.rmap.get_mut(&item) {
                    keys.shift_remove(key);
                }
            }
        }
    }

    /// Mirror of [`remove`](Self::remove) operating on the reverse side.
    pub fn rremove<I>(&mut self, key: &V, items: I)
    where
        I: IntoIterator<Item = K>,
    {
        for item in items {
            let removed = match self.rmap.get_mut(key) {
                Some(keys) => keys.shift_remove(&item),
                None => false,
            };
            if removed {
                if let Some(values) = self.fmap.get_mut(&item) {
                    values.shift_remove(key);
                }
            }
        }
    }

    /// Remove every mention of `key` from the reverse map, then either clear
    /// the key's own set in place (`keep_key = true`, always returns `true`)
    /// or drop the entry outright (returns whether the entry existed).
    pub fn delete(&mut self, key: &K, keep_key: bool) -> bool {
        if let Some(values) = self.fmap.get(key) {
            for value in values {
                if let Some(keys) = self.rmap.get_mut(value) {
                    keys.shift_remove(key);
                }
            }
        }
        if keep_key {
            if let Some(values) = self.fmap.get_mut(key) {
                values.clear();
            }
            true
        } else {
            self.fmap.shift_remove(key).is_some()
        }
    }

    /// Mirror of [`delete`](Self::delete) operating on the reverse side.
    pub fn rdelete(&mut self, key: &V, keep_key: bool) -> bool {
        if let Some(keys) = self.rmap.get(key) {
            for k in keys {
                if let Some(values) = self.fmap.get_mut(k) {
                    values.shift_remove(key);
                }
            }
        }
        if keep_key {
            if let Some(keys) = self.rmap.get_mut(key) {
                keys.clear();
            }
            true
        } else {
            self.rmap.shift_remove(key).is_some()
        }
    }

    /// Replace `key`'s entire forward set with `values`.
    ///
    /// Implemented as a keep-key delete followed by an add, so the
    /// bidirectional invariant holds at every observation point.
    pub fn set<I>(&mut self, key: K, values: I)
    where
        I: IntoIterator<Item = V>,
    {
        self.delete(&key, true);
        self.add(key, values);
    }

    /// Mirror of [`set`](Self::set) operating on the reverse side.
    pub fn rset<I>(&mut self, key: V, keys: I)
    where
        I: IntoIterator<Item = K>,
    {
        self.rdelete(&key, true);
        self.radd(key, keys);
    }

    /// Forward set for `key`, if present.
    pub fn get(&self, key: &K) -> Option<&IndexSet<V>> {
        self.fmap.get(key)
    }

    /// Reverse set for `key`, if present.
    pub fn rget(&self, key: &V) -> Option<&IndexSet<K>> {
        self.rmap.get(key)
    }

    /// Whether the forward map has an entry for `key`.
    pub fn has(&self, key: &K) -> bool {
        self.fmap.contains_key(key)
    }

    /// Whether the reverse map has an entry for `key`.
    pub fn rhas(&self, key: &V) -> bool {
        self.rmap.contains_key(key)
    }

    /// Forward keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.fmap.keys()
    }

    /// Reverse keys in insertion order.
    pub fn rkeys(&self) -> impl Iterator<Item = &V> + '_ {
        self.rmap.keys()
    }

    /// Forward sets in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &IndexSet<V>> + '_ {
        self.fmap.values()
    }

    /// Reverse sets in insertion order.
    pub fn rvalues(&self) -> impl Iterator<Item = &IndexSet<K>> + '_ {
        self.rmap.values()
    }

    /// Forward entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &IndexSet<V>)> + '_ {
        self.fmap.iter()
    }

    /// Reverse entries in insertion order.
    pub fn rentries(&self) -> impl Iterator<Item = (&V, &IndexSet<K>)> + '_ {
        self.rmap.iter()
    }

    /// Number of forward keys.
    pub fn len(&self) -> usize {
        self.fmap.len()
    }

    /// Number of reverse keys.
    pub fn rlen(&self) -> usize {
        self.rmap.len()
    }

    /// Whether the relation has no forward keys.
    pub fn is_empty(&self) -> bool {
        self.fmap.is_empty()
    }

    /// Empty both sides.
    pub fn clear(&mut self) {
        self.fmap.clear();
        self.rmap.clear();
    }
}

impl<K, V> Default for InvertibleMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> PartialEq for InvertibleMap<K, V>
where
    K: Hash + Eq,
    V: Hash + Eq,
{
    fn eq(&self, other: &Self) -> bool {
        self.fmap == other.fmap && self.rmap == other.rmap
    }
}

impl<K, V> Eq for InvertibleMap<K, V>
where
    K: Hash + Eq,
    V: Hash + Eq,
{
}

impl<K, V> fmt::Debug for InvertibleMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvertibleMap")
            .field("forward", &self.fmap)
            .field("reverse", &self.rmap)
            .finish()
    }
}

impl<K, V> Extend<(K, V)> for InvertibleMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.add(key, [value]);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for InvertibleMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Hash + Eq + Clone,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

/// Serializes as the forward map only. The reverse map is re-derived on
/// deserialization, so a serialized relation can never come back
/// inconsistent.
impl<K, V> Serialize for InvertibleMap<K, V>
where
    K: Serialize + Hash + Eq,
    V: Serialize + Hash + Eq,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.fmap.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for InvertibleMap<K, V>
where
    K: Deserialize<'de> + Hash + Eq + Clone,
    V: Deserialize<'de> + Hash + Eq + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let forward = IndexMap::<K, IndexSet<V>>::deserialize(deserializer)?;
        Ok(Self::from_forward(forward))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
