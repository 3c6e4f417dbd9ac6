use std::collections::HashMap;

use terrascope_geo::{TileAddress, TileWithLod};

/// Identity of one cache entry. Distinguishes a re-issued load for a key from
/// an older, evicted one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntryId(u64);

/// Lifecycle state of a resident tile. Handles are owned by the cache.
#[derive(Debug)]
pub(crate) enum EntryState<A> {
    Pending,
    Loaded(A),
    Failed(A),
}

/// Handle-free view of an entry's state for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Pending,
    Loaded,
    Failed,
}

impl EntryStatus {
    pub fn is_resolved(self) -> bool {
        !matches!(self, EntryStatus::Pending)
    }
}

impl<A> EntryState<A> {
    fn status(&self) -> EntryStatus {
        match self {
            EntryState::Pending => EntryStatus::Pending,
            EntryState::Loaded(_) => EntryStatus::Loaded,
            EntryState::Failed(_) => EntryStatus::Failed,
        }
    }

    /// The owned handle, if the entry is resolved.
    pub(crate) fn into_asset(self) -> Option<A> {
        match self {
            EntryState::Pending => None,
            EntryState::Loaded(asset) | EntryState::Failed(asset) => Some(asset),
        }
    }
}

#[derive(Debug)]
struct CacheEntry<A> {
    id: EntryId,
    state: EntryState<A>,
}

/// Resident tiles keyed by [`TileWithLod`].
///
/// The only transitions are `absent -> Pending`, `Pending -> Loaded | Failed`
/// (for the same entry id) and removal.
#[derive(Debug)]
pub(crate) struct TileCache<A> {
    entries: HashMap<TileWithLod, CacheEntry<A>>,
    next_id: u64,
}

impl<A> TileCache<A> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, key: &TileWithLod) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn status(&self, key: &TileWithLod) -> Option<EntryStatus> {
        self.entries.get(key).map(|e| e.state.status())
    }

    pub(crate) fn is_resolved(&self, key: &TileWithLod) -> bool {
        self.status(key).is_some_and(EntryStatus::is_resolved)
    }

    /// Insert a pending entry unless the key is already present in any state.
    pub(crate) fn insert_pending(&mut self, key: TileWithLod) -> Option<EntryId> {
        if self.entries.contains_key(&key) {
            return None;
        }
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            key,
            CacheEntry {
                id,
                state: EntryState::Pending,
            },
        );
        Some(id)
    }

    /// Whether `key` currently holds the pending entry `id`.
    pub(crate) fn is_pending(&self, key: &TileWithLod, id: EntryId) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| e.id == id && matches!(e.state, EntryState::Pending))
    }

    /// Resolve the pending entry `id`. Hands the state back if that entry is no
    /// longer resident or already resolved.
    pub(crate) fn resolve(
        &mut self,
        key: &TileWithLod,
        id: EntryId,
        state: EntryState<A>,
    ) -> Result<(), EntryState<A>> {
        match self.entries.get_mut(key) {
            Some(entry) if entry.id == id && matches!(entry.state, EntryState::Pending) => {
                entry.state = state;
                Ok(())
            }
            _ => Err(state),
        }
    }

    pub(crate) fn remove(&mut self, key: &TileWithLod) -> Option<EntryState<A>> {
        self.entries.remove(key).map(|e| e.state)
    }

    /// Remove every entry, in key order.
    pub(crate) fn drain(&mut self) -> Vec<(TileWithLod, EntryState<A>)> {
        let mut drained: Vec<_> = self.entries.drain().map(|(k, e)| (k, e.state)).collect();
        drained.sort_by_key(|(k, _)| *k);
        drained
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &TileWithLod> {
        self.entries.keys()
    }

    pub(crate) fn statuses(&self) -> impl Iterator<Item = (TileWithLod, EntryStatus)> + '_ {
        self.entries.iter().map(|(k, e)| (*k, e.state.status()))
    }

    /// States of all entries for `tile`, across LOD tiers.
    pub(crate) fn tile_statuses(&self, tile: TileAddress) -> impl Iterator<Item = EntryStatus> + '_ {
        self.statuses()
            .filter(move |(k, _)| k.tile == tile)
            .map(|(_, s)| s)
    }

    pub(crate) fn count(&self, status: EntryStatus) -> usize {
        self.entries
            .values()
            .filter(|e| e.state.status() == status)
            .count()
    }
}
