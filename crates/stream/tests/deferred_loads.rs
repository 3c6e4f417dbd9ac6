//! Scheduler behaviour with fetches that resolve only when the test says so.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use glam::DVec3;
use terrascope_geo::{GeoPoint, Lod, PlanarPoint, TileAddress, TileWithLod};
use terrascope_stream::{
    EntryStatus, LoadCompleter, LoadError, SceneSink, StreamConfig, TileLoader, TileStreamer,
    ViewParams,
};

const MUNICH: GeoPoint = GeoPoint::new(48.14738, 11.57403);

/// Handle standing in for a scene asset. Each one is unique.
#[derive(Debug, PartialEq, Eq, Hash)]
struct Handle(u64);

#[derive(Default)]
struct Held {
    completers: Vec<LoadCompleter<Handle>>,
    issued: Vec<TileWithLod>,
    next: u64,
}

/// Loader that parks every request until the test completes it.
#[derive(Clone, Default)]
struct DeferredLoader(Rc<RefCell<Held>>);

impl DeferredLoader {
    fn take(&self, key: TileWithLod) -> Option<(LoadCompleter<Handle>, Handle)> {
        let mut held = self.0.borrow_mut();
        let pos = held.completers.iter().position(|c| c.key() == key)?;
        let completer = held.completers.remove(pos);
        held.next += 1;
        Some((completer, Handle(held.next)))
    }

    fn succeed(&self, key: TileWithLod) {
        let (completer, handle) = self.take(key).expect("no parked request");
        completer.loaded(handle);
    }

    fn fail(&self, key: TileWithLod) {
        let (completer, _) = self.take(key).expect("no parked request");
        completer.failed(LoadError::NotFound(key.locator()));
    }

    fn succeed_all(&self) {
        let keys: Vec<_> = self.0.borrow().completers.iter().map(|c| c.key()).collect();
        for key in keys {
            self.succeed(key);
        }
    }

    fn issued(&self) -> Vec<TileWithLod> {
        self.0.borrow().issued.clone()
    }
}

impl TileLoader for DeferredLoader {
    type Asset = Handle;

    fn load(&self, key: TileWithLod, completer: LoadCompleter<Handle>) {
        let mut held = self.0.borrow_mut();
        held.issued.push(key);
        held.completers.push(completer);
    }
}

/// Tracks which handles are live in the scene.
#[derive(Default)]
struct LedgerSink {
    live: HashMap<u64, TileWithLod>,
    placed: usize,
    released: usize,
    next_placeholder: u64,
}

impl SceneSink for LedgerSink {
    type Asset = Handle;

    fn place(&mut self, key: &TileWithLod, asset: &Handle, _offset: DVec3) {
        self.live.insert(asset.0, *key);
        self.placed += 1;
    }

    fn placeholder(&mut self, _key: &TileWithLod, _error: &LoadError) -> Handle {
        self.next_placeholder += 1;
        Handle(1_000_000 + self.next_placeholder)
    }

    fn release(&mut self, _key: &TileWithLod, asset: Handle) {
        self.live.remove(&asset.0);
        self.released += 1;
    }
}

fn setup() -> (DeferredLoader, TileStreamer<DeferredLoader, LedgerSink>) {
    let loader = DeferredLoader::default();
    let streamer = TileStreamer::new(
        StreamConfig::default(),
        MUNICH,
        loader.clone(),
        LedgerSink::default(),
    )
    .unwrap();
    (loader, streamer)
}

#[test]
fn pending_key_is_never_reissued() {
    let (loader, mut s) = setup();
    for _ in 0..5 {
        s.tick().unwrap();
    }
    // Nothing resolved: each tick moves one ring outward, never re-requesting
    // a key that is already pending.
    let issued = loader.issued();
    let unique: HashSet<_> = issued.iter().collect();
    assert_eq!(unique.len(), issued.len());
    assert_eq!(s.pending_count(), issued.len());

    let center = s.center_tile().unwrap();
    let max_ring = issued
        .iter()
        .map(|k| k.tile.ring_distance(&center))
        .max()
        .unwrap();
    assert_eq!(max_ring, 4);
}

#[test]
fn no_duplicate_issuance_over_many_ticks() {
    let (loader, mut s) = setup();
    for i in 0..20 {
        s.tick().unwrap();
        if i % 2 == 0 {
            loader.succeed_all();
        }
    }
    let issued = loader.issued();
    let unique: HashSet<_> = issued.iter().collect();
    assert_eq!(unique.len(), issued.len());
}

#[test]
fn farther_rings_wait_while_a_nearer_ring_issues() {
    let (loader, mut s) = setup();
    let first = s.tick().unwrap();
    assert_eq!(first.issued_ring, Some(0));

    loader.succeed_all();
    let second = s.tick().unwrap();
    assert_eq!(second.issued_ring, Some(1));
    assert!(
        loader
            .issued()
            .iter()
            .all(|k| k.tile.ring_distance(&first.center) <= 1)
    );
}

#[test]
fn old_tier_stays_until_new_tier_loads() {
    let (loader, mut s) = setup();
    let center = s.center_tile().unwrap();
    let base = TileWithLod::new(center, Lod(1));
    let detailed = TileWithLod::new(center, Lod(3));

    // Far camera: base tier only.
    s.set_camera(PlanarPoint::ORIGIN, 5_000.0);
    s.tick().unwrap();
    loader.succeed(base);
    s.tick().unwrap();
    assert_eq!(s.entry_status(&base), Some(EntryStatus::Loaded));

    // Camera comes close: the detailed tier is wanted.
    s.set_camera(PlanarPoint::ORIGIN, 300.0);
    let report = s.tick().unwrap();
    assert!(report.issued.contains(&detailed));
    assert!(!report.status.center_tile_loading);

    for _ in 0..3 {
        let report = s.tick().unwrap();
        assert!(!report.evicted.contains(&base));
        assert_eq!(s.entry_status(&base), Some(EntryStatus::Loaded));
        assert_eq!(s.entry_status(&detailed), Some(EntryStatus::Pending));
    }

    loader.succeed(detailed);
    let report = s.tick().unwrap();
    assert!(report.evicted.contains(&base));
    assert!(!s.contains(&base));
    assert_eq!(s.entry_status(&detailed), Some(EntryStatus::Loaded));
}

#[test]
fn old_tier_goes_when_new_tier_fails() {
    let (loader, mut s) = setup();
    let center = s.center_tile().unwrap();
    let base = TileWithLod::new(center, Lod(1));
    let detailed = TileWithLod::new(center, Lod(3));

    s.set_camera(PlanarPoint::ORIGIN, 5_000.0);
    s.tick().unwrap();
    loader.succeed(base);
    s.set_camera(PlanarPoint::ORIGIN, 300.0);
    s.tick().unwrap();
    assert!(s.contains(&base));

    loader.fail(detailed);
    let report = s.tick().unwrap();
    assert!(report.evicted.contains(&base));
    assert_eq!(s.entry_status(&detailed), Some(EntryStatus::Failed));
    assert!(report.status.center_tile_missing);
}

#[test]
fn late_result_for_evicted_entry_is_released() {
    let (loader, mut s) = setup();
    let first = s.tick().unwrap();
    let key = first.issued[0];

    // Jump far away while the center tile is still in flight.
    s.set_camera(PlanarPoint::new(80_000.0, 0.0), 500.0);
    let report = s.tick().unwrap();
    assert!(report.evicted.contains(&key));
    assert!(!s.contains(&key));

    loader.succeed(key);
    s.poll_completions();
    assert!(!s.contains(&key));
    assert_eq!(s.sink().placed, 0);
    assert_eq!(s.sink().released, 1);
    assert!(s.sink().live.is_empty());
}

#[test]
fn reissued_key_ignores_the_stale_result() {
    let (loader, mut s) = setup();
    let key = s.tick().unwrap().issued[0];

    // Evict while pending, then come back so the same key is issued again.
    s.set_camera(PlanarPoint::new(80_000.0, 0.0), 500.0);
    s.tick().unwrap();
    s.set_camera(PlanarPoint::ORIGIN, 500.0);
    let report = s.tick().unwrap();
    assert!(report.issued.contains(&key));

    // The first (stale) request resolves first; the entry must stay pending.
    loader.succeed(key);
    s.poll_completions();
    assert_eq!(s.entry_status(&key), Some(EntryStatus::Pending));

    loader.succeed(key);
    s.poll_completions();
    assert_eq!(s.entry_status(&key), Some(EntryStatus::Loaded));
    assert_eq!(s.sink().live.len(), 1);
}

#[test]
fn set_view_releases_loaded_entries_and_ignores_old_results() {
    let (loader, mut s) = setup();
    for _ in 0..3 {
        s.tick().unwrap();
        loader.succeed_all();
    }
    s.poll_completions();
    let loaded = s
        .entries()
        .iter()
        .filter(|(_, st)| *st == EntryStatus::Loaded)
        .count();
    assert!(loaded > 0);
    assert_eq!(s.pending_count(), 0);

    let released = s.set_view(GeoPoint::new(40.4168, -3.7038), ViewParams::default());
    assert_eq!(released, loaded);
    assert_eq!(s.sink().released, loaded);
    assert_eq!(s.resident_count(), 0);
    assert!(s.sink().live.is_empty());

    s.tick().unwrap();
    let before = s.entries();
    s.poll_completions();
    assert_eq!(s.entries(), before);
}

#[test]
fn pending_entries_at_reset_release_on_arrival() {
    let (loader, mut s) = setup();
    let key = s.tick().unwrap().issued[0];
    assert_eq!(s.set_view(GeoPoint::new(51.5074, -0.1278), ViewParams::default()), 0);

    loader.succeed(key);
    assert_eq!(s.poll_completions(), 0);
    assert_eq!(s.sink().released, 1);
    assert_eq!(s.resident_count(), 0);
}

#[test]
fn dropped_request_resolves_as_failure() {
    let (loader, mut s) = setup();
    let key = s.tick().unwrap().issued[0];
    let (completer, _) = loader.take(key).unwrap();
    drop(completer);

    s.tick().unwrap();
    assert_eq!(s.entry_status(&key), Some(EntryStatus::Failed));
}

#[test]
fn handles_never_leak_across_a_journey() {
    let (loader, mut s) = setup();
    let waypoints = [
        PlanarPoint::ORIGIN,
        PlanarPoint::new(1_500.0, 0.0),
        PlanarPoint::new(1_500.0, 2_000.0),
        PlanarPoint::new(-3_000.0, -500.0),
        PlanarPoint::new(20_000.0, 0.0),
    ];
    for (i, target) in waypoints.iter().enumerate() {
        s.set_camera(*target, if i % 2 == 0 { 400.0 } else { 2_500.0 });
        for _ in 0..4 {
            s.tick().unwrap();
            loader.succeed_all();
        }
    }
    s.poll_completions();

    let resolved = s
        .entries()
        .iter()
        .filter(|(_, st)| st.is_resolved())
        .count();
    assert_eq!(s.sink().live.len(), resolved);
    assert_eq!(s.sink().placed - s.sink().released, resolved);

    let tiles: HashSet<TileAddress> = s.entries().iter().map(|(k, _)| k.tile).collect();
    assert!(!tiles.is_empty());
}
