mod candidates;

use std::collections::HashMap;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use terrascope_geo::{GeoPoint, OrthographicProjection, PlanarPoint, TileAddress, TileWithLod};

use crate::cache::{EntryState, EntryStatus, TileCache};
use crate::config::{ConfigError, StreamConfig};
use crate::loader::{Completion, LoadCompleter, SceneSink, TileLoader};
use crate::stats::{StreamStatus, TickHistory, TickReport, TickStats};

pub use candidates::distance_to_tile;
use candidates::{Candidate, collect_candidates};

/// Errors surfaced by the streamer.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Geo(#[from] terrascope_geo::GeoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Camera state as seen by the streamer. Only `target` and `radius` drive
/// tile selection; bearing and tilt are carried for the view layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Point the camera orbits, in the planar frame of the current origin.
    pub target: PlanarPoint,
    /// Distance from the camera to its target, in meters.
    pub radius: f64,
    /// Degrees.
    pub bearing: f64,
    /// Degrees.
    pub tilt: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            target: PlanarPoint::ORIGIN,
            radius: 500.0,
            bearing: 90.0,
            tilt: 45.0,
        }
    }
}

/// Optional camera parameters accompanying a view change.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewParams {
    pub radius: Option<f64>,
    pub bearing: Option<f64>,
    pub tilt: Option<f64>,
}

type StatusSubscriber = Box<dyn FnMut(&StreamStatus)>;

/// Ticks kept in [`TileStreamer::history`].
pub const TICK_HISTORY_LEN: usize = 120;

/// Owns the resident tile set and decides, once per tick, what to load and
/// what to evict.
///
/// Loads are issued nearest ring first, one ring per tick. A tile changing
/// detail tier keeps its old entry until the new tier resolves. Fetch
/// results come back through a channel and are applied on the next
/// [`poll_completions`](Self::poll_completions) or [`tick`](Self::tick).
pub struct TileStreamer<L, S>
where
    L: TileLoader,
    S: SceneSink<Asset = L::Asset>,
{
    config: StreamConfig,
    projection: OrthographicProjection,
    camera: CameraState,
    cache: TileCache<L::Asset>,
    loader: L,
    sink: S,
    completions_tx: Sender<Completion<L::Asset>>,
    completions_rx: Receiver<Completion<L::Asset>>,
    status_subscriber: Option<StatusSubscriber>,
    stats: TickStats,
    history: TickHistory,
}

impl<L, S> TileStreamer<L, S>
where
    L: TileLoader,
    S: SceneSink<Asset = L::Asset>,
{
    pub fn new(
        config: StreamConfig,
        origin: GeoPoint,
        loader: L,
        sink: S,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        let (completions_tx, completions_rx) = crossbeam_channel::unbounded();
        Ok(Self {
            config,
            projection: OrthographicProjection::new(origin),
            camera: CameraState::default(),
            cache: TileCache::new(),
            loader,
            sink,
            completions_tx,
            completions_rx,
            status_subscriber: None,
            stats: TickStats::default(),
            history: TickHistory::new(TICK_HISTORY_LEN),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn origin(&self) -> GeoPoint {
        self.projection.origin()
    }

    pub fn projection(&self) -> &OrthographicProjection {
        &self.projection
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Statistics from the last tick.
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Statistics of the most recent ticks.
    pub fn history(&self) -> &TickHistory {
        &self.history
    }

    /// Receive the center tile status after every tick.
    pub fn subscribe_status(&mut self, subscriber: impl FnMut(&StreamStatus) + 'static) {
        self.status_subscriber = Some(Box::new(subscriber));
    }

    /// Move the camera within the current view. Resident tiles stay valid.
    pub fn set_camera(&mut self, target: PlanarPoint, radius: f64) {
        self.camera.target = target;
        self.camera.radius = radius;
    }

    /// Jump to a new origin.
    ///
    /// Every planar position computed under the old origin is invalid, so the
    /// whole cache is released rather than reprojected. The camera target
    /// moves to the new origin. Returns the number of handles released.
    pub fn set_view(&mut self, origin: GeoPoint, params: ViewParams) -> usize {
        let released = self.reset();
        self.projection = OrthographicProjection::new(origin);
        self.camera.target = PlanarPoint::ORIGIN;
        if let Some(radius) = params.radius {
            self.camera.radius = radius;
        }
        if let Some(bearing) = params.bearing {
            self.camera.bearing = bearing;
        }
        if let Some(tilt) = params.tilt {
            self.camera.tilt = tilt;
        }
        tracing::info!(%origin, released, "view reset");
        released
    }

    /// Drop every entry, releasing all owned handles. Pending fetches resolve
    /// into nothing: their results are released on arrival.
    pub fn reset(&mut self) -> usize {
        let mut released = 0;
        for (key, state) in self.cache.drain() {
            if let Some(asset) = state.into_asset() {
                self.sink.release(&key, asset);
                released += 1;
            }
        }
        released
    }

    pub fn entry_status(&self, key: &TileWithLod) -> Option<EntryStatus> {
        self.cache.status(key)
    }

    pub fn contains(&self, key: &TileWithLod) -> bool {
        self.cache.contains(key)
    }

    /// All resident keys with their status, in key order.
    pub fn entries(&self) -> Vec<(TileWithLod, EntryStatus)> {
        let mut entries: Vec<_> = self.cache.statuses().collect();
        entries.sort_by_key(|(k, _)| *k);
        entries
    }

    pub fn resident_count(&self) -> usize {
        self.cache.len()
    }

    pub fn pending_count(&self) -> usize {
        self.cache.count(EntryStatus::Pending)
    }

    /// Tile under the camera target at the reference zoom.
    pub fn center_tile(&self) -> Result<TileAddress, StreamError> {
        let camera_geo = self.projection.to_geo(self.camera.target);
        Ok(TileAddress::at_geo_point(
            self.config.reference_zoom,
            camera_geo,
        )?)
    }

    /// Apply every fetch result received so far. Returns how many entries
    /// were resolved.
    pub fn poll_completions(&mut self) -> usize {
        let mut resolved = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.apply_completion(completion) {
                resolved += 1;
            }
        }
        resolved
    }

    /// Run one scheduling step: apply finished fetches, issue the next ring of
    /// loads, evict what is no longer wanted and report the center status.
    pub fn tick(&mut self) -> Result<TickReport, StreamError> {
        let _span = tracing::info_span!("stream_tick").entered();
        let tick_start = Instant::now();

        let resolved = self.poll_completions();
        let center = self.center_tile()?;
        let candidates = collect_candidates(
            &self.config,
            &self.projection,
            self.camera.target,
            self.camera.radius,
            center,
        );

        let (issued, issued_ring) = self.issue_loads(&candidates);
        let evicted = self.evict_unwanted(&candidates);
        let status = self.center_status(center);

        if let Some(subscriber) = self.status_subscriber.as_mut() {
            subscriber(&status);
        }

        self.stats = TickStats {
            loads_issued_this_tick: issued.len(),
            evicted_this_tick: evicted.len(),
            resolved_this_tick: resolved,
            candidates: candidates.len(),
            resident: self.cache.len(),
            pending: self.cache.count(EntryStatus::Pending),
            failed: self.cache.count(EntryStatus::Failed),
            tick_time: tick_start.elapsed(),
        };
        self.history.record(&self.stats);

        tracing::trace!(
            %center,
            issued = issued.len(),
            evicted = evicted.len(),
            resolved,
            resident = self.stats.resident,
            "stream tick complete"
        );

        Ok(TickReport {
            center,
            issued,
            issued_ring,
            evicted,
            resolved,
            status,
        })
    }

    /// Walk rings outward, issuing every absent key, and stop after the
    /// first ring that issued anything.
    fn issue_loads(&mut self, candidates: &[Candidate]) -> (Vec<TileWithLod>, Option<u32>) {
        let mut issued = Vec::new();
        let mut ring = None;

        for candidate in candidates {
            if ring != Some(candidate.ring) {
                if !issued.is_empty() {
                    break;
                }
                ring = Some(candidate.ring);
            }
            let key = candidate.key;
            let Some(entry) = self.cache.insert_pending(key) else {
                continue;
            };
            tracing::debug!(%key, ring = candidate.ring, distance = candidate.distance, "loading tile");
            let completer = LoadCompleter::new(key, entry, self.completions_tx.clone());
            self.loader.load(key, completer);
            issued.push(key);
        }

        let issued_ring = if issued.is_empty() { None } else { ring };
        (issued, issued_ring)
    }

    /// Evict entries that are not wanted, except old tiers standing in for a
    /// wanted tier of the same tile that has not resolved yet.
    fn evict_unwanted(&mut self, candidates: &[Candidate]) -> Vec<TileWithLod> {
        let wanted: HashMap<TileAddress, TileWithLod> =
            candidates.iter().map(|c| (c.key.tile, c.key)).collect();

        let mut unwanted: Vec<TileWithLod> = self
            .cache
            .keys()
            .filter(|key| match wanted.get(&key.tile) {
                Some(replacement) if replacement == *key => false,
                Some(replacement) => self.cache.is_resolved(replacement),
                None => true,
            })
            .copied()
            .collect();
        unwanted.sort();

        for key in &unwanted {
            if let Some(state) = self.cache.remove(key) {
                tracing::debug!(%key, "evicting tile");
                if let Some(asset) = state.into_asset() {
                    self.sink.release(key, asset);
                }
            }
        }
        unwanted
    }

    fn center_status(&self, center: TileAddress) -> StreamStatus {
        let mut loaded = false;
        let mut failed = false;
        for status in self.cache.tile_statuses(center) {
            match status {
                EntryStatus::Loaded => loaded = true,
                EntryStatus::Failed => failed = true,
                EntryStatus::Pending => {}
            }
        }
        StreamStatus {
            center_tile_loading: !loaded && !failed,
            center_tile_missing: !loaded && failed,
        }
    }

    /// Move a pending entry to `Loaded` or `Failed` and hand it to the sink.
    /// Results for entries that were evicted or replaced are released at once.
    fn apply_completion(&mut self, completion: Completion<L::Asset>) -> bool {
        let Completion { key, entry, result } = completion;

        if !self.cache.is_pending(&key, entry) {
            tracing::debug!(%key, "dropping result for evicted tile");
            if let Ok(asset) = result {
                self.sink.release(&key, asset);
            }
            return false;
        }

        let state = match result {
            Ok(asset) => {
                tracing::debug!(%key, "tile loaded");
                EntryState::Loaded(asset)
            }
            Err(err) => {
                tracing::warn!(%key, error = %err, "tile fetch failed");
                EntryState::Failed(self.sink.placeholder(&key, &err))
            }
        };

        let offset = self
            .projection
            .to_planar(key.tile.bounds().center)
            .placement();
        if let EntryState::Loaded(asset) | EntryState::Failed(asset) = &state {
            self.sink.place(&key, asset, offset);
        }

        match self.cache.resolve(&key, entry, state) {
            Ok(()) => true,
            Err(state) => {
                if let Some(asset) = state.into_asset() {
                    self.sink.release(&key, asset);
                }
                false
            }
        }
    }
}
