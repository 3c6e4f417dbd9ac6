//! Streaming: the resident tile cache and the LOD scheduler that decides,
//! tick by tick, which tiles to fetch, in what order and at what detail, and
//! which to release.
//!
//! # Invariants
//! - At most one fetch is in flight per [`TileWithLod`](terrascope_geo::TileWithLod):
//!   a pending entry is inserted before the loader is called.
//! - Loads are issued ring by ring from the tile under the camera; a farther
//!   ring is never issued in a tick where a nearer one issued anything.
//! - An old detail tier stays resident until its replacement has resolved.
//! - Every owned handle goes back to the sink exactly once: on eviction, on
//!   reset, or on arrival if its entry is already gone.

mod cache;
mod config;
mod loader;
mod scheduler;
mod stats;

pub use cache::EntryStatus;
pub use config::{ConfigError, MAX_RING_LIMIT, StreamConfig};
pub use loader::{LoadCompleter, LoadError, SceneSink, TileLoader};
pub use scheduler::{
    CameraState, StreamError, TICK_HISTORY_LEN, TileStreamer, ViewParams, distance_to_tile,
};
pub use stats::{StreamStatus, TickHistory, TickReport, TickStats};

pub fn crate_info() -> &'static str {
    "terrascope-stream v0.1.0"
}
