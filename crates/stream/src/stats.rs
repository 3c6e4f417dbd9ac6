use std::collections::VecDeque;
use std::time::Duration;

use terrascope_geo::{TileAddress, TileWithLod};

/// Center tile state reported to status subscribers after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStatus {
    /// No tier of the center tile is loaded and none has failed yet.
    pub center_tile_loading: bool,
    /// No tier of the center tile is loaded and at least one fetch failed.
    pub center_tile_missing: bool,
}

/// What one tick decided.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Tile under the camera target at the reference zoom.
    pub center: TileAddress,
    /// Loads issued this tick, in issuance order.
    pub issued: Vec<TileWithLod>,
    /// Ring the issued loads belong to, if any were issued.
    pub issued_ring: Option<u32>,
    /// Entries evicted this tick, in key order.
    pub evicted: Vec<TileWithLod>,
    /// Fetch results applied at the start of the tick.
    pub resolved: usize,
    pub status: StreamStatus,
}

/// Per-tick streaming statistics for instrumentation.
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub loads_issued_this_tick: usize,
    pub evicted_this_tick: usize,
    pub resolved_this_tick: usize,
    pub candidates: usize,
    pub resident: usize,
    pub pending: usize,
    pub failed: usize,
    pub tick_time: Duration,
}

/// The most recent ticks' statistics, oldest first.
///
/// Answers questions about streaming progress over a window, such as how many
/// loads went out or how long ticks took, without the caller keeping its own
/// log.
#[derive(Debug)]
pub struct TickHistory {
    ticks: VecDeque<TickStats>,
    capacity: usize,
}

impl TickHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ticks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, stats: &TickStats) {
        if self.ticks.len() == self.capacity {
            self.ticks.pop_front();
        }
        self.ticks.push_back(stats.clone());
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickStats> {
        self.ticks.iter()
    }

    pub fn loads_issued(&self) -> usize {
        self.ticks.iter().map(|t| t.loads_issued_this_tick).sum()
    }

    pub fn evicted(&self) -> usize {
        self.ticks.iter().map(|t| t.evicted_this_tick).sum()
    }

    pub fn resolved(&self) -> usize {
        self.ticks.iter().map(|t| t.resolved_this_tick).sum()
    }

    /// Highest number of in-flight fetches at the end of any recorded tick.
    pub fn peak_pending(&self) -> usize {
        self.ticks.iter().map(|t| t.pending).max().unwrap_or(0)
    }

    /// Recorded ticks, counted from the newest backwards, that issued nothing
    /// and still had fetches in flight.
    pub fn stalled_ticks(&self) -> usize {
        self.ticks
            .iter()
            .rev()
            .take_while(|t| t.loads_issued_this_tick == 0 && t.pending > 0)
            .count()
    }

    pub fn average_tick_time(&self) -> Duration {
        if self.ticks.is_empty() {
            return Duration::ZERO;
        }
        self.ticks.iter().map(|t| t.tick_time).sum::<Duration>() / self.ticks.len() as u32
    }

    pub fn max_tick_time(&self) -> Duration {
        self.ticks
            .iter()
            .map(|t| t.tick_time)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}
