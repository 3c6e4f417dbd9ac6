//! Seams to the outside world: the asynchronous tile loader and the scene
//! placement sink.

use crossbeam_channel::Sender;
use glam::DVec3;
use terrascope_geo::TileWithLod;

use crate::cache::EntryId;

/// Why a tile fetch did not produce an asset.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tile not found: {0}")]
    NotFound(String),
    #[error("malformed tile {locator}: {reason}")]
    Malformed { locator: String, reason: String },
    #[error("load request for {0} was dropped without a result")]
    Abandoned(TileWithLod),
}

/// Result of one fetch, tagged with the cache entry it was issued for.
pub(crate) struct Completion<A> {
    pub(crate) key: TileWithLod,
    pub(crate) entry: EntryId,
    pub(crate) result: Result<A, LoadError>,
}

/// One-shot handle through which a loader reports the outcome of a fetch.
///
/// The result is queued and applied by the streamer on its next poll, never
/// from the loader's thread. Dropping the completer without reporting counts
/// as a failure so the entry does not stay pending forever.
pub struct LoadCompleter<A> {
    key: TileWithLod,
    entry: EntryId,
    tx: Option<Sender<Completion<A>>>,
}

impl<A> LoadCompleter<A> {
    pub(crate) fn new(key: TileWithLod, entry: EntryId, tx: Sender<Completion<A>>) -> Self {
        Self {
            key,
            entry,
            tx: Some(tx),
        }
    }

    pub fn key(&self) -> TileWithLod {
        self.key
    }

    pub fn complete(mut self, result: Result<A, LoadError>) {
        self.send(result);
    }

    pub fn loaded(self, asset: A) {
        self.complete(Ok(asset));
    }

    pub fn failed(self, error: LoadError) {
        self.complete(Err(error));
    }

    fn send(&mut self, result: Result<A, LoadError>) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let completion = Completion {
            key: self.key,
            entry: self.entry,
            result,
        };
        if tx.send(completion).is_err() {
            tracing::trace!(key = %self.key, "streamer gone, dropping tile result");
        }
    }
}

impl<A> Drop for LoadCompleter<A> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            let key = self.key;
            self.send(Err(LoadError::Abandoned(key)));
        }
    }
}

/// Asynchronous tile fetcher.
///
/// `load` must not block: it starts the fetch and returns, reporting the
/// outcome later through the completer. The asset locator is
/// [`TileWithLod::locator`].
pub trait TileLoader {
    type Asset: Send + 'static;

    fn load(&self, key: TileWithLod, completer: LoadCompleter<Self::Asset>);
}

/// Scene-side consumer of resident tile assets.
pub trait SceneSink {
    type Asset;

    /// Place a resolved asset at `offset` from the scene origin.
    fn place(&mut self, key: &TileWithLod, asset: &Self::Asset, offset: DVec3);

    /// Build the stand-in shown for a tile whose fetch failed.
    fn placeholder(&mut self, key: &TileWithLod, error: &LoadError) -> Self::Asset;

    /// Take back ownership of an asset that is no longer resident.
    fn release(&mut self, key: &TileWithLod, asset: Self::Asset);
}
