use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use terrascope_geo::TileWithLod;
use terrascope_stream::{LoadCompleter, LoadError, TileLoader};

use crate::asset::{TileAsset, minimal_glb};

/// Loads tiles laid out as `{root}/lod{lod}/{zoom}/{x}/{y}.glb`.
///
/// Each request is read on its own background thread; the result goes back
/// through the completer.
#[derive(Debug, Clone)]
pub struct FileTileLoader {
    root: PathBuf,
}

impl FileTileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the asset for `key`.
    pub fn path_for(&self, key: &TileWithLod) -> PathBuf {
        self.root.join(format!("{}.glb", key.locator()))
    }
}

fn read_tile(key: &TileWithLod, path: &Path) -> Result<TileAsset, LoadError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoadError::NotFound(path.display().to_string()));
        }
        Err(err) => return Err(LoadError::Io(err)),
    };
    TileAsset::from_glb(key.locator(), bytes)
}

impl TileLoader for FileTileLoader {
    type Asset = TileAsset;

    fn load(&self, key: TileWithLod, completer: LoadCompleter<TileAsset>) {
        let path = self.path_for(&key);
        // If the spawn fails the closure, and with it the completer, is
        // dropped, which reports the request as abandoned.
        let spawned = std::thread::Builder::new()
            .name(format!("tile-{key}"))
            .spawn(move || {
                let result = read_tile(&key, &path);
                completer.complete(result);
            });
        if let Err(err) = spawned {
            tracing::warn!(%key, error = %err, "could not start tile read");
        }
    }
}

/// Produces generated tiles after a fixed latency, without touching disk.
///
/// Roughly one tile in `fail_one_in` fails, chosen by a hash of its locator
/// so runs are repeatable. Zero disables failures.
#[derive(Debug, Clone)]
pub struct SyntheticTileLoader {
    latency: Duration,
    fail_one_in: u64,
}

impl SyntheticTileLoader {
    pub fn new(latency: Duration, fail_one_in: u64) -> Self {
        Self {
            latency,
            fail_one_in,
        }
    }

    /// Whether the generated tile for `key` fails.
    pub fn fails(&self, key: &TileWithLod) -> bool {
        if self.fail_one_in == 0 {
            return false;
        }
        let digest = Sha256::digest(key.locator().as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(head) % self.fail_one_in == 0
    }

    fn generate(&self, key: &TileWithLod) -> Result<TileAsset, LoadError> {
        if self.fails(key) {
            return Err(LoadError::NotFound(key.locator()));
        }
        let json = format!(
            r#"{{"asset":{{"version":"2.0","generator":"terrascope synthetic"}},"extras":{{"tile":"{key}"}}}}"#
        );
        TileAsset::from_glb(key.locator(), minimal_glb(&json))
    }
}

impl TileLoader for SyntheticTileLoader {
    type Asset = TileAsset;

    fn load(&self, key: TileWithLod, completer: LoadCompleter<TileAsset>) {
        if self.latency.is_zero() {
            completer.complete(self.generate(&key));
            return;
        }
        let loader = self.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("synthetic-{key}"))
            .spawn(move || {
                std::thread::sleep(loader.latency);
                completer.complete(loader.generate(&key));
            });
        if let Err(err) = spawned {
            tracing::warn!(%key, error = %err, "could not start synthetic load");
        }
    }
}
