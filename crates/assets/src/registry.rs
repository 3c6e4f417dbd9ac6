use std::collections::BTreeMap;
use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use terrascope_geo::TileWithLod;
use terrascope_stream::{LoadError, SceneSink};

use crate::asset::{AssetHandle, AssetId, TileAsset};

/// Errors from asset registry operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a resident tile asset sits in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub locator: String,
    pub asset: AssetId,
    pub handle: AssetHandle,
    pub offset: DVec3,
    pub placeholder: bool,
}

/// Scene sink that records what is placed where.
///
/// Stands in for a scene graph: it keeps one placement per resident key and
/// counts how many handles came back. The placement list can be written out
/// as JSON for inspection.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    placements: BTreeMap<TileWithLod, Placement>,
    placed: usize,
    released: usize,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TileWithLod) -> Option<&Placement> {
        self.placements.get(key)
    }

    /// Current placements in key order.
    pub fn placements(&self) -> impl Iterator<Item = (&TileWithLod, &Placement)> {
        self.placements.iter()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Total placements since creation.
    pub fn placed_count(&self) -> usize {
        self.placed
    }

    /// Total handles released since creation, including late arrivals that
    /// were never placed.
    pub fn released_count(&self) -> usize {
        self.released
    }

    pub fn placeholder_count(&self) -> usize {
        self.placements.values().filter(|p| p.placeholder).count()
    }

    /// Write the current placements to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let file = std::fs::File::create(path)?;
        let records: Vec<&Placement> = self.placements.values().collect();
        serde_json::to_writer_pretty(file, &records)?;
        Ok(())
    }
}

impl SceneSink for SceneRegistry {
    type Asset = TileAsset;

    fn place(&mut self, key: &TileWithLod, asset: &TileAsset, offset: DVec3) {
        tracing::debug!(%key, asset = ?asset.id, x = offset.x, z = offset.z, "placing tile");
        self.placements.insert(
            *key,
            Placement {
                locator: asset.locator.clone(),
                asset: asset.id,
                handle: asset.handle(),
                offset,
                placeholder: asset.is_placeholder(),
            },
        );
        self.placed += 1;
    }

    fn placeholder(&mut self, key: &TileWithLod, error: &LoadError) -> TileAsset {
        TileAsset::placeholder(key.locator(), error.to_string())
    }

    fn release(&mut self, key: &TileWithLod, asset: TileAsset) {
        // Late results were never placed; only drop a placement for this very handle.
        if self.placements.get(key).is_some_and(|p| p.handle == asset.handle()) {
            self.placements.remove(key);
        }
        self.released += 1;
    }
}
