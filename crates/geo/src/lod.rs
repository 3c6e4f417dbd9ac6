use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tile::TileAddress;

/// Detail tier of a tile asset. Higher means more detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lod(pub u8);

impl fmt::Display for Lod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lod{}", self.0)
    }
}

/// A tile address at a specific detail tier. This is the streaming cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileWithLod {
    pub tile: TileAddress,
    pub lod: Lod,
}

impl TileWithLod {
    pub fn new(tile: TileAddress, lod: Lod) -> Self {
        Self { tile, lod }
    }

    /// Asset locator, e.g. `lod1/15/17437/11370`.
    pub fn locator(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TileWithLod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.lod, self.tile)
    }
}
