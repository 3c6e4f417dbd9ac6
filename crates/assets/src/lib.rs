//! Tile assets: loaders that fetch tile models, content-addressed handles,
//! and a scene registry that tracks where resident tiles are placed.
//!
//! Assets are identified by content hashes. Tile bytes are opaque apart from
//! the binary glTF container header, which is checked so a garbage response
//! fails that one tile instead of reaching the scene.
//!
//! # Layout
//! Tile files live under a root directory as `lod{lod}/{zoom}/{x}/{y}.glb`.

mod asset;
mod loader;
mod registry;

pub use asset::{AssetHandle, AssetId, TileAsset, TileAssetKind, minimal_glb};
pub use loader::{FileTileLoader, SyntheticTileLoader};
pub use registry::{AssetError, Placement, SceneRegistry};

pub fn crate_info() -> &'static str {
    "terrascope-assets v0.1.0"
}
