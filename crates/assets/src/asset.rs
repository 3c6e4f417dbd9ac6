use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use terrascope_stream::LoadError;

/// Binary glTF magic, `glTF` in little-endian.
const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const GLB_HEADER_LEN: usize = 12;
const GLB_CHUNK_HEADER_LEN: usize = 8;
/// Chunk type of the mandatory first (JSON) chunk.
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;

/// Content-addressed asset ID computed from the asset data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest[..8]);
        AssetId(u64::from_le_bytes(id))
    }
}

/// Identity of one loaded asset instance. Two loads of the same bytes share
/// an [`AssetId`] but never a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetHandle(pub u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

impl AssetHandle {
    fn next() -> Self {
        AssetHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// What a resident tile shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileAssetKind {
    /// A binary glTF model, bytes left undecoded.
    Model { bytes: Vec<u8> },
    /// Stand-in for a tile whose fetch failed.
    Placeholder { reason: String },
}

/// Scene asset handle for one tile. Not `Clone`: each value is one handle.
#[derive(Debug, PartialEq, Eq)]
pub struct TileAsset {
    pub id: AssetId,
    handle: AssetHandle,
    pub locator: String,
    pub kind: TileAssetKind,
}

impl TileAsset {
    /// Validate a binary glTF container and wrap it.
    pub fn from_glb(locator: impl Into<String>, bytes: Vec<u8>) -> Result<Self, LoadError> {
        let locator = locator.into();
        if let Err(reason) = check_glb(&bytes) {
            return Err(LoadError::Malformed { locator, reason });
        }
        Ok(Self {
            id: AssetId::of(&bytes),
            handle: AssetHandle::next(),
            locator,
            kind: TileAssetKind::Model { bytes },
        })
    }

    pub fn placeholder(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        let locator = locator.into();
        let mut tag = b"placeholder:".to_vec();
        tag.extend_from_slice(locator.as_bytes());
        Self {
            id: AssetId::of(&tag),
            handle: AssetHandle::next(),
            locator,
            kind: TileAssetKind::Placeholder {
                reason: reason.into(),
            },
        }
    }

    pub fn handle(&self) -> AssetHandle {
        self.handle
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, TileAssetKind::Placeholder { .. })
    }

    pub fn byte_len(&self) -> usize {
        match &self.kind {
            TileAssetKind::Model { bytes } => bytes.len(),
            TileAssetKind::Placeholder { .. } => 0,
        }
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Header-level checks only: magic, version, declared length and the JSON
/// chunk. Mesh data is not decoded.
fn check_glb(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < GLB_HEADER_LEN + GLB_CHUNK_HEADER_LEN {
        return Err(format!("{} bytes is too short for a glb file", bytes.len()));
    }
    let magic = read_u32(bytes, 0);
    if magic != GLB_MAGIC {
        return Err(format!("bad magic {magic:#010x}"));
    }
    let version = read_u32(bytes, 4);
    if version != GLB_VERSION {
        return Err(format!("unsupported glb version {version}"));
    }
    let declared = read_u32(bytes, 8) as usize;
    if declared != bytes.len() {
        return Err(format!(
            "declared length {declared} does not match {} bytes",
            bytes.len()
        ));
    }
    let chunk_len = read_u32(bytes, GLB_HEADER_LEN) as usize;
    let chunk_type = read_u32(bytes, GLB_HEADER_LEN + 4);
    if chunk_type != GLB_CHUNK_JSON {
        return Err(format!("first chunk is {chunk_type:#010x}, expected JSON"));
    }
    if GLB_HEADER_LEN + GLB_CHUNK_HEADER_LEN + chunk_len > bytes.len() {
        return Err(format!("JSON chunk of {chunk_len} bytes overruns the file"));
    }
    Ok(())
}

/// Build a minimal glb container around a JSON document. Used by tests and
/// by the CLI's demo tile writer.
pub fn minimal_glb(json: &str) -> Vec<u8> {
    let mut chunk = json.as_bytes().to_vec();
    while chunk.len() % 4 != 0 {
        chunk.push(b' ');
    }
    let total = GLB_HEADER_LEN + GLB_CHUNK_HEADER_LEN + chunk.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&GLB_CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&chunk);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_glb() {
        let bytes = minimal_glb(r#"{"asset":{"version":"2.0"}}"#);
        assert_eq!(bytes.len() % 4, 0);
        let asset = TileAsset::from_glb("lod1/15/1/2", bytes.clone()).unwrap();
        assert_eq!(asset.id, AssetId::of(&bytes));
        assert_eq!(asset.byte_len(), bytes.len());
        assert!(!asset.is_placeholder());
    }

    #[test]
    fn same_bytes_get_distinct_handles() {
        let bytes = minimal_glb("{}");
        let a = TileAsset::from_glb("lod1/15/1/2", bytes.clone()).unwrap();
        let b = TileAsset::from_glb("lod1/15/1/2", bytes).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.handle(), b.handle());
        assert_ne!(a, b);
    }

    #[test]
    fn content_addressed_ids() {
        let a = minimal_glb(r#"{"asset":{"version":"2.0"}}"#);
        let b = minimal_glb(r#"{"asset":{"version":"2.0"},"scene":0}"#);
        assert_eq!(AssetId::of(&a), AssetId::of(&a.clone()));
        assert_ne!(AssetId::of(&a), AssetId::of(&b));
    }

    #[test]
    fn rejects_malformed_containers() {
        let good = minimal_glb("{}");

        let mut bad_magic = good.clone();
        bad_magic[0] = b'x';
        let mut bad_version = good.clone();
        bad_version[4] = 1;
        let mut truncated = good.clone();
        truncated.pop();
        let mut bad_chunk = good.clone();
        bad_chunk[16] = b'B';
        let mut overrun = good.clone();
        overrun[12] = 0xff;

        for bytes in [b"glTF".to_vec(), bad_magic, bad_version, truncated, bad_chunk, overrun] {
            let err = TileAsset::from_glb("lod1/1/0/0", bytes).unwrap_err();
            assert!(matches!(err, LoadError::Malformed { .. }), "{err}");
        }
    }

    #[test]
    fn placeholder_is_distinguishable() {
        let p = TileAsset::placeholder("lod3/15/1/2", "tile not found");
        assert!(p.is_placeholder());
        assert_eq!(p.byte_len(), 0);
        assert_ne!(p.id, TileAsset::placeholder("lod1/15/1/2", "x").id);
    }
}
