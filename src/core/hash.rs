//! World Checksums
//!
//! SHA-256 digests over world state, so a host and a freshly synced peer
//! can confirm they hold the same map after a `WorldUpdate`.
//! Hashed in storage order; every integer is fed big-endian, matching
//! the wire codec.

use sha2::{Digest, Sha256};

use crate::core::hex::HexCoord;

/// Digest output (256 bits / 32 bytes).
pub type WorldHash = [u8; 32];

/// Incremental hasher for world state.
pub struct WorldHasher {
    hasher: Sha256,
}

impl WorldHasher {
    /// Create a new hasher with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for full tile grids.
    pub fn for_world() -> Self {
        Self::new(b"HEXLINK_WORLD_V1")
    }

    /// Hasher for unit placement.
    pub fn for_units() -> Self {
        Self::new(b"HEXLINK_UNITS_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with an i32 value.
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_be_bytes());
    }

    /// Update with a u32 value.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_be_bytes());
    }

    /// Update with a coordinate.
    #[inline]
    pub fn update_coord(&mut self, coord: HexCoord) {
        self.update_i32(coord.q());
        self.update_i32(coord.r());
        self.update_i32(coord.s());
    }

    /// Update with a string, NUL-terminated as on the wire.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.hasher.update(value.as_bytes());
        self.hasher.update([0u8]);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> WorldHash {
        self.hasher.finalize().into()
    }
}

/// Short printable prefix of a digest, for log lines.
pub fn short_hash(hash: &WorldHash) -> String {
    hex::encode(&hash[..6])
}
