//! Core primitives.
//!
//! Pure value types with no I/O: hex coordinate math, world checksums and
//! the seeded PRNG used by map generation.

pub mod hash;
pub mod hex;
pub mod rng;

// Re-export core types
pub use hash::{short_hash, WorldHash, WorldHasher};
pub use hex::{Edge, EdgeCoord, HexCoord, Layout};
pub use rng::MapRng;
