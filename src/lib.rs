//! # Hexlink
//!
//! Hex-grid world model and binary relay protocol for a multiplayer
//! strategy game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          HEXLINK                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── hex.rs      - Cube/axial coordinates, edges, layouts    │
//! │  ├── rng.rs      - Seeded Xorshift128+ for map generation    │
//! │  └── hash.rs     - World checksums                           │
//! │                                                              │
//! │  world/          - World model (game thread)                 │
//! │  ├── grid.rs     - Cylindrical tile storage                  │
//! │  ├── tile.rs     - Per-hex data and fog of war               │
//! │  ├── units.rs    - Sparse unit store                         │
//! │  ├── terrain.rs  - Terrain table (JSON)                      │
//! │  ├── pathfinding.rs - A* under a stamina budget              │
//! │  ├── visibility.rs  - Reveal propagation                     │
//! │  └── worldgen.rs - Map generator contract                    │
//! │                                                              │
//! │  network/        - Wire protocol and transport               │
//! │  ├── codec.rs    - Big-endian reader/writer, frames          │
//! │  ├── packets.rs  - Packet catalog                            │
//! │  ├── dispatch.rs - Packet-id handler table                   │
//! │  ├── connection.rs - Client socket on an I/O thread          │
//! │  ├── session.rs  - Relay membership and routing              │
//! │  └── server.rs   - Tokio relay server                        │
//! │                                                              │
//! │  game/           - Client game state                         │
//! │  ├── state.rs    - Packet handlers, moves, spawning          │
//! │  ├── chat.rs     - Chat log                                  │
//! │  └── client.rs   - Connection + state                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data flow
//!
//! Player input runs through the pathfinder and visibility engine, mutates
//! the local world, and is encoded as a packet. The relay forwards the frame
//! untouched to the named player, to the host, or (for chat) to the whole
//! game, where the receiving peer decodes it and applies the same mutation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;
pub mod world;

// Re-export commonly used types
pub use crate::core::hex::{Edge, HexCoord, Layout};
pub use crate::game::{GameClient, GameError, GameState};
pub use crate::network::{ClientConfig, PeerConnection, RelayServer, ServerConfig};
pub use crate::world::{Tile, Unit, UnitCategory, Visibility, World};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Port the relay listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 4242;
