//! Game Module
//!
//! Client-side game logic on top of the world model and the relay protocol.
//!
//! ## Module Structure
//!
//! - `state`: roster, world, units and the packet handlers that mutate them
//! - `chat`: received chat lines with expiry
//! - `client`: connection plus state, polled once per frame

pub mod chat;
pub mod client;
pub mod state;

pub use chat::{ChatLog, ChatMessage};
pub use client::GameClient;
pub use state::{register_handlers, GameError, GameState, WorldReader};
