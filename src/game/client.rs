//! Game Client
//!
//! A `PeerConnection` bound to a `GameState`. Call `poll` once per frame:
//! it dispatches whatever arrived and flushes whatever the state queued.

use tracing::info;

use crate::core::hex::HexCoord;
use crate::game::state::{register_handlers, GameError, GameState};
use crate::network::connection::{ClientConfig, PeerConnection};
use crate::network::packets::{Chat, Login};
use crate::world::pathfinding::PathResult;
use crate::world::units::UnitCategory;

/// One player's connection plus game state.
#[derive(Debug)]
pub struct GameClient {
    connection: PeerConnection<GameState>,
    state: GameState,
}

impl GameClient {
    /// Connect, wire the handlers and log in.
    pub fn connect(config: &ClientConfig) -> Result<Self, GameError> {
        Self::connect_with(config, GameState::from_config(config))
    }

    /// Like `connect`, with a prepared state.
    pub fn connect_with(config: &ClientConfig, state: GameState) -> Result<Self, GameError> {
        let mut connection = PeerConnection::connect(&config.server_addr)?;
        register_handlers(&mut connection);
        connection.send_to_host(&Login {
            game_id: config.game_id.clone(),
            nickname: state.nickname.clone(),
        })?;
        info!(nickname = %state.nickname, game = %config.game_id, "Login sent");
        Ok(Self { connection, state })
    }

    /// Dispatch received frames, then flush queued ones. Returns the number
    /// of frames handled.
    pub fn poll(&mut self) -> Result<usize, GameError> {
        let handled = self.connection.handle_tasks(&mut self.state)?;
        if !self.connection.is_closed() {
            self.state.flush(&self.connection.sender())?;
        }
        Ok(handled)
    }

    /// Say something to everyone in the game, ourselves included.
    pub fn send_chat(&mut self, text: &str) -> Result<(), GameError> {
        let msg = format!("{}: {}", self.state.nickname, text);
        self.connection.send_to_host(&Chat { msg })?;
        Ok(())
    }

    /// Spawn a military unit of ours on `coord`.
    pub fn spawn_unit(&mut self, coord: HexCoord) -> Result<(), GameError> {
        let unit = self.state.new_unit();
        self.state.spawn_military_unit(coord, unit)
    }

    /// Move one of our units. Peers learn about it on the next `poll`.
    pub fn move_unit(
        &mut self,
        from: HexCoord,
        to: HexCoord,
        category: UnitCategory,
    ) -> Result<PathResult, GameError> {
        self.state.move_unit(from, to, category)
    }

    /// Game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Mutable game state.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    /// True once the relay connection is gone.
    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Disconnect.
    pub fn close(&mut self) {
        self.connection.close();
    }
}
