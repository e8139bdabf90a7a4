//! Relay Sessions
//!
//! Membership bookkeeping and routing decisions for the relay. Pure state
//! with no I/O: every operation returns the frames to deliver and to whom,
//! and the server task performs the writes.
//!
//! The relay never looks inside game packets. It decodes `Login` and
//! routes everything else by packet id and destination:
//!
//! - `chat` goes to every member of the sender's game, sender included
//! - an empty destination goes to the game's host
//! - any other destination goes to the members with that nickname

use std::collections::BTreeMap;

use tracing::{debug, info};
use uuid::Uuid;

use crate::network::codec::{decode_payload, encode_frame, CodecError, FrameHeader, Packet, HOST};
use crate::network::packets::{Chat, InitializePlayerRequest, Login, ProxyData};

/// Server-assigned connection identifier.
pub type ConnectionId = u64;

/// Length of a minted game id.
pub const GAME_ID_LEN: usize = 6;

/// A frame bound for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Recipient.
    pub to: ConnectionId,
    /// Complete frame.
    pub frame: Vec<u8>,
}

/// Per-connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySession {
    /// Nickname, once logged in.
    pub nickname: Option<String>,
    /// Game, once logged in.
    pub game_id: Option<String>,
    /// Whether this connection hosts its game.
    pub is_host: bool,
}

impl RelaySession {
    /// True once a login was accepted.
    pub fn is_initialized(&self) -> bool {
        self.game_id.is_some()
    }
}

/// One game's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Game {
    host: ConnectionId,
    /// Join order.
    members: Vec<ConnectionId>,
}

/// Mint a short uppercase alphanumeric game id.
pub fn mint_game_id() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(GAME_ID_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Relay membership state.
#[derive(Debug, Default)]
pub struct RelayState {
    sessions: BTreeMap<ConnectionId, RelaySession>,
    games: BTreeMap<String, Game>,
}

impl RelayState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of games with at least one member.
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Session of a connection.
    pub fn session(&self, id: ConnectionId) -> Option<&RelaySession> {
        self.sessions.get(&id)
    }

    /// Host connection of a game.
    pub fn host_of(&self, game_id: &str) -> Option<ConnectionId> {
        self.games.get(game_id).map(|g| g.host)
    }

    /// Nicknames of a game's members in join order.
    pub fn players(&self, game_id: &str) -> Vec<String> {
        self.games
            .get(game_id)
            .map(|g| {
                g.members
                    .iter()
                    .filter_map(|m| self.sessions.get(m)?.nickname.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Register a new connection.
    pub fn connect(&mut self, id: ConnectionId) {
        self.sessions.insert(id, RelaySession::default());
    }

    /// Handle one complete frame from `from`.
    pub fn handle_frame(&mut self, from: ConnectionId, frame: &[u8]) -> Result<Vec<Outbound>, CodecError> {
        let (header, mut rd) = FrameHeader::peek(frame)?;

        if header.packet_id == Login::ID {
            let login = decode_payload::<Login>(&mut rd)?;
            return self.login(from, login);
        }

        let Some(game_id) = self.sessions.get(&from).and_then(|s| s.game_id.clone()) else {
            debug!(conn = from, packet = %header.packet_id, "Frame before login, dropping");
            return Ok(Vec::new());
        };
        let Some(game) = self.games.get(&game_id) else {
            return Ok(Vec::new());
        };

        let recipients: Vec<ConnectionId> = if header.packet_id == Chat::ID {
            game.members.clone()
        } else if header.is_for_host() {
            vec![game.host]
        } else {
            game.members
                .iter()
                .copied()
                .filter(|m| {
                    self.sessions
                        .get(m)
                        .and_then(|s| s.nickname.as_deref())
                        == Some(header.destination.as_str())
                })
                .collect()
        };

        if recipients.is_empty() {
            debug!(
                conn = from,
                packet = %header.packet_id,
                destination = %header.destination,
                "No recipient, dropping"
            );
        }

        Ok(recipients
            .into_iter()
            .map(|to| Outbound {
                to,
                frame: frame.to_vec(),
            })
            .collect())
    }

    fn login(&mut self, from: ConnectionId, login: Login) -> Result<Vec<Outbound>, CodecError> {
        let Some(session) = self.sessions.get(&from) else {
            return Ok(Vec::new());
        };
        if session.is_initialized() {
            debug!(conn = from, "Duplicate login ignored");
            return Ok(Vec::new());
        }

        let game_id = if login.game_id.is_empty() {
            let mut id = mint_game_id();
            while self.games.contains_key(&id) {
                id = mint_game_id();
            }
            id
        } else {
            login.game_id
        };

        let is_host = match self.games.get_mut(&game_id) {
            Some(game) => {
                game.members.push(from);
                false
            }
            None => {
                self.games.insert(
                    game_id.clone(),
                    Game {
                        host: from,
                        members: vec![from],
                    },
                );
                true
            }
        };

        if let Some(session) = self.sessions.get_mut(&from) {
            session.nickname = Some(login.nickname.clone());
            session.game_id = Some(game_id.clone());
            session.is_host = is_host;
        }
        info!(conn = from, nickname = %login.nickname, game = %game_id, is_host, "Player joined");

        let mut out = self.roster(&game_id)?;
        if !is_host {
            if let Some(host) = self.host_of(&game_id) {
                out.push(Outbound {
                    to: host,
                    frame: encode_frame(
                        HOST,
                        &InitializePlayerRequest {
                            player: login.nickname,
                        },
                    )?,
                });
            }
        }
        Ok(out)
    }

    /// Forget a connection. If it hosted a game, the earliest remaining
    /// member takes over; the game is removed when its last member leaves.
    /// Remaining members get a fresh roster.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<Vec<Outbound>, CodecError> {
        let Some(session) = self.sessions.remove(&id) else {
            return Ok(Vec::new());
        };
        let Some(game_id) = session.game_id else {
            return Ok(Vec::new());
        };
        let Some(game) = self.games.get_mut(&game_id) else {
            return Ok(Vec::new());
        };

        game.members.retain(|m| *m != id);
        let Some(&next_host) = game.members.first() else {
            self.games.remove(&game_id);
            info!(game = %game_id, "Game closed");
            return Ok(Vec::new());
        };

        if game.host == id {
            game.host = next_host;
            if let Some(s) = self.sessions.get_mut(&next_host) {
                s.is_host = true;
            }
            info!(game = %game_id, new_host = next_host, "Host migrated");
        }
        self.roster(&game_id)
    }

    /// `ProxyData` for every member of a game.
    fn roster(&self, game_id: &str) -> Result<Vec<Outbound>, CodecError> {
        let Some(game) = self.games.get(game_id) else {
            return Ok(Vec::new());
        };
        let players = self.players(game_id);
        game.members
            .iter()
            .map(|&to| {
                let nickname = self
                    .sessions
                    .get(&to)
                    .and_then(|s| s.nickname.as_deref())
                    .unwrap_or_default();
                let packet = ProxyData {
                    is_host: to == game.host,
                    players: players.clone(),
                    game_id: game_id.to_string(),
                };
                Ok(Outbound {
                    to,
                    frame: encode_frame(nickname, &packet)?,
                })
            })
            .collect()
    }
}
