//! Client Game State
//!
//! Everything one peer knows about its game: roster, world, units, chat.
//! Packet handlers and local input both mutate it; anything that must reach
//! other peers is encoded into an outbox that the caller flushes through a
//! `PacketSender`.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::hash::{short_hash, WorldHasher};
use crate::core::hex::HexCoord;
use crate::game::chat::ChatLog;
use crate::network::codec::{encode_frame, CodecError, Packet};
use crate::network::connection::{ClientConfig, ConnectionError, PacketSender, PeerConnection};
use crate::network::packets::{
    Chat, CreateMilitaryUnit, InitializePlayerRequest, MoveUnit, ProxyData, WorldUpdate,
};
use crate::world::grid::World;
use crate::world::pathfinding::{find_path, PathResult, UNLIMITED_STAMINA};
use crate::world::terrain::TerrainTable;
use crate::world::tile::Tile;
use crate::world::units::{Unit, UnitCategory, UnitError, UnitStore, UnitsOnHex};
use crate::world::visibility::{reveal_for_unit, reveal_starting_area};
use crate::world::worldgen::{run_generator, DefaultGenerator, WorldgenError};

/// Width of the map a host generates.
pub const DEFAULT_WORLD_WIDTH: i32 = 32;

/// Height of the map a host generates.
pub const DEFAULT_WORLD_HEIGHT: i32 = 20;

/// Game errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// No world has been generated or received yet.
    #[error("no world loaded")]
    NoWorld,

    /// Nothing of that category stands on the hex.
    #[error("no {category} unit at {coord}")]
    NoUnit {
        /// Queried hex.
        coord: HexCoord,
        /// Queried category.
        category: UnitCategory,
    },

    /// Moves may only end on an empty hex.
    #[error("destination {0} is occupied")]
    Occupied(HexCoord),

    /// No path within the budget.
    #[error("no route from {from} to {to} within {budget} stamina")]
    NoRoute {
        /// Start hex.
        from: HexCoord,
        /// Goal hex.
        to: HexCoord,
        /// Stamina available.
        budget: i32,
    },

    /// Unit store refused the change.
    #[error(transparent)]
    Unit(#[from] UnitError),

    /// Packet could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Connection failure.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Map generation failed.
    #[error("world generation failed: {0}")]
    Worldgen(#[from] WorldgenError),
}

/// Read-only view handed to whatever draws the game.
pub trait WorldReader {
    /// Tile at `coord` as this viewer may see it.
    fn tile_at(&self, coord: HexCoord) -> Option<&Tile>;

    /// Units standing on `coord`.
    fn units_at(&self, coord: HexCoord) -> Option<&UnitsOnHex>;
}

/// State of one peer.
#[derive(Debug)]
pub struct GameState {
    /// Our nickname.
    pub nickname: String,
    /// Confirmed game id; empty until the relay answers.
    pub game_id: String,
    /// Whether we are the authoritative host.
    pub is_host: bool,
    /// Roster in join order.
    pub players: Vec<String>,
    /// Faction we play.
    pub faction: i32,
    /// The map, once generated or received.
    pub world: Option<World>,
    /// Units on the map.
    pub units: UnitStore,
    /// Received chat.
    pub chat: ChatLog,
    /// Terrain definitions used for movement costs and generation.
    pub terrain: TerrainTable,
    /// Show every tile regardless of fog.
    pub debug_view: bool,
    world_size: (i32, i32),
    next_unit_id: i32,
    outbox: Vec<Vec<u8>>,
}

impl GameState {
    /// Fresh state for a player about to log in.
    pub fn new(nickname: impl Into<String>, faction: i32) -> Self {
        Self {
            nickname: nickname.into(),
            game_id: String::new(),
            is_host: false,
            players: Vec::new(),
            faction,
            world: None,
            units: UnitStore::new(),
            chat: ChatLog::new(),
            terrain: TerrainTable::default(),
            debug_view: false,
            world_size: (DEFAULT_WORLD_WIDTH, DEFAULT_WORLD_HEIGHT),
            next_unit_id: 1,
            outbox: Vec::new(),
        }
    }

    /// State for `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.nickname.clone(), config.faction)
    }

    /// Use a different terrain table.
    pub fn with_terrain(mut self, terrain: TerrainTable) -> Self {
        self.terrain = terrain;
        self
    }

    /// Size of the map generated when this peer becomes host.
    pub fn with_world_size(mut self, width: i32, height: i32) -> Self {
        self.world_size = (width, height);
        self
    }

    /// Loaded world.
    pub fn world(&self) -> Result<&World, GameError> {
        self.world.as_ref().ok_or(GameError::NoWorld)
    }

    /// Adopt `world`; unit positions wrap around its width from now on.
    pub fn set_world(&mut self, world: World) {
        self.units.set_wrap_width(world.width());
        self.world = Some(world);
    }

    /// Every player except us.
    pub fn other_players(&self) -> impl Iterator<Item = &str> {
        self.players
            .iter()
            .map(String::as_str)
            .filter(move |p| *p != self.nickname)
    }

    // =========================================================================
    // OUTBOX
    // =========================================================================

    /// Encode `packet` for `destination` into the outbox.
    pub fn queue<P: Packet>(&mut self, destination: &str, packet: &P) -> Result<(), GameError> {
        self.outbox.push(encode_frame(destination, packet)?);
        Ok(())
    }

    /// Queue `packet` once for every other player.
    pub fn queue_to_others<P: Packet>(&mut self, packet: &P) -> Result<(), GameError> {
        let recipients: Vec<String> = self.other_players().map(str::to_string).collect();
        for player in recipients {
            self.queue(&player, packet)?;
        }
        Ok(())
    }

    /// Take every queued frame.
    pub fn drain_outbox(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbox)
    }

    /// Number of queued frames.
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    /// Hand every queued frame to `sender`.
    pub fn flush(&mut self, sender: &PacketSender) -> Result<usize, ConnectionError> {
        let frames = self.drain_outbox();
        let count = frames.len();
        for frame in frames {
            sender.send_frame(frame)?;
        }
        Ok(count)
    }

    // =========================================================================
    // PACKET HANDLERS
    // =========================================================================

    /// Roster changed. A host without a world generates one.
    pub fn on_proxy_data(&mut self, data: ProxyData) -> Result<(), GameError> {
        let promoted = data.is_host && !self.is_host;
        self.is_host = data.is_host;
        self.players = data.players;
        self.game_id = data.game_id;
        info!(
            game = %self.game_id,
            host = self.is_host,
            players = self.players.len(),
            "Roster updated"
        );
        if promoted && self.world.is_none() {
            self.generate_world()?;
        }
        Ok(())
    }

    /// The relay asks us, as host, to bring `player` up to date.
    pub fn on_initialize_player(&mut self, request: InitializePlayerRequest) -> Result<(), GameError> {
        if !self.is_host {
            debug!(player = %request.player, "Ignoring init request, not host");
            return Ok(());
        }
        let world = self.world()?.clone();
        info!(
            player = %request.player,
            checksum = %short_hash(&world.checksum()),
            "Sending world snapshot"
        );
        self.queue(&request.player, &WorldUpdate { world })?;

        let units: Vec<CreateMilitaryUnit> = self
            .units
            .iter()
            .filter_map(|(coord, hex)| {
                hex.slot(UnitCategory::Military).map(|unit| CreateMilitaryUnit {
                    coord,
                    unit: unit.clone(),
                })
            })
            .collect();
        for packet in &units {
            self.queue(&request.player, packet)?;
        }
        Ok(())
    }

    /// Replace the world with the host's snapshot.
    pub fn on_world_update(&mut self, update: WorldUpdate) {
        info!(
            width = update.world.width(),
            height = update.world.height(),
            checksum = %short_hash(&update.world.checksum()),
            "World received"
        );
        self.set_world(update.world);
    }

    /// Record a chat line.
    pub fn on_chat(&mut self, chat: Chat) {
        self.chat.push(chat.msg);
    }

    /// A peer placed a military unit. Relayed packets are trusted, so an
    /// existing unit in that slot is replaced.
    pub fn on_create_military_unit(&mut self, packet: CreateMilitaryUnit) {
        let CreateMilitaryUnit { coord, unit } = packet;
        debug!(%coord, id = unit.id, owner = %unit.owner, "Remote unit created");
        if let Some(world) = self.world.as_mut() {
            reveal_for_unit(world, coord, &unit);
        }
        if self.units.force_place(coord, UnitCategory::Military, unit).is_some() {
            warn!(%coord, "Remote unit replaced an existing one");
        }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Generate a map from the game id and reveal our starting area.
    pub fn generate_world(&mut self) -> Result<(), GameError> {
        let (width, height) = self.world_size;
        let generator = DefaultGenerator::new(width, height, self.world_seed(), &self.terrain);
        let mut world = run_generator(&generator)?;
        reveal_starting_area(&mut world, self.faction);
        info!(
            width,
            height,
            checksum = %short_hash(&world.checksum()),
            "Host generated world"
        );
        self.set_world(world);
        Ok(())
    }

    /// Seed derived from the game id so a regenerated map is reproducible.
    pub fn world_seed(&self) -> u64 {
        let mut hasher = WorldHasher::new(b"HEXLINK_SEED_V1");
        hasher.update_str(&self.game_id);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }

    /// A new military unit owned by us.
    pub fn new_unit(&mut self) -> Unit {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        Unit::new(id, self.faction, self.nickname.clone())
    }

    /// Place a military unit and announce it.
    pub fn spawn_military_unit(&mut self, coord: HexCoord, unit: Unit) -> Result<(), GameError> {
        self.units.place(coord, UnitCategory::Military, unit.clone())?;
        if let Some(world) = self.world.as_mut() {
            reveal_for_unit(world, coord, &unit);
        }
        self.queue_to_others(&CreateMilitaryUnit { coord, unit })
    }

    /// Move our unit of `category` from `from` towards `to`, spending its
    /// stamina. Other players are told about the move.
    pub fn move_unit(
        &mut self,
        from: HexCoord,
        to: HexCoord,
        category: UnitCategory,
    ) -> Result<PathResult, GameError> {
        let budget = self
            .units
            .unit(from, category)
            .map(|u| u.stamina)
            .ok_or(GameError::NoUnit { coord: from, category })?;
        let result = self.relocate(from, to, category, budget)?;
        self.queue_to_others(&MoveUnit { from, to })?;
        Ok(result)
    }

    /// Replay a move reported by a peer. The first occupied category on
    /// `from` moves, without a stamina limit.
    pub fn apply_remote_move(&mut self, packet: MoveUnit) -> Result<PathResult, GameError> {
        let category = self
            .units
            .units_at(packet.from)
            .and_then(UnitsOnHex::first_category)
            .ok_or(GameError::NoUnit {
                coord: packet.from,
                category: UnitCategory::Military,
            })?;
        self.relocate(packet.from, packet.to, category, UNLIMITED_STAMINA)
    }

    fn relocate(
        &mut self,
        from: HexCoord,
        to: HexCoord,
        category: UnitCategory,
        budget: i32,
    ) -> Result<PathResult, GameError> {
        let world = self.world.as_ref().ok_or(GameError::NoWorld)?;
        let terrain = &self.terrain;
        let result = find_path(world, from, to, budget, |tile| terrain.tile_cost(tile));
        if !result.is_move() {
            return Err(GameError::NoRoute { from, to, budget });
        }
        if self.units.units_at(to).is_some_and(UnitsOnHex::has_any) {
            return Err(GameError::Occupied(to));
        }

        self.units.teleport(from, to, category)?;
        let Self { world, units, .. } = self;
        if let Some(unit) = units.units_at_mut(to).and_then(|hex| hex.slot_mut(category)) {
            unit.stamina = unit.stamina.saturating_sub(result.cost);
            if let Some(world) = world.as_mut() {
                reveal_for_unit(world, to, unit);
            }
        }
        debug!(%from, %to, %category, cost = result.cost, "Unit moved");
        Ok(result)
    }
}

impl WorldReader for GameState {
    fn tile_at(&self, coord: HexCoord) -> Option<&Tile> {
        self.world
            .as_ref()?
            .tile_info_for(coord, self.faction, self.debug_view)
    }

    fn units_at(&self, coord: HexCoord) -> Option<&UnitsOnHex> {
        self.units.units_at(coord)
    }
}

/// Wire every packet this client understands to its `GameState` handler.
pub fn register_handlers(conn: &mut PeerConnection<GameState>) {
    conn.register_handler::<ProxyData, _>(|state, data| {
        if let Err(e) = state.on_proxy_data(data) {
            warn!(error = %e, "Failed to apply roster");
        }
    });
    conn.register_handler::<InitializePlayerRequest, _>(|state, request| {
        if let Err(e) = state.on_initialize_player(request) {
            warn!(error = %e, "Failed to initialize player");
        }
    });
    conn.register_handler::<WorldUpdate, _>(|state, update| state.on_world_update(update));
    conn.register_handler::<Chat, _>(|state, chat| state.on_chat(chat));
    conn.register_handler::<CreateMilitaryUnit, _>(|state, packet| {
        state.on_create_military_unit(packet)
    });
    conn.register_handler::<MoveUnit, _>(|state, packet| {
        if let Err(e) = state.apply_remote_move(packet) {
            warn!(error = %e, "Failed to apply remote move");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::{decode_payload, FrameHeader};
    use crate::world::tile::Visibility;

    fn plain_world(width: i32, height: i32) -> World {
        World::new(width, height, Tile::default(), Tile::with_terrain(0)).unwrap()
    }

    fn with_world(nick: &str, width: i32, height: i32) -> GameState {
        let mut state = GameState::new(nick, 0);
        state.set_world(plain_world(width, height));
        state.players = vec!["ann".into(), "bo".into(), "cy".into()];
        state
    }

    fn decode<P: Packet>(frame: &[u8]) -> (String, P) {
        let (header, mut rd) = FrameHeader::peek(frame).unwrap();
        assert_eq!(header.packet_id, P::ID);
        (header.destination, decode_payload(&mut rd).unwrap())
    }

    #[test]
    fn test_host_generates_on_promotion() {
        let mut state = GameState::new("ann", 2).with_world_size(8, 6);
        state
            .on_proxy_data(ProxyData {
                is_host: true,
                players: vec!["ann".into()],
                game_id: "ABC123".into(),
            })
            .unwrap();

        let world = state.world().unwrap();
        assert_eq!((world.width(), world.height()), (8, 6));
        let start = HexCoord::from_axial(1, 1);
        assert_eq!(world.tile(start).visibility(2), Visibility::Superior);
        for n in start.neighbors() {
            assert_eq!(world.tile(n).visibility(2), Visibility::Superior);
        }
    }

    #[test]
    fn test_guest_waits_for_snapshot() {
        let mut state = GameState::new("bo", 1);
        state
            .on_proxy_data(ProxyData {
                is_host: false,
                players: vec!["ann".into(), "bo".into()],
                game_id: "ABC123".into(),
            })
            .unwrap();
        assert!(state.world.is_none());
        assert_eq!(state.other_players().collect::<Vec<_>>(), vec!["ann"]);
    }

    #[test]
    fn test_world_seed_follows_game_id() {
        let mut a = GameState::new("ann", 0);
        let mut b = GameState::new("bo", 0);
        a.game_id = "G1".into();
        b.game_id = "G1".into();
        assert_eq!(a.world_seed(), b.world_seed());
        b.game_id = "G2".into();
        assert_ne!(a.world_seed(), b.world_seed());
    }

    #[test]
    fn test_init_player_sends_snapshot_and_units() {
        let mut host = with_world("ann", 6, 6);
        host.is_host = true;
        let unit = host.new_unit();
        host.spawn_military_unit(HexCoord::from_axial(2, 2), unit.clone()).unwrap();
        host.drain_outbox();

        host.on_initialize_player(InitializePlayerRequest { player: "bo".into() }).unwrap();
        let frames = host.drain_outbox();
        assert_eq!(frames.len(), 2);

        let (dest, update): (_, WorldUpdate) = decode(&frames[0]);
        assert_eq!(dest, "bo");
        assert_eq!(update.world.checksum(), host.world().unwrap().checksum());

        let (_, created): (_, CreateMilitaryUnit) = decode(&frames[1]);
        assert_eq!(created.coord, HexCoord::from_axial(2, 2));
        assert_eq!(created.unit, unit);
    }

    #[test]
    fn test_init_player_ignored_by_guest() {
        let mut guest = with_world("bo", 4, 4);
        guest.on_initialize_player(InitializePlayerRequest { player: "cy".into() }).unwrap();
        assert_eq!(guest.outbox_len(), 0);
    }

    #[test]
    fn test_init_player_without_world() {
        let mut host = GameState::new("ann", 0);
        host.is_host = true;
        assert!(matches!(
            host.on_initialize_player(InitializePlayerRequest { player: "bo".into() }),
            Err(GameError::NoWorld)
        ));
    }

    #[test]
    fn test_move_spends_stamina_and_reveals() {
        let mut state = with_world("ann", 10, 10);
        let start = HexCoord::from_axial(2, 2);
        let goal = HexCoord::from_axial(5, 2);
        let unit = state.new_unit();
        state.spawn_military_unit(start, unit).unwrap();
        state.drain_outbox();

        let result = state.move_unit(start, goal, UnitCategory::Military).unwrap();
        assert_eq!(result.path.len(), 4);
        assert_eq!(result.cost, 3);

        let moved = state.units.unit(goal, UnitCategory::Military).unwrap();
        assert_eq!(moved.stamina, 97);
        assert!(state.units.units_at(start).is_none());
        let world = state.world().unwrap();
        assert_eq!(world.tile(goal).visibility(0), Visibility::Superior);
        assert_eq!(world.tile(goal + HexCoord::RIGHT).visibility(0), Visibility::Superior);

        let frames = state.drain_outbox();
        let dests: Vec<String> = frames.iter().map(|f| decode::<MoveUnit>(f).0).collect();
        assert_eq!(dests, vec!["bo", "cy"]);
        assert_eq!(decode::<MoveUnit>(&frames[0]).1, MoveUnit { from: start, to: goal });
    }

    #[test]
    fn test_move_out_of_stamina() {
        let mut state = with_world("ann", 10, 10);
        let start = HexCoord::from_axial(2, 2);
        let mut unit = state.new_unit();
        unit.stamina = 2;
        state.spawn_military_unit(start, unit).unwrap();
        state.drain_outbox();

        let err = state
            .move_unit(start, HexCoord::from_axial(6, 2), UnitCategory::Military)
            .unwrap_err();
        assert!(matches!(err, GameError::NoRoute { budget: 2, .. }));
        assert!(state.units.unit(start, UnitCategory::Military).is_some());
        assert_eq!(state.outbox_len(), 0);
    }

    #[test]
    fn test_move_onto_occupied_refused() {
        let mut state = with_world("ann", 10, 10);
        let a = HexCoord::from_axial(2, 2);
        let b = HexCoord::from_axial(4, 2);
        let first = state.new_unit();
        let second = state.new_unit();
        state.spawn_military_unit(a, first).unwrap();
        state.spawn_military_unit(b, second).unwrap();

        assert!(matches!(
            state.move_unit(a, b, UnitCategory::Military),
            Err(GameError::Occupied(c)) if c == b
        ));
    }

    #[test]
    fn test_move_across_seam_respects_occupancy() {
        let mut state = with_world("ann", 4, 4);
        let west = HexCoord::from_axial(0, 1);
        let mid = HexCoord::from_axial(2, 1);
        let west_again = HexCoord::from_axial(4, 1);
        let first = state.new_unit();
        let second = state.new_unit();
        state.spawn_military_unit(west, first).unwrap();
        state.spawn_military_unit(mid, second).unwrap();
        state.drain_outbox();

        assert!(matches!(
            state.move_unit(mid, west_again, UnitCategory::Military),
            Err(GameError::Occupied(c)) if c == west_again
        ));
        assert_eq!(state.units.occupied_hexes(), 2);
        assert_eq!(state.outbox_len(), 0);
        let on_seam = state.units_at(west_again).and_then(|u| u.slot(UnitCategory::Military));
        assert_eq!(on_seam.map(|u| u.id), Some(1));

        state.units.remove(west, UnitCategory::Military);
        state.move_unit(mid, west_again, UnitCategory::Military).unwrap();
        let moved = state.units.unit(west, UnitCategory::Military).map(|u| u.id);
        assert_eq!(moved, Some(2));
        assert_eq!(state.units.occupied_hexes(), 1);
    }

    #[test]
    fn test_move_to_self_is_not_a_move() {
        let mut state = with_world("ann", 6, 6);
        let a = HexCoord::from_axial(2, 2);
        let unit = state.new_unit();
        state.spawn_military_unit(a, unit).unwrap();
        assert!(matches!(
            state.move_unit(a, a, UnitCategory::Military),
            Err(GameError::NoRoute { .. })
        ));
    }

    #[test]
    fn test_move_without_unit() {
        let mut state = with_world("ann", 6, 6);
        assert!(matches!(
            state.move_unit(HexCoord::ORIGIN, HexCoord::from_axial(1, 0), UnitCategory::Civilian),
            Err(GameError::NoUnit { category: UnitCategory::Civilian, .. })
        ));
    }

    #[test]
    fn test_remote_move_unlimited() {
        let mut state = with_world("bo", 4, 4);
        let mut unit = Unit::new(9, 1, "ann");
        unit.stamina = 0;
        state.on_create_military_unit(CreateMilitaryUnit { coord: HexCoord::ORIGIN, unit });

        let to = HexCoord::from_cube(2, -1, -1).unwrap();
        let result = state
            .apply_remote_move(MoveUnit { from: HexCoord::ORIGIN, to })
            .unwrap();
        assert_eq!(result.path.last(), Some(&to));
        assert_eq!(result.path.len() as i32, HexCoord::ORIGIN.distance(to) + 1);
        assert!(state.units.unit(to, UnitCategory::Military).is_some());
        assert_eq!(state.outbox_len(), 0);
    }

    #[test]
    fn test_remote_move_picks_first_category() {
        let mut state = with_world("bo", 6, 6);
        let from = HexCoord::from_axial(1, 1);
        state
            .units
            .place(from, UnitCategory::Special, Unit::new(3, 1, "ann"))
            .unwrap();
        let to = HexCoord::from_axial(3, 1);
        state.apply_remote_move(MoveUnit { from, to }).unwrap();
        assert!(state.units.unit(to, UnitCategory::Special).is_some());
    }

    #[test]
    fn test_chat_and_world_update() {
        let mut state = GameState::new("bo", 0);
        state.on_chat(Chat { msg: "ann: hi".into() });
        assert_eq!(state.chat.len(), 1);

        let world = plain_world(3, 3);
        state.on_world_update(WorldUpdate { world: world.clone() });
        assert_eq!(state.world().unwrap(), &world);
    }

    #[test]
    fn test_tile_at_respects_fog() {
        let mut state = with_world("ann", 5, 5);
        let seen = HexCoord::from_axial(1, 1);
        let hidden = HexCoord::from_axial(3, 3);
        if let Some(world) = state.world.as_mut() {
            reveal_starting_area(world, 0);
        }
        assert!(state.tile_at(seen).is_some());
        assert!(state.tile_at(hidden).is_none());
        assert!(state.tile_at(HexCoord::from_axial(0, -1)).is_none());

        state.debug_view = true;
        assert!(state.tile_at(hidden).is_some());
    }
}
