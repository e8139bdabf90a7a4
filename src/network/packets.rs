//! Packet Catalog
//!
//! Every packet that crosses the wire, with its payload schema. The relay
//! only ever decodes `Login`; everything else is opaque to it and decoded
//! by the peers.

use crate::core::hex::HexCoord;
use crate::network::codec::{CodecError, Packet, PacketReader, PacketWriter};
use crate::world::grid::World;
use crate::world::units::Unit;

/// Bytes a coordinate occupies on the wire.
const COORD_WIRE_SIZE: usize = 12;

/// Write a coordinate as three i32s.
pub fn write_coord(wr: &mut PacketWriter, coord: HexCoord) -> Result<(), CodecError> {
    wr.write_i32(coord.q())?;
    wr.write_i32(coord.r())?;
    wr.write_i32(coord.s())
}

/// Read three i32s as a coordinate, rejecting any that break `q + r + s == 0`.
pub fn read_coord(rd: &mut PacketReader<'_>) -> Result<HexCoord, CodecError> {
    let q = rd.read_i32()?;
    let r = rd.read_i32()?;
    let s = rd.read_i32()?;
    HexCoord::from_cube(q, r, s).ok_or(CodecError::InvalidCoordinate { q, r, s })
}

// =============================================================================
// CLIENT -> SERVER
// =============================================================================

/// Join or create a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    /// Requested game id; empty asks the server to mint one.
    pub game_id: String,
    /// Player nickname.
    pub nickname: String,
}

impl Packet for Login {
    const ID: &'static str = "login";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        wr.write_str(&self.game_id)?;
        wr.write_str(&self.nickname)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            game_id: rd.read_str()?,
            nickname: rd.read_str()?,
        })
    }
}

// =============================================================================
// SERVER -> CLIENT
// =============================================================================

/// Roster of a game, sent to every member whenever it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyData {
    /// Whether the recipient is the host.
    pub is_host: bool,
    /// Nicknames in join order.
    pub players: Vec<String>,
    /// Confirmed game id.
    pub game_id: String,
}

impl Packet for ProxyData {
    const ID: &'static str = "proxy_data";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        wr.write_bool(self.is_host)?;
        wr.write_count(self.players.len())?;
        for player in &self.players {
            wr.write_str(player)?;
        }
        wr.write_str(&self.game_id)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let is_host = rd.read_bool()?;
        let count = rd.read_count(1)?;
        let mut players = Vec::with_capacity(count);
        for _ in 0..count {
            players.push(rd.read_str()?);
        }
        Ok(Self {
            is_host,
            players,
            game_id: rd.read_str()?,
        })
    }
}

/// Asks the host to send its world to a newly joined player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializePlayerRequest {
    /// Nickname of the new player.
    pub player: String,
}

impl Packet for InitializePlayerRequest {
    const ID: &'static str = "init_player";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        wr.write_str(&self.player)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            player: rd.read_str()?,
        })
    }
}

// =============================================================================
// CLIENT -> CLIENT (relayed)
// =============================================================================

/// Chat line, fanned out to the whole game by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    /// Message text, already prefixed with the sender's name.
    pub msg: String,
}

impl Packet for Chat {
    const ID: &'static str = "chat";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        wr.write_str(&self.msg)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            msg: rd.read_str()?,
        })
    }
}

/// Full world snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldUpdate {
    /// The host's world.
    pub world: World,
}

impl Packet for WorldUpdate {
    const ID: &'static str = "world_update";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        self.world.encode(wr)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            world: World::decode(rd)?,
        })
    }
}

/// A military unit appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMilitaryUnit {
    /// Where it stands.
    pub coord: HexCoord,
    /// The unit.
    pub unit: Unit,
}

impl Packet for CreateMilitaryUnit {
    const ID: &'static str = "create_military_unit";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        write_coord(wr, self.coord)?;
        wr.write_i32(self.unit.id)?;
        wr.write_i32(self.unit.faction)?;
        wr.write_i32(self.unit.health)?;
        wr.write_i32(self.unit.vision_range)?;
        wr.write_i32(self.unit.stamina)?;
        wr.write_str(&self.unit.owner)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let coord = read_coord(rd)?;
        let unit = Unit {
            id: rd.read_i32()?,
            faction: rd.read_i32()?,
            health: rd.read_i32()?,
            vision_range: rd.read_i32()?,
            stamina: rd.read_i32()?,
            owner: rd.read_str()?,
        };
        Ok(Self { coord, unit })
    }
}

/// A unit moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveUnit {
    /// Where the unit stood.
    pub from: HexCoord,
    /// Where it went.
    pub to: HexCoord,
}

impl Packet for MoveUnit {
    const ID: &'static str = "move_unit";

    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
        write_coord(wr, self.from)?;
        write_coord(wr, self.to)
    }

    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        if rd.remaining() < 2 * COORD_WIRE_SIZE {
            return Err(CodecError::Truncated {
                needed: 2 * COORD_WIRE_SIZE,
                remaining: rd.remaining(),
            });
        }
        Ok(Self {
            from: read_coord(rd)?,
            to: read_coord(rd)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::{decode_payload, encode_frame, FrameHeader, HOST};
    use crate::world::tile::{Tile, Visibility};

    fn roundtrip<P: Packet + PartialEq + std::fmt::Debug>(dest: &str, packet: &P) -> P {
        let frame = encode_frame(dest, packet).unwrap();
        let (header, mut rd) = FrameHeader::peek(&frame).unwrap();
        assert_eq!(header.packet_id, P::ID);
        assert_eq!(header.destination, dest);
        decode_payload(&mut rd).unwrap()
    }

    #[test]
    fn test_chat_hello() {
        let chat = Chat { msg: "hello".into() };
        assert_eq!(roundtrip(HOST, &chat).msg, "hello");
    }

    #[test]
    fn test_login_layout() {
        let login = Login { game_id: "AB12CD".into(), nickname: "ann".into() };
        let frame = encode_frame(HOST, &login).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        expected.extend_from_slice(b"login\0\0AB12CD\0ann\0");
        assert_eq!(frame, expected);
        assert_eq!(roundtrip(HOST, &login), login);
    }

    #[test]
    fn test_proxy_data() {
        let data = ProxyData {
            is_host: true,
            players: vec!["ann".into(), "bo".into()],
            game_id: "XYZ".into(),
        };
        assert_eq!(roundtrip("ann", &data), data);

        let empty = ProxyData { is_host: false, players: vec![], game_id: String::new() };
        assert_eq!(roundtrip("bo", &empty), empty);
    }

    #[test]
    fn test_proxy_data_negative_count() {
        let mut wr = PacketWriter::default();
        wr.write_bool(false).unwrap();
        wr.write_i32(-3).unwrap();
        let bytes = wr.into_bytes();
        assert_eq!(
            ProxyData::decode(&mut PacketReader::new(&bytes)),
            Err(CodecError::NegativeCount(-3))
        );
    }

    #[test]
    fn test_init_player() {
        let req = InitializePlayerRequest { player: "newbie".into() };
        assert_eq!(roundtrip(HOST, &req), req);
    }

    #[test]
    fn test_world_update() {
        let mut world = World::new(6, 5, Tile::default(), Tile::with_terrain(2)).unwrap();
        world.tile_mut(HexCoord::from_axial(3, 4)).terrain_id = 5;
        world.tile_mut(HexCoord::from_axial(1, 1)).set_visibility(0, Visibility::Superior);
        let update = WorldUpdate { world };
        let back = roundtrip("guest", &update);
        assert_eq!(back.world.checksum(), update.world.checksum());
    }

    #[test]
    fn test_create_military_unit() {
        let mut unit = Unit::new(17, 3, "ann");
        unit.stamina = 42;
        let packet = CreateMilitaryUnit { coord: HexCoord::from_axial(-2, 5), unit };
        assert_eq!(roundtrip("bo", &packet), packet);
    }

    #[test]
    fn test_move_unit() {
        let packet = MoveUnit {
            from: HexCoord::ORIGIN,
            to: HexCoord::from_cube(2, -1, -1).unwrap(),
        };
        let frame = encode_frame("bo", &packet).unwrap();
        assert_eq!(frame.len(), 4 + "move_unit\0bo\0".len() + 24);
        assert_eq!(roundtrip("bo", &packet), packet);
    }

    #[test]
    fn test_invalid_coordinate_rejected() {
        let mut wr = PacketWriter::default();
        for v in [1, 1, 1, 0, 0, 0] {
            wr.write_i32(v).unwrap();
        }
        let bytes = wr.into_bytes();
        assert_eq!(
            MoveUnit::decode(&mut PacketReader::new(&bytes)),
            Err(CodecError::InvalidCoordinate { q: 1, r: 1, s: 1 })
        );
    }

    #[test]
    fn test_truncated_move() {
        let bytes = [0u8; 20];
        assert!(matches!(
            MoveUnit::decode(&mut PacketReader::new(&bytes)),
            Err(CodecError::Truncated { needed: 24, remaining: 20 })
        ));
    }
}
