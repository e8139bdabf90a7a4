//! Network Layer
//!
//! Length-prefixed big-endian frames over TCP. Peers talk through a relay
//! that only understands `login`; every other packet is forwarded by its
//! destination field without being decoded.

pub mod codec;
pub mod connection;
pub mod dispatch;
pub mod packets;
pub mod server;
pub mod session;

pub use codec::{
    decode_payload, encode_frame, CodecError, FrameBuffer, FrameHeader, Packet, PacketReader,
    PacketWriter, HOST, MAX_FRAME_SIZE,
};
pub use connection::{ClientConfig, ConnectionError, PacketSender, PeerConnection};
pub use dispatch::{Dispatched, PacketDispatcher};
pub use packets::{
    Chat, CreateMilitaryUnit, InitializePlayerRequest, Login, MoveUnit, ProxyData, WorldUpdate,
};
pub use server::{RelayServer, RelayServerError, ServerConfig};
pub use session::{ConnectionId, Outbound, RelayState};
