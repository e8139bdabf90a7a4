//! Packet Dispatch
//!
//! Packet-id to handler table. Handlers receive the caller's context and a
//! reader positioned at the payload.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::network::codec::{decode_payload, CodecError, FrameHeader, Packet, PacketReader};

/// Raw handler: context plus payload reader.
pub type Handler<S> = Box<dyn FnMut(&mut S, &mut PacketReader<'_>) -> Result<(), CodecError>>;

/// What happened to a dispatched frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// A handler ran.
    Handled(String),
    /// No handler for this id; the frame was dropped.
    Unhandled(String),
}

/// Handler table for one context type.
pub struct PacketDispatcher<S> {
    handlers: HashMap<String, Handler<S>>,
}

impl<S> Default for PacketDispatcher<S> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<S> std::fmt::Debug for PacketDispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().collect();
        ids.sort();
        f.debug_struct("PacketDispatcher").field("handlers", &ids).finish()
    }
}

impl<S> PacketDispatcher<S> {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw handler, replacing any previous one for `packet_id`.
    pub fn register_raw<F>(&mut self, packet_id: impl Into<String>, handler: F)
    where
        F: FnMut(&mut S, &mut PacketReader<'_>) -> Result<(), CodecError> + 'static,
    {
        self.handlers.insert(packet_id.into(), Box::new(handler));
    }

    /// Register a typed handler. The payload is decoded as `P` and must be
    /// consumed exactly.
    pub fn register<P, F>(&mut self, mut handler: F)
    where
        P: Packet,
        F: FnMut(&mut S, P) + 'static,
    {
        self.register_raw(P::ID, move |ctx, rd| {
            let packet = decode_payload::<P>(rd)?;
            handler(ctx, packet);
            Ok(())
        });
    }

    /// Drop one handler.
    pub fn unregister(&mut self, packet_id: &str) -> bool {
        self.handlers.remove(packet_id).is_some()
    }

    /// Drop every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// True if `packet_id` has a handler.
    pub fn is_registered(&self, packet_id: &str) -> bool {
        self.handlers.contains_key(packet_id)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route one complete frame. Unknown ids are logged and dropped; decode
    /// errors are returned and should end the connection.
    pub fn dispatch(&mut self, ctx: &mut S, frame: &[u8]) -> Result<Dispatched, CodecError> {
        let (header, mut rd) = FrameHeader::peek(frame)?;
        match self.handlers.get_mut(&header.packet_id) {
            Some(handler) => {
                debug!(packet = %header.packet_id, len = header.length, "Dispatching packet");
                handler(ctx, &mut rd)?;
                Ok(Dispatched::Handled(header.packet_id))
            }
            None => {
                warn!(packet = %header.packet_id, "No handler for packet, dropping");
                Ok(Dispatched::Unhandled(header.packet_id))
            }
        }
    }
}
