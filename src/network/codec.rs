//! Binary Wire Codec
//!
//! Big-endian fixed-width integers and NUL-terminated strings.
//!
//! ```text
//! ┌────────────┬──────────────┬───────────────┬─────────────────┐
//! │ length u32 │ packet id \0 │ destination \0│ payload ...     │
//! └────────────┴──────────────┴───────────────┴─────────────────┘
//!   counts the whole frame, itself included
//! ```
//!
//! Decoding is pull-style over a borrowed buffer with a cursor. Encoding is
//! push-style into a buffer with a hard capacity: exceeding it is an error,
//! never a silent truncation.

use thiserror::Error;

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Smallest well-formed frame: length prefix plus two empty strings.
pub const MIN_FRAME_SIZE: u32 = LENGTH_PREFIX_SIZE as u32 + 2;

/// Upper bound on a declared frame length. Full world snapshots are the
/// largest frames; anything beyond this is treated as corruption.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Default writer capacity for ordinary packets.
pub const DEFAULT_WRITER_CAPACITY: usize = 64 * 1024;

/// Destination string meaning "the host of my game".
pub const HOST: &str = "";

/// Codec errors. Any of these while decoding a frame is fatal for the
/// connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Writer capacity exceeded.
    #[error("write buffer overflow: need {needed} bytes, capacity {capacity}")]
    Overflow {
        /// Bytes the write would require in total.
        needed: usize,
        /// Fixed capacity of the writer.
        capacity: usize,
    },

    /// Not enough bytes left for a numeric field.
    #[error("truncated field: need {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// String ran off the end of the buffer.
    #[error("string is missing its NUL terminator")]
    MissingTerminator,

    /// String bytes are not UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A string to encode contains NUL, which would split it on the wire.
    #[error("string contains an interior NUL byte")]
    InteriorNul,

    /// Declared frame length above `MAX_FRAME_SIZE`.
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u32),

    /// Declared frame length below `MIN_FRAME_SIZE`.
    #[error("frame too small: {0} bytes")]
    FrameTooSmall(u32),

    /// Declared length disagrees with the frame slice.
    #[error("frame length mismatch: declared {declared}, actual {actual}")]
    LengthMismatch {
        /// Value of the length prefix.
        declared: u32,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// Negative element count.
    #[error("negative count: {0}")]
    NegativeCount(i32),

    /// World dimensions that cannot describe a grid.
    #[error("invalid world dimensions {width}x{height}")]
    InvalidDimensions {
        /// Declared width.
        width: i32,
        /// Declared height.
        height: i32,
    },

    /// Cube coordinate with `q + r + s != 0`.
    #[error("invalid cube coordinate ({q}, {r}, {s})")]
    InvalidCoordinate {
        /// Q component.
        q: i32,
        /// R component.
        r: i32,
        /// S component.
        s: i32,
    },

    /// Payload bytes left over after the packet was decoded.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
}

// =============================================================================
// READER
// =============================================================================

/// Cursor over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    idx: usize,
}

impl<'a> PacketReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, idx: 0 }
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.idx
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.idx
    }

    /// True once every byte was consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let end = self.idx + N;
        let bytes = self.buf.get(self.idx..end).ok_or(CodecError::Truncated {
            needed: N,
            remaining: self.remaining(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.idx = end;
        Ok(out)
    }

    /// Read one unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a boolean; any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? > 0)
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take::<4>()?))
    }

    /// Read a big-endian i32.
    ///
    /// Bytes are combined as `u8` before the sign is applied, so high bytes
    /// above 0x7f never smear into the upper bits.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take::<4>()?))
    }

    /// Read a non-negative i32 element count, bounded by the bytes left
    /// (every element occupies at least `min_element_size` bytes).
    pub fn read_count(&mut self, min_element_size: usize) -> Result<usize, CodecError> {
        let count = self.read_i32()?;
        if count < 0 {
            return Err(CodecError::NegativeCount(count));
        }
        let count = count as usize;
        let needed = count.saturating_mul(min_element_size.max(1));
        if needed > self.remaining() {
            return Err(CodecError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    /// Read a NUL-terminated UTF-8 string. The terminator is consumed.
    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let rest = &self.buf[self.idx..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::MissingTerminator)?;
        let text = std::str::from_utf8(&rest[..nul]).map_err(|_| CodecError::InvalidUtf8)?;
        self.idx += nul + 1;
        Ok(text.to_owned())
    }

    /// Fail if unread bytes remain.
    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

// =============================================================================
// WRITER
// =============================================================================

/// Append-only buffer with a hard capacity.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buf: Vec<u8>,
    capacity: usize,
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new(DEFAULT_WRITER_CAPACITY)
    }
}

impl PacketWriter {
    /// Create a writer that refuses to grow past `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.min(DEFAULT_WRITER_CAPACITY)),
            capacity,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let needed = self.buf.len() + bytes.len();
        if needed > self.capacity {
            return Err(CodecError::Overflow {
                needed,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write one byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.put(&[value])
    }

    /// Write a boolean as `0` or `1`.
    pub fn write_bool(&mut self, value: bool) -> Result<(), CodecError> {
        self.write_u8(u8::from(value))
    }

    /// Write a big-endian u32.
    pub fn write_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.put(&value.to_be_bytes())
    }

    /// Write a big-endian i32.
    pub fn write_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.put(&value.to_be_bytes())
    }

    /// Write an element count.
    pub fn write_count(&mut self, count: usize) -> Result<(), CodecError> {
        let count = i32::try_from(count).map_err(|_| CodecError::Overflow {
            needed: count,
            capacity: i32::MAX as usize,
        })?;
        self.write_i32(count)
    }

    /// Write a string followed by a NUL terminator.
    pub fn write_str(&mut self, value: &str) -> Result<(), CodecError> {
        if value.as_bytes().contains(&0) {
            return Err(CodecError::InteriorNul);
        }
        let needed = self.buf.len() + value.len() + 1;
        if needed > self.capacity {
            return Err(CodecError::Overflow {
                needed,
                capacity: self.capacity,
            });
        }
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        Ok(())
    }
}

// =============================================================================
// FRAMES
// =============================================================================

/// A type that travels as the payload of one frame.
pub trait Packet: Sized {
    /// ASCII tag written as the frame's packet id.
    const ID: &'static str;

    /// Write payload fields in schema order.
    fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError>;

    /// Read payload fields in schema order.
    fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError>;
}

/// Encode `packet` as a complete frame addressed to `destination`, in a
/// writer of the given capacity.
pub fn encode_frame_with_capacity<P: Packet>(
    destination: &str,
    packet: &P,
    capacity: usize,
) -> Result<Vec<u8>, CodecError> {
    let mut wr = PacketWriter::new(capacity);
    wr.write_u32(0)?;
    wr.write_str(P::ID)?;
    wr.write_str(destination)?;
    packet.encode(&mut wr)?;

    let mut bytes = wr.into_bytes();
    let len = bytes.len() as u32;
    bytes[..LENGTH_PREFIX_SIZE].copy_from_slice(&len.to_be_bytes());
    Ok(bytes)
}

/// Encode `packet` as a complete frame, sized for anything up to
/// `MAX_FRAME_SIZE`.
pub fn encode_frame<P: Packet>(destination: &str, packet: &P) -> Result<Vec<u8>, CodecError> {
    encode_frame_with_capacity(destination, packet, MAX_FRAME_SIZE as usize)
}

/// Decode a whole frame's payload as `P`, requiring every byte be consumed.
pub fn decode_payload<P: Packet>(rd: &mut PacketReader<'_>) -> Result<P, CodecError> {
    let packet = P::decode(rd)?;
    rd.finish()?;
    Ok(packet)
}

/// Routing header of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Declared frame length.
    pub length: u32,
    /// Packet tag.
    pub packet_id: String,
    /// Addressee nickname; empty means the host.
    pub destination: String,
}

impl FrameHeader {
    /// Parse the header of a complete frame, returning a reader positioned
    /// at the first payload byte.
    pub fn peek(frame: &[u8]) -> Result<(Self, PacketReader<'_>), CodecError> {
        let mut rd = PacketReader::new(frame);
        let length = rd.read_u32()?;
        if length as usize != frame.len() {
            return Err(CodecError::LengthMismatch {
                declared: length,
                actual: frame.len(),
            });
        }
        let packet_id = rd.read_str()?;
        let destination = rd.read_str()?;
        Ok((
            Self {
                length,
                packet_id,
                destination,
            },
            rd,
        ))
    }

    /// True if the frame is addressed to the game host.
    pub fn is_for_host(&self) -> bool {
        self.destination == HOST
    }
}

/// Per-connection accumulation buffer that slices complete frames off the
/// front of a byte stream.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    max_frame_size: u32,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameBuffer {
    /// Create an empty buffer rejecting frames above `max_frame_size`.
    pub fn new(max_frame_size: u32) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_size,
        }
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet sliced into a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Remove and return the next complete frame, or `None` if more bytes
    /// are needed.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        if self.buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buf[..LENGTH_PREFIX_SIZE]);
        let length = u32::from_be_bytes(prefix);

        if length < MIN_FRAME_SIZE {
            return Err(CodecError::FrameTooSmall(length));
        }
        if length > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(length));
        }
        if self.buf.len() < length as usize {
            return Ok(None);
        }
        Ok(Some(self.buf.drain(..length as usize).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq)]
    struct Probe {
        flag: bool,
        n: i32,
        text: String,
    }

    impl Packet for Probe {
        const ID: &'static str = "probe";

        fn encode(&self, wr: &mut PacketWriter) -> Result<(), CodecError> {
            wr.write_bool(self.flag)?;
            wr.write_i32(self.n)?;
            wr.write_str(&self.text)
        }

        fn decode(rd: &mut PacketReader<'_>) -> Result<Self, CodecError> {
            Ok(Self {
                flag: rd.read_bool()?,
                n: rd.read_i32()?,
                text: rd.read_str()?,
            })
        }
    }

    #[test]
    fn test_big_endian_layout() {
        let mut wr = PacketWriter::default();
        wr.write_i32(0x0102_0304).unwrap();
        wr.write_u32(0xfffe_fdfc).unwrap();
        assert_eq!(wr.as_bytes(), &[1, 2, 3, 4, 0xff, 0xfe, 0xfd, 0xfc]);
    }

    #[test]
    fn test_high_bytes_do_not_sign_extend() {
        let bytes = [0x00, 0x80, 0xff, 0x90];
        let mut rd = PacketReader::new(&bytes);
        assert_eq!(rd.read_i32().unwrap(), 0x0080_ff90);

        let bytes = (-2i32).to_be_bytes();
        let mut rd = PacketReader::new(&bytes);
        assert_eq!(rd.read_i32().unwrap(), -2);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut wr = PacketWriter::default();
        wr.write_str("hello").unwrap();
        wr.write_str("").unwrap();
        assert_eq!(wr.as_bytes(), b"hello\0\0");

        let bytes = wr.into_bytes();
        let mut rd = PacketReader::new(&bytes);
        assert_eq!(rd.read_str().unwrap(), "hello");
        assert_eq!(rd.read_str().unwrap(), "");
        assert!(rd.is_empty());
    }

    #[test]
    fn test_missing_terminator() {
        let mut rd = PacketReader::new(b"abc");
        assert_eq!(rd.read_str(), Err(CodecError::MissingTerminator));
    }

    #[test]
    fn test_truncated_int() {
        let mut rd = PacketReader::new(&[0, 1]);
        assert_eq!(
            rd.read_i32(),
            Err(CodecError::Truncated { needed: 4, remaining: 2 })
        );
    }

    #[test]
    fn test_writer_overflow() {
        let mut wr = PacketWriter::new(6);
        wr.write_i32(1).unwrap();
        let err = wr.write_i32(2).unwrap_err();
        assert_eq!(err, CodecError::Overflow { needed: 8, capacity: 6 });
        assert_eq!(wr.len(), 4);
        assert!(matches!(wr.write_str("abc"), Err(CodecError::Overflow { .. })));
    }

    #[test]
    fn test_interior_nul_rejected() {
        let mut wr = PacketWriter::default();
        assert_eq!(wr.write_str("a\0b"), Err(CodecError::InteriorNul));
    }

    #[test]
    fn test_negative_count() {
        let bytes = (-1i32).to_be_bytes();
        let mut rd = PacketReader::new(&bytes);
        assert_eq!(rd.read_count(1), Err(CodecError::NegativeCount(-1)));
    }

    #[test]
    fn test_count_bounded_by_remaining() {
        let bytes = 1000i32.to_be_bytes();
        let mut rd = PacketReader::new(&bytes);
        assert!(matches!(rd.read_count(1), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn test_frame_layout() {
        let probe = Probe { flag: true, n: 7, text: "x".into() };
        let frame = encode_frame("bob", &probe).unwrap();

        // 4 + "probe\0" + "bob\0" + 1 + 4 + "x\0"
        assert_eq!(frame.len(), 4 + 6 + 4 + 1 + 4 + 2);
        assert_eq!(&frame[..4], &(frame.len() as u32).to_be_bytes());

        let (header, mut rd) = FrameHeader::peek(&frame).unwrap();
        assert_eq!(header.packet_id, "probe");
        assert_eq!(header.destination, "bob");
        assert!(!header.is_for_host());
        assert_eq!(decode_payload::<Probe>(&mut rd).unwrap(), probe);
    }

    #[test]
    fn test_frame_capacity_overflow() {
        let probe = Probe { flag: false, n: 0, text: "long enough".into() };
        let err = encode_frame_with_capacity(HOST, &probe, 16).unwrap_err();
        assert!(matches!(err, CodecError::Overflow { capacity: 16, .. }));
    }

    #[test]
    fn test_peek_rejects_length_mismatch() {
        let probe = Probe { flag: false, n: 0, text: String::new() };
        let mut frame = encode_frame(HOST, &probe).unwrap();
        frame.push(0);
        assert!(matches!(
            FrameHeader::peek(&frame),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let bytes = [0u8, 0, 0, 1, 0, 0, 0, 2, b'a', 0, 9];
        let mut rd = PacketReader::new(&bytes[3..]);
        assert_eq!(rd.read_u8().unwrap(), 1);
        let mut rd = PacketReader::new(&bytes);
        rd.read_i32().unwrap();
        rd.read_i32().unwrap();
        rd.read_str().unwrap();
        assert_eq!(rd.finish(), Err(CodecError::TrailingBytes(1)));
    }

    #[test]
    fn test_frame_buffer_waits_for_prefix() {
        let mut fb = FrameBuffer::default();
        fb.extend(&[0, 0]);
        assert_eq!(fb.next_frame(), Ok(None));
        assert_eq!(fb.buffered(), 2);
    }

    #[test]
    fn test_frame_buffer_multiple_frames_in_one_read() {
        let a = encode_frame(HOST, &Probe { flag: true, n: 1, text: "a".into() }).unwrap();
        let b = encode_frame("z", &Probe { flag: false, n: 2, text: "b".into() }).unwrap();
        let mut fb = FrameBuffer::default();
        let mut joined = a.clone();
        joined.extend_from_slice(&b);
        joined.extend_from_slice(&a[..5]);
        fb.extend(&joined);

        assert_eq!(fb.next_frame().unwrap(), Some(a.clone()));
        assert_eq!(fb.next_frame().unwrap(), Some(b));
        assert_eq!(fb.next_frame().unwrap(), None);
        assert_eq!(fb.buffered(), 5);
    }

    #[test]
    fn test_frame_buffer_rejects_bad_lengths() {
        let mut fb = FrameBuffer::new(100);
        fb.extend(&3u32.to_be_bytes());
        assert_eq!(fb.next_frame(), Err(CodecError::FrameTooSmall(3)));

        let mut fb = FrameBuffer::new(100);
        fb.extend(&101u32.to_be_bytes());
        assert_eq!(fb.next_frame(), Err(CodecError::FrameTooLarge(101)));
    }

    proptest! {
        #[test]
        fn prop_probe_roundtrip(flag: bool, n: i32, text in "[a-zA-Z0-9 ]{0,40}") {
            let probe = Probe { flag, n, text };
            let frame = encode_frame("dest", &probe).unwrap();
            let (_, mut rd) = FrameHeader::peek(&frame).unwrap();
            prop_assert_eq!(decode_payload::<Probe>(&mut rd).unwrap(), probe);
        }

        #[test]
        fn prop_frame_buffer_any_chunking(cuts in proptest::collection::vec(1usize..8, 1..30)) {
            let probe = Probe { flag: true, n: -99, text: "chunked".into() };
            let frame = encode_frame(HOST, &probe).unwrap();
            let mut fb = FrameBuffer::default();
            let mut produced = Vec::new();
            let mut offset = 0;
            for cut in cuts.iter().cycle() {
                if offset >= frame.len() {
                    break;
                }
                let end = (offset + cut).min(frame.len());
                fb.extend(&frame[offset..end]);
                offset = end;
                while let Some(f) = fb.next_frame().unwrap() {
                    produced.push(f);
                }
            }
            prop_assert_eq!(produced, vec![frame]);
        }
    }
}
