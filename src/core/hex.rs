//! Cube Hex Coordinates
//!
//! Cube coordinates `(q, r, s)` with the invariant `q + r + s == 0`.
//! Every constructor in this module preserves the invariant; `s` is never
//! set independently.
//!
//! Direction names follow the map as the player sees it (pointy-top hexes):
//!
//! ```text
//!        LEFT_UP   RIGHT_UP
//!     LEFT     (hex)     RIGHT
//!       LEFT_DOWN  RIGHT_DOWN
//! ```

use std::fmt;
use std::ops::{Add, Neg, Sub};

const SQRT3: f32 = 1.732_050_8;

/// A hex cell in cube coordinates.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HexCoord {
    q: i32,
    r: i32,
    s: i32,
}

impl HexCoord {
    /// The origin cell.
    pub const ORIGIN: Self = Self { q: 0, r: 0, s: 0 };

    /// One step towards the upper right.
    pub const RIGHT_UP: Self = Self { q: 1, r: -1, s: 0 };
    /// One step to the right.
    pub const RIGHT: Self = Self { q: 1, r: 0, s: -1 };
    /// One step towards the lower right.
    pub const RIGHT_DOWN: Self = Self { q: 0, r: 1, s: -1 };
    /// One step towards the lower left.
    pub const LEFT_DOWN: Self = Self { q: -1, r: 1, s: 0 };
    /// One step to the left.
    pub const LEFT: Self = Self { q: -1, r: 0, s: 1 };
    /// One step towards the upper left.
    pub const LEFT_UP: Self = Self { q: 0, r: -1, s: 1 };

    /// The six unit directions, clockwise starting at `RIGHT_UP`.
    pub const DIRECTIONS: [Self; 6] = [
        Self::RIGHT_UP,
        Self::RIGHT,
        Self::RIGHT_DOWN,
        Self::LEFT_DOWN,
        Self::LEFT,
        Self::LEFT_UP,
    ];

    /// Create from axial coordinates; `s` is derived.
    #[inline]
    pub const fn from_axial(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Create from explicit cube components.
    ///
    /// Returns `None` if the components violate `q + r + s == 0`.
    pub fn from_cube(q: i32, r: i32, s: i32) -> Option<Self> {
        if q.checked_add(r)?.checked_add(s)? == 0 {
            Some(Self { q, r, s })
        } else {
            None
        }
    }

    /// Create from "odd-r" offset coordinates (odd rows shoved right).
    pub const fn from_offset(col: i32, row: i32) -> Self {
        let q = col - (row - (row & 1)) / 2;
        Self::from_axial(q, row)
    }

    /// Convert to "odd-r" offset coordinates `(col, row)`.
    pub const fn to_offset(self) -> (i32, i32) {
        let col = self.q + (self.r - (self.r & 1)) / 2;
        (col, self.r)
    }

    /// Q component.
    #[inline]
    pub const fn q(self) -> i32 {
        self.q
    }

    /// R component.
    #[inline]
    pub const fn r(self) -> i32 {
        self.r
    }

    /// S component (always `-q - r`).
    #[inline]
    pub const fn s(self) -> i32 {
        self.s
    }

    /// Component-wise addition.
    #[inline]
    pub const fn add(self, other: Self) -> Self {
        Self {
            q: self.q + other.q,
            r: self.r + other.r,
            s: self.s + other.s,
        }
    }

    /// Component-wise subtraction.
    #[inline]
    pub const fn subtract(self, other: Self) -> Self {
        Self {
            q: self.q - other.q,
            r: self.r - other.r,
            s: self.s - other.s,
        }
    }

    /// Multiply every component by `k`.
    #[inline]
    pub const fn scale(self, k: i32) -> Self {
        Self {
            q: self.q * k,
            r: self.r * k,
            s: self.s * k,
        }
    }

    /// Neighbouring cell across the given edge.
    #[inline]
    pub const fn neighbor(self, edge: Edge) -> Self {
        self.add(edge.offset())
    }

    /// The six neighbours, in `DIRECTIONS` order.
    pub fn neighbors(self) -> [Self; 6] {
        Self::DIRECTIONS.map(|d| self.add(d))
    }

    /// Hex distance: `max(|dq|, |dr|, |ds|)`.
    pub fn distance(self, other: Self) -> i32 {
        let d = self.subtract(other);
        d.q.abs().max(d.r.abs()).max(d.s.abs())
    }

    /// All cells at exactly `range` steps, walking the six edges of the ring.
    ///
    /// `ring(0)` is just the center.
    pub fn ring(self, range: u32) -> Vec<Self> {
        if range == 0 {
            return vec![self];
        }
        let radius = range as i32;
        let mut results = Vec::with_capacity(6 * range as usize);
        let mut hex = self.add(Self::LEFT.scale(radius));
        for direction in Self::DIRECTIONS {
            for _ in 0..range {
                results.push(hex);
                hex = hex.add(direction);
            }
        }
        results
    }

    /// The center followed by rings `1..=range`.
    pub fn spiral(self, range: u32) -> Vec<Self> {
        let mut results = vec![self];
        for k in 1..=range {
            results.extend(self.ring(k));
        }
        results
    }

    /// Round fractional cube coordinates to the nearest cell.
    ///
    /// Each component is rounded independently; the one with the largest
    /// rounding error is then recomputed from the other two.
    pub fn round(q: f32, r: f32, s: f32) -> Self {
        let mut rq = q.round();
        let mut rr = r.round();
        let mut rs = s.round();

        let dq = (rq - q).abs();
        let dr = (rr - r).abs();
        let ds = (rs - s).abs();

        if dq > dr && dq > ds {
            rq = -rr - rs;
        } else if dr > ds {
            rr = -rq - rs;
        } else {
            rs = -rq - rr;
        }

        Self {
            q: rq as i32,
            r: rr as i32,
            s: rs as i32,
        }
    }

    /// Cell center in world space for a unit-size pointy-top layout.
    pub fn to_world_unscaled(self) -> (f32, f32) {
        Layout::PointyTop.to_pixel(self, 1.0)
    }

    /// Cell under a world-space point for a unit-size pointy-top layout.
    pub fn from_world_unscaled(x: f32, y: f32) -> Self {
        Layout::PointyTop.from_pixel(x, y, 1.0)
    }
}

impl Add for HexCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        HexCoord::add(self, other)
    }
}

impl Sub for HexCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        self.subtract(other)
    }
}

impl Neg for HexCoord {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Debug for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hex({}, {}, {})", self.q, self.r, self.s)
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.q, self.r, self.s)
    }
}

// =============================================================================
// EDGES
// =============================================================================

/// One of the six edges of a hex, clockwise from the upper right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Edge {
    /// Upper right edge.
    RightUp = 0,
    /// Right edge.
    Right = 1,
    /// Lower right edge.
    RightDown = 2,
    /// Lower left edge.
    LeftDown = 3,
    /// Left edge.
    Left = 4,
    /// Upper left edge.
    LeftUp = 5,
}

impl Edge {
    /// All edges in index order.
    pub const ALL: [Edge; 6] = [
        Edge::RightUp,
        Edge::Right,
        Edge::RightDown,
        Edge::LeftDown,
        Edge::Left,
        Edge::LeftUp,
    ];

    /// Index into per-edge arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Offset to the neighbour sharing this edge.
    #[inline]
    pub const fn offset(self) -> HexCoord {
        HexCoord::DIRECTIONS[self as usize]
    }

    /// The same edge seen from the neighbouring hex.
    pub const fn opposite(self) -> Edge {
        Self::ALL[(self as usize + 3) % 6]
    }
}

/// A specific edge of a specific hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EdgeCoord {
    /// Owning hex.
    pub hex: HexCoord,
    /// Which edge.
    pub edge: Edge,
}

impl EdgeCoord {
    /// Create a new edge coordinate.
    pub const fn new(hex: HexCoord, edge: Edge) -> Self {
        Self { hex, edge }
    }

    /// The same physical edge addressed from the other side.
    pub const fn mirrored(self) -> Self {
        Self {
            hex: self.hex.neighbor(self.edge),
            edge: self.edge.opposite(),
        }
    }
}

// =============================================================================
// PIXEL LAYOUT
// =============================================================================

/// Hex orientation used for pixel conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Pointed tops, rows offset horizontally.
    PointyTop,
    /// Flat tops, columns offset vertically.
    FlatTop,
}

impl Layout {
    /// Center of `hex` in pixel space for hexes of circumradius `size`.
    pub fn to_pixel(self, hex: HexCoord, size: f32) -> (f32, f32) {
        let q = hex.q as f32;
        let r = hex.r as f32;
        match self {
            Layout::PointyTop => (size * (SQRT3 * q + SQRT3 / 2.0 * r), size * (1.5 * r)),
            Layout::FlatTop => (size * (1.5 * q), size * (SQRT3 / 2.0 * q + SQRT3 * r)),
        }
    }

    /// Cell containing the pixel `(x, y)`.
    pub fn from_pixel(self, x: f32, y: f32, size: f32) -> HexCoord {
        let (q, r) = match self {
            Layout::PointyTop => ((SQRT3 / 3.0 * x - y / 3.0) / size, (2.0 / 3.0 * y) / size),
            Layout::FlatTop => ((2.0 / 3.0 * x) / size, (-x / 3.0 + SQRT3 / 3.0 * y) / size),
        };
        HexCoord::round(q, r, -q - r)
    }
}
