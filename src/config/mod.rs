//! Tile configuration: the 64-byte record `LDTILECFG` reads.
//!
//! The hardware wants an exact byte layout:
//!
//! ```text
//! offset  size  field
//!      0     1  palette id
//!      1     1  start row
//!      2    14  reserved
//!     16    16  colsb[8]  (u16, little-endian)
//!     32    16  reserved
//!     48     8  rows[8]
//!     56     8  reserved
//! ```
//!
//! Reserved regions must be zero or `LDTILECFG` raises #GP. Rather than
//! exposing padding fields, [`TileConfiguration`] keeps the whole record as an
//! opaque byte array and only hands out the fields that mean something.

use std::fmt;

use crate::error::PreconditionViolation;

/// Number of tile registers in palette 1.
pub const MAX_SLOTS: usize = 8;
/// Maximum rows per tile in palette 1.
pub const MAX_ROWS: u8 = 16;
/// Maximum bytes per tile row in palette 1.
pub const MAX_COLSB: u16 = 64;
/// The only palette this crate configures.
pub const PALETTE_ID: u8 = 1;
/// Size of the configuration record.
pub const CONFIG_BYTES: usize = 64;

const PALETTE_OFFSET: usize = 0;
const START_ROW_OFFSET: usize = 1;
const COLSB_OFFSET: usize = 16;
const ROWS_OFFSET: usize = 48;
const RESERVED: [std::ops::Range<usize>; 3] = [2..16, 32..48, 56..64];

/// A tile register index, always in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileSlot(u8);

impl TileSlot {
    pub fn new(slot: u8) -> Result<Self, PreconditionViolation> {
        if (slot as usize) < MAX_SLOTS {
            Ok(Self(slot))
        } else {
            Err(PreconditionViolation::SlotOutOfRange { slot })
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// All eight slots, in order.
    pub fn all() -> impl Iterator<Item = TileSlot> {
        (0..MAX_SLOTS as u8).map(TileSlot)
    }
}

impl fmt::Display for TileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tmm{}", self.0)
    }
}

/// Geometry of one tile register: `rows` rows of `colsb` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileShape {
    pub rows: u8,
    pub colsb: u16,
}

impl TileShape {
    /// A slot the configuration leaves untouched.
    pub const UNUSED: TileShape = TileShape { rows: 0, colsb: 0 };

    pub const fn new(rows: u8, colsb: u16) -> Self {
        Self { rows, colsb }
    }

    /// Shape of an i8 operand tile with `k` bytes per row.
    pub const fn operand(rows: u8, k: u16) -> Self {
        Self::new(rows, k)
    }

    /// Shape of an i32 accumulator tile with `n` columns.
    ///
    /// The byte width comes from the element width, so 16 columns of i32
    /// occupy the full 64 bytes of a row. Oversized `n` saturates so that
    /// validation rejects it.
    pub const fn accumulator(rows: u8, n: u16) -> Self {
        Self::new(rows, n.saturating_mul(4))
    }

    pub fn is_used(&self) -> bool {
        self.rows != 0 || self.colsb != 0
    }

    /// Bytes a host buffer must hold to back this tile at `stride`.
    ///
    /// `None` when the arithmetic overflows, which no real buffer satisfies.
    pub fn required_bytes(&self, stride: usize) -> Option<usize> {
        if !self.is_used() {
            return Some(0);
        }
        (self.rows as usize - 1)
            .checked_mul(stride)?
            .checked_add(self.colsb as usize)
    }

    fn validate(&self, slot: u8) -> Result<(), PreconditionViolation> {
        match (self.rows, self.colsb) {
            (0, 0) => Ok(()),
            (rows, colsb) if rows == 0 || colsb == 0 => {
                Err(PreconditionViolation::HalfConfiguredSlot { slot, rows, colsb })
            }
            (rows, _) if rows > MAX_ROWS => Err(PreconditionViolation::InvalidRows { slot, rows }),
            (_, colsb) if colsb > MAX_COLSB => {
                Err(PreconditionViolation::InvalidColumnBytes { slot, colsb })
            }
            _ => Ok(()),
        }
    }
}

/// The configuration record handed to `LDTILECFG`.
///
/// Always palette 1 and start row 0 when built through [`TileConfiguration::new`].
/// Aligned to 64 bytes so the record never straddles a cache line.
#[derive(Clone, PartialEq, Eq)]
#[repr(C, align(64))]
pub struct TileConfiguration {
    bytes: [u8; CONFIG_BYTES],
}

impl TileConfiguration {
    /// Builds a palette-1 configuration where `shapes[i]` describes slot `i`.
    ///
    /// Slots past the end of `shapes` stay unused.
    ///
    /// # Example
    ///
    /// ```
    /// use amxtile::config::{TileConfiguration, TileShape, TileSlot};
    ///
    /// let config = TileConfiguration::new(&[
    ///     TileShape::accumulator(16, 16),
    ///     TileShape::operand(16, 64),
    ///     TileShape::operand(16, 64),
    /// ])
    /// .unwrap();
    ///
    /// assert_eq!(config.shape(TileSlot::new(0).unwrap()).colsb, 64);
    /// assert_eq!(config.as_bytes()[0], 1);
    /// ```
    pub fn new(shapes: &[TileShape]) -> Result<Self, PreconditionViolation> {
        if shapes.len() > MAX_SLOTS {
            return Err(PreconditionViolation::TooManySlots { count: shapes.len() });
        }

        let mut bytes = [0u8; CONFIG_BYTES];
        bytes[PALETTE_OFFSET] = PALETTE_ID;
        bytes[START_ROW_OFFSET] = 0;

        for (slot, shape) in shapes.iter().enumerate() {
            shape.validate(slot as u8)?;
            let colsb_at = COLSB_OFFSET + slot * 2;
            bytes[colsb_at..colsb_at + 2].copy_from_slice(&shape.colsb.to_le_bytes());
            bytes[ROWS_OFFSET + slot] = shape.rows;
        }

        Ok(Self { bytes })
    }

    /// Decodes a raw 64-byte record, rejecting anything `LDTILECFG` would
    /// fault on or that this crate does not drive (non-zero start row).
    pub fn from_bytes(raw: &[u8; CONFIG_BYTES]) -> Result<Self, PreconditionViolation> {
        if raw[PALETTE_OFFSET] != PALETTE_ID {
            return Err(PreconditionViolation::UnsupportedPalette {
                palette: raw[PALETTE_OFFSET],
            });
        }
        if raw[START_ROW_OFFSET] != 0 {
            return Err(PreconditionViolation::NonZeroStartRow {
                start_row: raw[START_ROW_OFFSET],
            });
        }
        for range in RESERVED {
            for offset in range {
                if raw[offset] != 0 {
                    return Err(PreconditionViolation::NonZeroReserved {
                        offset,
                        value: raw[offset],
                    });
                }
            }
        }

        let config = Self { bytes: *raw };
        for slot in TileSlot::all() {
            config.shape(slot).validate(slot.index())?;
        }
        Ok(config)
    }

    /// The bit-exact record.
    pub fn as_bytes(&self) -> &[u8; CONFIG_BYTES] {
        &self.bytes
    }

    pub fn palette(&self) -> u8 {
        self.bytes[PALETTE_OFFSET]
    }

    pub fn start_row(&self) -> u8 {
        self.bytes[START_ROW_OFFSET]
    }

    pub fn shape(&self, slot: TileSlot) -> TileShape {
        let i = slot.index() as usize;
        let colsb_at = COLSB_OFFSET + i * 2;
        TileShape {
            rows: self.bytes[ROWS_OFFSET + i],
            colsb: u16::from_le_bytes([self.bytes[colsb_at], self.bytes[colsb_at + 1]]),
        }
    }

    /// Slots with non-zero geometry.
    pub fn used_slots(&self) -> impl Iterator<Item = (TileSlot, TileShape)> + '_ {
        TileSlot::all()
            .map(|slot| (slot, self.shape(slot)))
            .filter(|(_, shape)| shape.is_used())
    }
}

impl fmt::Debug for TileConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("TileConfiguration");
        s.field("palette", &self.palette());
        s.field("start_row", &self.start_row());
        let used: Vec<_> = self
            .used_slots()
            .map(|(slot, shape)| (slot.index(), shape.rows, shape.colsb))
            .collect();
        s.field("slots", &used);
        s.finish()
    }
}

/// Builds a configuration from `(rows, colsb)` pairs, one per slot.
///
/// `(0, 0)` leaves a slot unused.
pub fn build_configuration(slots: &[(u8, u16)]) -> Result<TileConfiguration, PreconditionViolation> {
    let shapes: Vec<TileShape> = slots
        .iter()
        .map(|&(rows, colsb)| TileShape::new(rows, colsb))
        .collect();
    TileConfiguration::new(&shapes)
}
