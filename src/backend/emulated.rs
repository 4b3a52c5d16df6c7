//! Software model of the AMX tile unit.
//!
//! Follows the instruction pseudocode closely enough that results match the
//! hardware byte for byte, including the zeroing of bytes outside the
//! configured rows and columns. Useful on machines without AMX and as a
//! cross-check on machines with it.

use log::trace;

use super::{Backend, TileComputeBackend};
use crate::config::{MAX_COLSB, MAX_ROWS, MAX_SLOTS, TileConfiguration, TileShape, TileSlot};

const ROW_BYTES: usize = MAX_COLSB as usize;
const TILE_BYTES: usize = MAX_ROWS as usize * ROW_BYTES;

/// Eight 1 KiB tiles plus the active configuration.
pub struct SoftwareBackend {
    config: Option<TileConfiguration>,
    tiles: Box<[[u8; TILE_BYTES]; MAX_SLOTS]>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            config: None,
            tiles: Box::new([[0u8; TILE_BYTES]; MAX_SLOTS]),
        }
    }

    /// Raw contents of a tile, all 16 rows of 64 bytes.
    pub fn tile(&self, slot: TileSlot) -> &[u8; TILE_BYTES] {
        &self.tiles[slot.index() as usize]
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn shape(&self, slot: TileSlot) -> TileShape {
        self.config
            .as_ref()
            .map(|config| config.shape(slot))
            .unwrap_or(TileShape::UNUSED)
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn read_i32(tile: &[u8; TILE_BYTES], row: usize, col: usize) -> i32 {
    let at = row * ROW_BYTES + col * 4;
    i32::from_le_bytes([tile[at], tile[at + 1], tile[at + 2], tile[at + 3]])
}

impl TileComputeBackend for SoftwareBackend {
    fn kind(&self) -> Backend {
        Backend::Software
    }

    fn name(&self) -> &'static str {
        "software"
    }

    unsafe fn load_config(&mut self, config: &TileConfiguration) {
        self.config = Some(config.clone());
        for tile in self.tiles.iter_mut() {
            tile.fill(0);
        }
    }

    unsafe fn load(&mut self, slot: TileSlot, src: &[u8], stride: usize) {
        let shape = self.shape(slot);
        let (rows, colsb) = (shape.rows as usize, shape.colsb as usize);
        trace!("emulated tileloadd {slot} ({rows}x{colsb}, stride {stride})");

        let tile = &mut self.tiles[slot.index() as usize];
        tile.fill(0);
        for r in 0..rows {
            let from = r * stride;
            tile[r * ROW_BYTES..r * ROW_BYTES + colsb].copy_from_slice(&src[from..from + colsb]);
        }
    }

    unsafe fn zero(&mut self, slot: TileSlot) {
        self.tiles[slot.index() as usize].fill(0);
    }

    unsafe fn dot_product_accumulate(&mut self, dst: TileSlot, lhs: TileSlot, rhs: TileSlot) {
        let m = self.shape(dst).rows as usize;
        let n = self.shape(dst).colsb as usize / 4;
        let k = self.shape(lhs).colsb as usize / 4;
        trace!("emulated tdpbssd {dst}, {lhs}, {rhs} (m={m} n={n} k={})", k * 4);

        let a = &self.tiles[lhs.index() as usize];
        let b = &self.tiles[rhs.index() as usize];
        let c = &self.tiles[dst.index() as usize];

        let mut out = [0u8; TILE_BYTES];
        for row in 0..m {
            for col in 0..n {
                let mut acc = read_i32(c, row, col);
                for group in 0..k {
                    for byte in 0..4 {
                        let x = a[row * ROW_BYTES + group * 4 + byte] as i8 as i32;
                        let y = b[group * ROW_BYTES + col * 4 + byte] as i8 as i32;
                        acc = acc.wrapping_add(x * y);
                    }
                }
                let at = row * ROW_BYTES + col * 4;
                out[at..at + 4].copy_from_slice(&acc.to_le_bytes());
            }
        }

        self.tiles[dst.index() as usize] = out;
    }

    unsafe fn store(&mut self, slot: TileSlot, dst: &mut [u8], stride: usize) {
        let shape = self.shape(slot);
        let (rows, colsb) = (shape.rows as usize, shape.colsb as usize);
        trace!("emulated tilestored {slot} ({rows}x{colsb}, stride {stride})");

        let tile = &self.tiles[slot.index() as usize];
        for r in 0..rows {
            let to = r * stride;
            dst[to..to + colsb].copy_from_slice(&tile[r * ROW_BYTES..r * ROW_BYTES + colsb]);
        }
    }

    fn release(&mut self) {
        self.config = None;
        for tile in self.tiles.iter_mut() {
            tile.fill(0);
        }
    }
}
