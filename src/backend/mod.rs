//! Tile compute backends.
//!
//! A backend executes the raw tile instructions. It does no validation of
//! its own: [`TilePipeline`](crate::pipeline::TilePipeline) checks state,
//! geometry and buffer sizes first, then calls in here.
//!
//! Available backends:
//! - `amx`: the real instructions via inline assembly (Linux x86_64)
//! - `emulated`: a byte-exact software model of the same instructions

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub mod amx;
pub mod emulated;

use crate::config::{TileConfiguration, TileSlot};

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub use amx::AmxBackend;
pub use emulated::SoftwareBackend;

/// Which backend ran a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Amx,
    Software,
}

/// The configure/load/compute/store/release unit.
///
/// Every method except [`kind`](Self::kind), [`name`](Self::name) and
/// [`release`](Self::release) is `unsafe`: on real hardware, a bad slot, a
/// missing configuration or a short buffer is a fault or an out-of-bounds
/// memory access.
pub trait TileComputeBackend {
    fn kind(&self) -> Backend;

    fn name(&self) -> &'static str;

    /// `LDTILECFG`. Zeroes every tile.
    ///
    /// # Safety
    ///
    /// `config` must have passed [`TileConfiguration`] validation.
    unsafe fn load_config(&mut self, config: &TileConfiguration);

    /// `TILELOADD`: reads `rows` rows of `colsb` bytes, `stride` bytes apart.
    ///
    /// # Safety
    ///
    /// - a configuration is loaded and `slot` is used by it
    /// - `src` holds at least `(rows - 1) * stride + colsb` bytes
    unsafe fn load(&mut self, slot: TileSlot, src: &[u8], stride: usize);

    /// `TILEZERO`.
    ///
    /// # Safety
    ///
    /// A configuration is loaded and `slot` is used by it.
    unsafe fn zero(&mut self, slot: TileSlot);

    /// `TDPBSSD dst, lhs, rhs`: signed byte dot products added into i32 lanes.
    ///
    /// # Safety
    ///
    /// All three slots are configured, pairwise distinct, and their shapes
    /// satisfy `lhs.rows == dst.rows`, `rhs.rows * 4 == lhs.colsb`,
    /// `rhs.colsb == dst.colsb`, with every colsb a multiple of 4.
    unsafe fn dot_product_accumulate(&mut self, dst: TileSlot, lhs: TileSlot, rhs: TileSlot);

    /// `TILESTORED`: inverse of [`load`](Self::load).
    ///
    /// # Safety
    ///
    /// Same as [`load`](Self::load), with `dst` as the buffer.
    unsafe fn store(&mut self, slot: TileSlot, dst: &mut [u8], stride: usize);

    /// `TILERELEASE`. Safe in any state, including twice in a row.
    fn release(&mut self);
}
