//! The tile compute pipeline: apply → load → multiply_accumulate → store → release.
//!
//! [`TilePipeline`] owns a backend and the configuration currently loaded
//! into it. Every operation is checked against that configuration before the
//! backend runs, so a slot that isn't configured, a short buffer or
//! mismatched operand shapes come back as a [`PreconditionViolation`] instead
//! of a CPU fault.
//!
//! ```text
//! Idle ──apply──▶ Configured ──release──▶ Released
//!                  │  ▲                     │
//!                  └──┘ load/zero/mma/store └──apply──▶ Configured
//! ```

use std::marker::PhantomData;

use bytemuck::Pod;
use log::debug;

use crate::backend::{SoftwareBackend, TileComputeBackend};
use crate::config::{TileConfiguration, TileShape, TileSlot};
use crate::error::PreconditionViolation;

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
use crate::backend::AmxBackend;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
use crate::error::PermissionError;
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
use crate::permission::TilePermission;

/// Coarse lifecycle of the tile register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Nothing applied yet.
    Idle,
    /// A configuration is loaded and tiles are addressable.
    Configured,
    /// Released: registers empty, configuration gone.
    Released,
}

/// Drives a [`TileComputeBackend`] through the tile lifecycle.
///
/// Bound to the thread that created it. Dropping a configured pipeline
/// releases the tile state.
pub struct TilePipeline<B: TileComputeBackend> {
    backend: B,
    config: Option<TileConfiguration>,
    state: TileState,
    _thread_bound: PhantomData<*const ()>,
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
impl TilePipeline<AmxBackend> {
    /// A pipeline on the real AMX unit.
    ///
    /// A thread has one tile register file, so this fails with
    /// `RegistersInUse` while another hardware pipeline lives on the thread.
    pub fn hardware(permit: TilePermission) -> Result<Self, PermissionError> {
        Ok(Self::new(AmxBackend::new(permit)?))
    }
}

impl TilePipeline<SoftwareBackend> {
    /// A pipeline on the software model. Needs no permission.
    pub fn emulated() -> Self {
        Self::new(SoftwareBackend::new())
    }
}

impl<B: TileComputeBackend> TilePipeline<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: None,
            state: TileState::Idle,
            _thread_bound: PhantomData,
        }
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn configuration(&self) -> Option<&TileConfiguration> {
        self.config.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Loads `config` into the tile unit.
    ///
    /// Re-applying the active configuration is allowed and zeroes every tile.
    /// Applying a different one requires a [`release`](Self::release) first.
    pub fn apply(&mut self, config: &TileConfiguration) -> Result<(), PreconditionViolation> {
        if let Some(active) = &self.config {
            if active != config {
                return Err(PreconditionViolation::ReconfigureWithoutRelease);
            }
        }

        debug!("{}: ldtilecfg {:?}", self.backend.name(), config);
        // SAFETY: a TileConfiguration can only be built through validation.
        unsafe { self.backend.load_config(config) };

        self.config = Some(config.clone());
        self.state = TileState::Configured;
        Ok(())
    }

    /// Copies `rows` rows of `colsb` bytes from `src` into `slot`.
    ///
    /// `stride` is the distance between rows of `src` in bytes.
    pub fn load<T: Pod>(&mut self, slot: u8, src: &[T], stride: usize) -> Result<(), PreconditionViolation> {
        let slot = self.configured_slot(slot, "load")?;
        let bytes: &[u8] = bytemuck::cast_slice(src);
        self.check_buffer(slot, bytes.len(), stride)?;

        // SAFETY: slot is configured and `bytes` covers its geometry at `stride`.
        unsafe { self.backend.load(slot, bytes, stride) };
        Ok(())
    }

    /// Zeroes `slot`, e.g. to start an accumulator without a host buffer.
    pub fn zero(&mut self, slot: u8) -> Result<(), PreconditionViolation> {
        let slot = self.configured_slot(slot, "zero")?;

        // SAFETY: slot is configured.
        unsafe { self.backend.zero(slot) };
        Ok(())
    }

    /// `dst += lhs · rhs` with signed byte inputs and i32 accumulators.
    ///
    /// `lhs` is M rows of K bytes, `rhs` is K/4 rows of N groups of four
    /// bytes, `dst` is M rows of N i32. Each output element adds the dot
    /// product of a row of `lhs` with the matching byte groups of `rhs`.
    pub fn multiply_accumulate(&mut self, dst: u8, lhs: u8, rhs: u8) -> Result<(), PreconditionViolation> {
        let dst = self.configured_slot(dst, "multiply_accumulate")?;
        let lhs = self.configured_slot(lhs, "multiply_accumulate")?;
        let rhs = self.configured_slot(rhs, "multiply_accumulate")?;

        if lhs == dst || lhs == rhs {
            return Err(PreconditionViolation::DuplicateOperand { slot: lhs.index() });
        }
        if rhs == dst {
            return Err(PreconditionViolation::DuplicateOperand { slot: rhs.index() });
        }

        let (d, a, b) = (self.shape(dst), self.shape(lhs), self.shape(rhs));
        check_dot_product_shapes((dst, d), (lhs, a), (rhs, b))?;

        // SAFETY: distinct configured slots with compatible shapes.
        unsafe { self.backend.dot_product_accumulate(dst, lhs, rhs) };
        Ok(())
    }

    /// Copies `slot` back out to `dst`, `stride` bytes per row.
    pub fn store<T: Pod>(&mut self, slot: u8, dst: &mut [T], stride: usize) -> Result<(), PreconditionViolation> {
        let slot = self.configured_slot(slot, "store")?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(dst);
        self.check_buffer(slot, bytes.len(), stride)?;

        // SAFETY: slot is configured and `bytes` covers its geometry at `stride`.
        unsafe { self.backend.store(slot, bytes, stride) };
        Ok(())
    }

    /// Returns the tile unit to its init state. Calling it again is harmless.
    pub fn release(&mut self) {
        if self.state == TileState::Configured {
            debug!("{}: tilerelease", self.backend.name());
        }
        self.backend.release();
        self.config = None;
        self.state = TileState::Released;
    }

    fn configured_slot(&self, slot: u8, operation: &'static str) -> Result<TileSlot, PreconditionViolation> {
        let Some(config) = &self.config else {
            return Err(PreconditionViolation::NotConfigured { operation });
        };
        let slot = TileSlot::new(slot)?;
        if !config.shape(slot).is_used() {
            return Err(PreconditionViolation::SlotNotConfigured { slot: slot.index() });
        }
        Ok(slot)
    }

    fn shape(&self, slot: TileSlot) -> TileShape {
        self.config
            .as_ref()
            .map(|config| config.shape(slot))
            .unwrap_or(TileShape::UNUSED)
    }

    fn check_buffer(&self, slot: TileSlot, actual: usize, stride: usize) -> Result<(), PreconditionViolation> {
        let required = self.shape(slot).required_bytes(stride).unwrap_or(usize::MAX);
        if actual < required {
            return Err(PreconditionViolation::BufferTooSmall {
                slot: slot.index(),
                required,
                actual,
            });
        }
        Ok(())
    }
}

impl<B: TileComputeBackend> Drop for TilePipeline<B> {
    fn drop(&mut self) {
        if self.state == TileState::Configured {
            self.release();
        }
    }
}

fn check_dot_product_shapes(
    (dst, d): (TileSlot, TileShape),
    (lhs, a): (TileSlot, TileShape),
    (rhs, b): (TileSlot, TileShape),
) -> Result<(), PreconditionViolation> {
    for (slot, shape) in [(dst, d), (lhs, a), (rhs, b)] {
        if shape.colsb % 4 != 0 {
            return Err(PreconditionViolation::ElementWidth {
                slot: slot.index(),
                colsb: shape.colsb,
            });
        }
    }
    if a.rows != d.rows {
        return Err(PreconditionViolation::RowMismatch {
            dst_rows: d.rows,
            lhs_rows: a.rows,
        });
    }
    if b.rows as u16 * 4 != a.colsb {
        return Err(PreconditionViolation::ContractionMismatch {
            lhs_colsb: a.colsb,
            rhs_rows: b.rows,
        });
    }
    if b.colsb != d.colsb {
        return Err(PreconditionViolation::ColumnMismatch {
            dst_colsb: d.colsb,
            rhs_colsb: b.colsb,
        });
    }
    Ok(())
}
