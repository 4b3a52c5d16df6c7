//! The real tile unit, driven through inline assembly.
//!
//! Tile registers are encoded in the instruction, so a runtime slot index
//! has to be turned into one of eight (or, for `TDPBSSD`, one of 336)
//! instruction variants. The macros below expand those matches.
//!
//! The mnemonics are assembled directly, which keeps this on stable Rust
//! without the AMX intrinsics.

use std::arch::asm;
use std::cell::Cell;
use std::marker::PhantomData;

use log::trace;

use super::{Backend, TileComputeBackend};
use crate::config::{TileConfiguration, TileSlot};
use crate::error::PermissionError;
use crate::permission::{TilePermission, cpuid};

/// Expands `$mac!(n, args..)` for the tile number in `$index`.
macro_rules! each_tmm {
    ($index:expr, $mac:ident!($($args:tt)*)) => {
        match $index {
            0 => $mac!(0, $($args)*),
            1 => $mac!(1, $($args)*),
            2 => $mac!(2, $($args)*),
            3 => $mac!(3, $($args)*),
            4 => $mac!(4, $($args)*),
            5 => $mac!(5, $($args)*),
            6 => $mac!(6, $($args)*),
            7 => $mac!(7, $($args)*),
            _ => unreachable!("tile slots stop at 7"),
        }
    };
}

macro_rules! tileloadd {
    ($t:literal, $base:expr, $stride:expr) => {
        unsafe {
            asm!(
                concat!("tileloadd tmm", $t, ", [{base} + {stride} * 1]"),
                base = in(reg) $base,
                stride = in(reg) $stride,
                options(nostack, readonly, preserves_flags),
            )
        }
    };
}

macro_rules! tilestored {
    ($t:literal, $base:expr, $stride:expr) => {
        unsafe {
            asm!(
                concat!("tilestored [{base} + {stride} * 1], tmm", $t),
                base = in(reg) $base,
                stride = in(reg) $stride,
                options(nostack, preserves_flags),
            )
        }
    };
}

macro_rules! tilezero {
    ($t:literal,) => {
        unsafe { asm!(concat!("tilezero tmm", $t), options(nostack, preserves_flags)) }
    };
}

/// The assembler rejects `TDPBSSD` unless all three registers differ, so
/// only distinct triples are listed: `(dst, lhs) => [rhs..]`.
macro_rules! tdpbssd {
    (@table $dst:expr, $lhs:expr, $rhs:expr; $( ($d:literal, $l:literal) => [$($r:literal)*], )*) => {
        match ($dst, $lhs, $rhs) {
            $($(
                ($d, $l, $r) => unsafe {
                    asm!(
                        concat!("tdpbssd tmm", $d, ", tmm", $l, ", tmm", $r),
                        options(nostack, preserves_flags),
                    )
                },
            )*)*
            _ => unreachable!("tdpbssd operands must be distinct tile slots"),
        }
    };
    ($dst:expr, $lhs:expr, $rhs:expr) => {
        tdpbssd!(@table $dst, $lhs, $rhs;
            (0, 1) => [2 3 4 5 6 7],
            (0, 2) => [1 3 4 5 6 7],
            (0, 3) => [1 2 4 5 6 7],
            (0, 4) => [1 2 3 5 6 7],
            (0, 5) => [1 2 3 4 6 7],
            (0, 6) => [1 2 3 4 5 7],
            (0, 7) => [1 2 3 4 5 6],
            (1, 0) => [2 3 4 5 6 7],
            (1, 2) => [0 3 4 5 6 7],
            (1, 3) => [0 2 4 5 6 7],
            (1, 4) => [0 2 3 5 6 7],
            (1, 5) => [0 2 3 4 6 7],
            (1, 6) => [0 2 3 4 5 7],
            (1, 7) => [0 2 3 4 5 6],
            (2, 0) => [1 3 4 5 6 7],
            (2, 1) => [0 3 4 5 6 7],
            (2, 3) => [0 1 4 5 6 7],
            (2, 4) => [0 1 3 5 6 7],
            (2, 5) => [0 1 3 4 6 7],
            (2, 6) => [0 1 3 4 5 7],
            (2, 7) => [0 1 3 4 5 6],
            (3, 0) => [1 2 4 5 6 7],
            (3, 1) => [0 2 4 5 6 7],
            (3, 2) => [0 1 4 5 6 7],
            (3, 4) => [0 1 2 5 6 7],
            (3, 5) => [0 1 2 4 6 7],
            (3, 6) => [0 1 2 4 5 7],
            (3, 7) => [0 1 2 4 5 6],
            (4, 0) => [1 2 3 5 6 7],
            (4, 1) => [0 2 3 5 6 7],
            (4, 2) => [0 1 3 5 6 7],
            (4, 3) => [0 1 2 5 6 7],
            (4, 5) => [0 1 2 3 6 7],
            (4, 6) => [0 1 2 3 5 7],
            (4, 7) => [0 1 2 3 5 6],
            (5, 0) => [1 2 3 4 6 7],
            (5, 1) => [0 2 3 4 6 7],
            (5, 2) => [0 1 3 4 6 7],
            (5, 3) => [0 1 2 4 6 7],
            (5, 4) => [0 1 2 3 6 7],
            (5, 6) => [0 1 2 3 4 7],
            (5, 7) => [0 1 2 3 4 6],
            (6, 0) => [1 2 3 4 5 7],
            (6, 1) => [0 2 3 4 5 7],
            (6, 2) => [0 1 3 4 5 7],
            (6, 3) => [0 1 2 4 5 7],
            (6, 4) => [0 1 2 3 5 7],
            (6, 5) => [0 1 2 3 4 7],
            (6, 7) => [0 1 2 3 4 5],
            (7, 0) => [1 2 3 4 5 6],
            (7, 1) => [0 2 3 4 5 6],
            (7, 2) => [0 1 3 4 5 6],
            (7, 3) => [0 1 2 4 5 6],
            (7, 4) => [0 1 2 3 5 6],
            (7, 5) => [0 1 2 3 4 6],
            (7, 6) => [0 1 2 3 4 5],
        )
    };
}

thread_local! {
    /// Set while an `AmxBackend` owns this thread's tile registers.
    static REGISTERS_CLAIMED: Cell<bool> = const { Cell::new(false) };
}

/// Tile backend running on the CPU's AMX unit.
///
/// Needs a [`TilePermission`] to construct. Tile state belongs to the
/// calling thread, so the backend is neither `Send` nor `Sync`, and only one
/// can exist per thread at a time.
pub struct AmxBackend {
    _permit: TilePermission,
    _thread_bound: PhantomData<*const ()>,
}

impl AmxBackend {
    /// Fails with `MissingCpuFeature` when the CPU has tiles but no AMX-INT8,
    /// and with `RegistersInUse` while another `AmxBackend` lives on this thread.
    pub fn new(permit: TilePermission) -> Result<Self, PermissionError> {
        if !cpuid::amx_features().int8 {
            return Err(PermissionError::MissingCpuFeature { feature: "amx-int8" });
        }
        if REGISTERS_CLAIMED.with(|claimed| claimed.replace(true)) {
            return Err(PermissionError::RegistersInUse);
        }
        Ok(Self {
            _permit: permit,
            _thread_bound: PhantomData,
        })
    }
}

impl Drop for AmxBackend {
    fn drop(&mut self) {
        self.release();
        REGISTERS_CLAIMED.with(|claimed| claimed.set(false));
    }
}

impl TileComputeBackend for AmxBackend {
    fn kind(&self) -> Backend {
        Backend::Amx
    }

    fn name(&self) -> &'static str {
        "amx"
    }

    unsafe fn load_config(&mut self, config: &TileConfiguration) {
        let record = config.as_bytes().as_ptr();
        unsafe {
            asm!(
                "ldtilecfg [{cfg}]",
                cfg = in(reg) record,
                options(nostack, readonly, preserves_flags),
            )
        }
    }

    unsafe fn load(&mut self, slot: TileSlot, src: &[u8], stride: usize) {
        trace!("tileloadd {slot}, stride {stride}");
        let base = src.as_ptr();
        each_tmm!(slot.index(), tileloadd!(base, stride))
    }

    unsafe fn zero(&mut self, slot: TileSlot) {
        trace!("tilezero {slot}");
        each_tmm!(slot.index(), tilezero!())
    }

    unsafe fn dot_product_accumulate(&mut self, dst: TileSlot, lhs: TileSlot, rhs: TileSlot) {
        trace!("tdpbssd {dst}, {lhs}, {rhs}");
        tdpbssd!(dst.index(), lhs.index(), rhs.index())
    }

    unsafe fn store(&mut self, slot: TileSlot, dst: &mut [u8], stride: usize) {
        trace!("tilestored {slot}, stride {stride}");
        let base = dst.as_mut_ptr();
        each_tmm!(slot.index(), tilestored!(base, stride))
    }

    fn release(&mut self) {
        // TILERELEASE is defined in every state once permission is granted,
        // which owning a TilePermission guarantees.
        unsafe { asm!("tilerelease", options(nostack, preserves_flags)) }
    }
}
