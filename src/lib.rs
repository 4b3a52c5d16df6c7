//! Intel AMX tiles from Rust, without nightly intrinsics.
//!
//! I wanted to see what it actually takes to run one AMX instruction. Turns
//! out it's a handshake with the kernel, a 64-byte config record with very
//! exact rules, and a strict load → compute → store → release order. This
//! crate wraps all of that and checks every rule before the CPU sees it.
//!
//! ## Usage
//!
//! ```
//! use amxtile::config::{TileConfiguration, TileShape};
//! use amxtile::pipeline::TilePipeline;
//!
//! let config = TileConfiguration::new(&[
//!     TileShape::accumulator(16, 16), // tmm0: 16×16 i32
//!     TileShape::operand(16, 64),     // tmm1: 16×64 i8
//!     TileShape::new(16, 64),         // tmm2: 16 rows of 16 packed i8 quads
//! ])
//! .unwrap();
//!
//! let a = vec![2i8; 16 * 64];
//! let b = vec![2i8; 16 * 64];
//! let mut c = vec![0i32; 16 * 16];
//!
//! let mut tiles = TilePipeline::emulated();
//! tiles.apply(&config).unwrap();
//! tiles.zero(0).unwrap();
//! tiles.load(1, &a, 64).unwrap();
//! tiles.load(2, &b, 64).unwrap();
//! tiles.multiply_accumulate(0, 1, 2).unwrap();
//! tiles.store(0, &mut c, 64).unwrap();
//! tiles.release();
//!
//! assert!(c.iter().all(|&x| x == 256));
//! ```
//!
//! On real hardware, get a [`TilePermission`](permission::TilePermission)
//! from [`request_tile_permission`] and build the pipeline with
//! `TilePipeline::hardware(permit)` instead.
//!
//! ## What's inside
//!
//! - Permission gate (`arch_prctl(ARCH_REQ_XCOMP_PERM)`) plus CPUID detection
//! - Bit-exact tile configuration record
//! - AMX backend via inline assembly, and a software model of it
//! - A pipeline that validates state, geometry and buffers

pub mod backend;
pub mod config;
pub mod error;
pub mod matrix;
pub mod permission;
pub mod pipeline;

pub use backend::{Backend, SoftwareBackend, TileComputeBackend};
pub use config::{TileConfiguration, TileShape, TileSlot, build_configuration};
pub use error::{Error, PermissionError, PreconditionViolation, Result};
pub use permission::{TilePermission, request_tile_permission};
pub use pipeline::{TilePipeline, TileState};

use config::{MAX_COLSB, MAX_ROWS};
use log::debug;

/// Single-tile multiply: C += A × B, with i8 inputs and i32 output.
///
/// Runs on the AMX unit when the kernel grants permission and the CPU has
/// AMX-INT8, otherwise on the software model. Returns which one ran.
/// Matrices are row-major: A is m×k, B is k×n, C is m×n. Needs
/// m ≤ 16, n ≤ 16, k ≤ 64 and k a multiple of 4.
///
/// # Panics
///
/// Panics if the slice sizes don't match m, n, k.
pub fn multiply_i8(a: &[i8], b: &[i8], c: &mut [i32], m: usize, n: usize, k: usize) -> Result<Backend> {
    assert_eq!(a.len(), m * k, "A: expected {}x{}={} elements", m, k, m * k);
    assert_eq!(b.len(), k * n, "B: expected {}x{}={} elements", k, n, k * n);
    assert_eq!(c.len(), m * n, "C: expected {}x{}={} elements", m, n, m * n);

    let fits = (1..=MAX_ROWS as usize).contains(&m)
        && (1..=MAX_COLSB as usize / 4).contains(&n)
        && (1..=MAX_COLSB as usize).contains(&k)
        && k % 4 == 0;
    if !fits {
        return Err(PreconditionViolation::UnsupportedProblem { m, n, k }.into());
    }

    let config = TileConfiguration::new(&[
        TileShape::accumulator(m as u8, n as u16),
        TileShape::operand(m as u8, k as u16),
        TileShape::new((k / 4) as u8, (n * 4) as u16),
    ])?;
    let b_packed = matrix::vnni::pack_vnni(b, k, n);

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    {
        let hardware = request_tile_permission().and_then(TilePipeline::hardware);
        match hardware {
            Ok(mut tiles) => {
                run_single_tile(&mut tiles, &config, a, &b_packed, c, n, k)?;
                return Ok(Backend::Amx);
            }
            Err(err) => debug!("AMX unavailable, using software tiles: {err}"),
        }
    }
    #[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
    debug!("AMX unavailable on this platform, using software tiles");

    let mut tiles = TilePipeline::emulated();
    run_single_tile(&mut tiles, &config, a, &b_packed, c, n, k)?;
    Ok(Backend::Software)
}

fn run_single_tile<B: TileComputeBackend>(
    tiles: &mut TilePipeline<B>,
    config: &TileConfiguration,
    a: &[i8],
    b_packed: &[i8],
    c: &mut [i32],
    n: usize,
    k: usize,
) -> Result<(), PreconditionViolation> {
    let c_stride = n * 4;

    tiles.apply(config)?;
    tiles.load(0, &c[..], c_stride)?;
    tiles.load(1, a, k)?;
    tiles.load(2, b_packed, c_stride)?;
    tiles.multiply_accumulate(0, 1, 2)?;
    tiles.store(0, c, c_stride)?;
    tiles.release();
    Ok(())
}
