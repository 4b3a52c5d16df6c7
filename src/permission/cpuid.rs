//! CPUID queries for AMX.
//!
//! `is_x86_feature_detected!` doesn't cover the AMX bits on stable, so the
//! leaves are read directly:
//! - leaf 7.0 EDX: bit 22 AMX-BF16, bit 24 AMX-TILE, bit 25 AMX-INT8
//! - leaf 0x1D: palette geometry
//! - leaf 0x1E: TMUL limits

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::{__cpuid_count, __get_cpuid_max};

/// Which AMX extensions the CPU reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmxFeatures {
    pub tile: bool,
    pub int8: bool,
    pub bf16: bool,
}

/// Geometry of one palette, from CPUID leaf 0x1D.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteInfo {
    pub total_tile_bytes: u16,
    pub bytes_per_tile: u16,
    pub bytes_per_row: u16,
    pub max_names: u16,
    pub max_rows: u16,
}

/// TMUL unit limits, from CPUID leaf 0x1E.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmulInfo {
    pub max_k: u8,
    pub max_n: u16,
}

#[cfg(target_arch = "x86_64")]
fn max_leaf() -> u32 {
    #[allow(unused_unsafe)]
    let (max, _) = unsafe { __get_cpuid_max(0) };
    max
}

pub fn amx_features() -> AmxFeatures {
    #[cfg(target_arch = "x86_64")]
    {
        if max_leaf() < 7 {
            return AmxFeatures::default();
        }
        #[allow(unused_unsafe)]
        let leaf = unsafe { __cpuid_count(7, 0) };
        AmxFeatures {
            bf16: leaf.edx & (1 << 22) != 0,
            tile: leaf.edx & (1 << 24) != 0,
            int8: leaf.edx & (1 << 25) != 0,
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        AmxFeatures::default()
    }
}

/// Geometry of `palette`, or `None` if the CPU has no such palette.
pub fn palette_info(palette: u32) -> Option<PaletteInfo> {
    #[cfg(target_arch = "x86_64")]
    {
        if !amx_features().tile || max_leaf() < 0x1D {
            return None;
        }
        #[allow(unused_unsafe)]
        let max_palette = unsafe { __cpuid_count(0x1D, 0) }.eax;
        if palette == 0 || palette > max_palette {
            return None;
        }
        #[allow(unused_unsafe)]
        let leaf = unsafe { __cpuid_count(0x1D, palette) };
        Some(PaletteInfo {
            total_tile_bytes: leaf.eax as u16,
            bytes_per_tile: (leaf.eax >> 16) as u16,
            bytes_per_row: leaf.ebx as u16,
            max_names: (leaf.ebx >> 16) as u16,
            max_rows: leaf.ecx as u16,
        })
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        let _ = palette;
        None
    }
}

pub fn tmul_info() -> Option<TmulInfo> {
    #[cfg(target_arch = "x86_64")]
    {
        if !amx_features().tile || max_leaf() < 0x1E {
            return None;
        }
        #[allow(unused_unsafe)]
        let leaf = unsafe { __cpuid_count(0x1E, 0) };
        Some(TmulInfo {
            max_k: leaf.ebx as u8,
            max_n: (leaf.ebx >> 8) as u16,
        })
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        None
    }
}
