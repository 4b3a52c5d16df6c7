//! The permission gate.
//!
//! Linux keeps the 8 KiB XTILEDATA state out of every thread's signal frame
//! until a process asks for it with `arch_prctl(ARCH_REQ_XCOMP_PERM)`. Any
//! tile instruction before that raises #UD. The request is made once and the
//! outcome is cached, so calling [`request_tile_permission`] again is free.
//!
//! A successful request yields a [`TilePermission`]. The hardware backend
//! can only be built from one, so code that has not been through the gate
//! cannot reach `LDTILECFG`.

pub mod cpuid;

use std::sync::OnceLock;

use log::{info, warn};

use crate::error::PermissionError;

static OUTCOME: OnceLock<Result<(), PermissionError>> = OnceLock::new();

/// Proof that the kernel granted XTILEDATA to this process.
///
/// Zero-sized and `Copy`. The grant is process-wide and lasts until exit.
#[derive(Debug, Clone, Copy)]
pub struct TilePermission {
    _granted: (),
}

/// Asks the kernel for extended tile state.
///
/// Fails if the platform isn't Linux x86_64, if CPUID has no AMX-TILE, or if
/// `arch_prctl` returns an error. Only the first call does any work.
pub fn request_tile_permission() -> Result<TilePermission, PermissionError> {
    OUTCOME
        .get_or_init(request_once)
        .clone()
        .map(|()| TilePermission { _granted: () })
}

/// Whether the kernel currently lists XTILECFG and XTILEDATA as permitted.
///
/// Reads the mask with `ARCH_GET_XCOMP_PERM` and does not request anything.
pub fn tile_permission_granted() -> bool {
    sys::permitted_features()
        .map(|mask| {
            let wanted = (1u64 << sys::XFEATURE_XTILECFG) | (1u64 << sys::XFEATURE_XTILEDATA);
            mask & wanted == wanted
        })
        .unwrap_or(false)
}

fn request_once() -> Result<(), PermissionError> {
    if !sys::SUPPORTED {
        warn!("AMX permission requested on an unsupported platform");
        return Err(PermissionError::UnsupportedPlatform);
    }

    if !cpuid::amx_features().tile {
        warn!("CPUID reports no AMX-TILE");
        return Err(PermissionError::MissingCpuFeature { feature: "amx-tile" });
    }

    match sys::request_xtiledata() {
        Ok(()) => {
            info!("XTILEDATA permission granted");
            Ok(())
        }
        Err(err) => {
            warn!("XTILEDATA permission refused: {err}");
            Err(err)
        }
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod sys {
    use crate::error::PermissionError;

    pub(super) const SUPPORTED: bool = true;

    const ARCH_GET_XCOMP_PERM: libc::c_long = 0x1022;
    const ARCH_REQ_XCOMP_PERM: libc::c_long = 0x1023;
    pub(super) const XFEATURE_XTILECFG: u32 = 17;
    pub(super) const XFEATURE_XTILEDATA: u32 = 18;

    pub(super) fn request_xtiledata() -> Result<(), PermissionError> {
        let ret = unsafe {
            libc::syscall(
                libc::SYS_arch_prctl,
                ARCH_REQ_XCOMP_PERM,
                XFEATURE_XTILEDATA as libc::c_ulong,
            )
        };
        if ret == 0 {
            Ok(())
        } else {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            Err(PermissionError::Denied { errno })
        }
    }

    pub(super) fn permitted_features() -> Option<u64> {
        let mut mask: u64 = 0;
        let ret = unsafe {
            libc::syscall(
                libc::SYS_arch_prctl,
                ARCH_GET_XCOMP_PERM,
                &mut mask as *mut u64,
            )
        };
        (ret == 0).then_some(mask)
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
mod sys {
    use crate::error::PermissionError;

    pub(super) const SUPPORTED: bool = false;

    pub(super) const XFEATURE_XTILECFG: u32 = 17;
    pub(super) const XFEATURE_XTILEDATA: u32 = 18;

    pub(super) fn request_xtiledata() -> Result<(), PermissionError> {
        Err(PermissionError::UnsupportedPlatform)
    }

    pub(super) fn permitted_features() -> Option<u64> {
        None
    }
}
