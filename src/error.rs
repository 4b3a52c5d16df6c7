//! Error types for the permission gate and the tile pipeline.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Anything the crate can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),
}

/// The OS or the CPU won't let us use tile registers.
///
/// Not retryable. Either the machine has no AMX or the kernel refuses it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// Tile state can only be requested on Linux x86_64.
    #[error("AMX tile permission is only available on Linux x86_64")]
    UnsupportedPlatform,

    /// CPUID does not report the feature.
    #[error("CPU does not support {feature}")]
    MissingCpuFeature { feature: &'static str },

    /// `arch_prctl(ARCH_REQ_XCOMP_PERM)` failed.
    #[error("kernel denied XTILEDATA permission: {}", os_error(.errno))]
    Denied { errno: i32 },

    /// Another hardware pipeline already owns this thread's tile registers.
    #[error("this thread's tile registers are already owned by another AMX backend")]
    RegistersInUse,
}

fn os_error(errno: &i32) -> std::io::Error {
    std::io::Error::from_raw_os_error(*errno)
}

/// A tile operation was asked for something the hardware would fault on.
///
/// These are programming errors. They are caught before any instruction is
/// issued so the process never sees a #GP or #UD.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionViolation {
    #[error("tile slot {slot} is out of range, valid slots are 0..8")]
    SlotOutOfRange { slot: u8 },

    #[error("{count} tile shapes given but palette 1 only has 8 slots")]
    TooManySlots { count: usize },

    #[error("palette {palette} is not supported, only palette 1 is")]
    UnsupportedPalette { palette: u8 },

    #[error("slot {slot}: {rows} rows is outside 1..=16")]
    InvalidRows { slot: u8, rows: u8 },

    #[error("slot {slot}: {colsb} column bytes is outside 1..=64")]
    InvalidColumnBytes { slot: u8, colsb: u16 },

    #[error("slot {slot}: rows ({rows}) and colsb ({colsb}) must both be zero or both non-zero")]
    HalfConfiguredSlot { slot: u8, rows: u8, colsb: u16 },

    #[error("start row {start_row} must be zero for a fresh configuration")]
    NonZeroStartRow { start_row: u8 },

    #[error("reserved byte at offset {offset} is {value:#04x}, must be zero")]
    NonZeroReserved { offset: usize, value: u8 },

    #[error("{operation} needs an applied tile configuration")]
    NotConfigured { operation: &'static str },

    #[error("a different configuration is active, release before applying a new one")]
    ReconfigureWithoutRelease,

    #[error("slot {slot} has no geometry in the active configuration")]
    SlotNotConfigured { slot: u8 },

    #[error("slot {slot}: buffer holds {actual} bytes but {required} are needed")]
    BufferTooSmall { slot: u8, required: usize, actual: usize },

    #[error("slot {slot} is used as more than one operand")]
    DuplicateOperand { slot: u8 },

    #[error("slot {slot}: {colsb} column bytes is not a whole number of 4-byte groups")]
    ElementWidth { slot: u8, colsb: u16 },

    #[error("dst has {dst_rows} rows but lhs has {lhs_rows}")]
    RowMismatch { dst_rows: u8, lhs_rows: u8 },

    #[error("lhs has {lhs_colsb} column bytes so rhs needs {} rows, it has {rhs_rows}", .lhs_colsb / 4)]
    ContractionMismatch { lhs_colsb: u16, rhs_rows: u8 },

    #[error("dst has {dst_colsb} column bytes but rhs has {rhs_colsb}")]
    ColumnMismatch { dst_colsb: u16, rhs_colsb: u16 },

    #[error("single-tile multiply needs m <= 16, n <= 16, k <= 64 and k % 4 == 0, got {m}x{n}x{k}")]
    UnsupportedProblem { m: usize, n: usize, k: usize },
}
