//! Host-side helpers around the tile pipeline.
//!
//! Scalar baselines for checking the tile unit, the VNNI repacking that
//! turns a tile multiply into a normal matmul, and buffer utilities used by
//! the demo binary.

pub mod buffer;
pub mod reference;
pub mod vnni;
