#![allow(dead_code)]

use amxtile::config::{TileConfiguration, TileShape};
use amxtile::{TileComputeBackend, TilePipeline};

pub const ROWS: usize = 16;
pub const COLSB: usize = 64;
pub const STRIDE: usize = 64;

/// Slot 0 unused-but-configured, slot 1 the 16×16 i32 accumulator, slots 2
/// and 3 the 16×64 byte operands.
pub fn scenario_config() -> TileConfiguration {
    TileConfiguration::new(&[
        TileShape::new(16, 16),
        TileShape::accumulator(16, 16),
        TileShape::operand(16, 64),
        TileShape::operand(16, 64),
    ])
    .unwrap()
}

/// Load → compute → store → release on uniform inputs, returns the result.
pub fn run_scenario<B: TileComputeBackend>(tiles: &mut TilePipeline<B>, value: i8) -> Vec<i32> {
    let src1 = vec![value; ROWS * COLSB];
    let src2 = vec![value; ROWS * COLSB];
    let mut res = vec![0i32; ROWS * COLSB / 4];

    tiles.apply(&scenario_config()).unwrap();
    tiles.load(1, &res, STRIDE).unwrap();
    tiles.load(2, &src1, STRIDE).unwrap();
    tiles.load(3, &src2, STRIDE).unwrap();
    tiles.multiply_accumulate(1, 2, 3).unwrap();
    tiles.store(1, &mut res, STRIDE).unwrap();
    tiles.release();

    res
}

/// One TDPBSSD with tmm0 += tmm1 · tmm2 on arbitrary data.
pub fn run_dot_product<B: TileComputeBackend>(
    tiles: &mut TilePipeline<B>,
    lhs: &[i8],
    rhs_packed: &[i8],
    acc: &mut [i32],
) {
    let config = TileConfiguration::new(&[
        TileShape::accumulator(16, 16),
        TileShape::operand(16, 64),
        TileShape::new(16, 64),
    ])
    .unwrap();

    tiles.apply(&config).unwrap();
    tiles.load(0, &acc[..], 64).unwrap();
    tiles.load(1, lhs, 64).unwrap();
    tiles.load(2, rhs_packed, 64).unwrap();
    tiles.multiply_accumulate(0, 1, 2).unwrap();
    tiles.store(0, acc, 64).unwrap();
    tiles.release();
}

pub fn signed_pattern(len: usize, modulus: usize, offset: i8) -> Vec<i8> {
    (0..len).map(|i| ((i % modulus) as i8).wrapping_sub(offset)).collect()
}
