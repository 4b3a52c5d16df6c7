mod common;

use amxtile::config::{TileConfiguration, TileShape, TileSlot, build_configuration};
use amxtile::matrix::buffer::{fill_buffer, format_buffer};
use amxtile::matrix::reference::{dpbssd_reference, matmul_i8_reference};
use amxtile::matrix::vnni::pack_vnni;
use amxtile::{Error, PreconditionViolation, TilePipeline, TileState, multiply_i8};
use common::{run_dot_product, run_scenario, scenario_config, signed_pattern};

// ============================================================
// Load / store
// ============================================================

#[test]
fn test_load_store_round_trip() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();

    let src = signed_pattern(16 * 64, 251, 125);
    let mut out = vec![0i8; 16 * 64];

    tiles.load(2, &src, 64).unwrap();
    tiles.store(2, &mut out, 64).unwrap();

    assert_eq!(src, out);
}

#[test]
fn test_round_trip_with_wide_stride() {
    let config = build_configuration(&[(4, 8)]).unwrap();
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&config).unwrap();

    // 4 rows of 8 bytes, 16 bytes apart
    let src: Vec<u8> = (0..3 * 16 + 8).map(|i| i as u8).collect();
    let mut out = vec![0xAAu8; src.len()];

    tiles.load(0, &src, 16).unwrap();
    tiles.store(0, &mut out, 16).unwrap();

    for row in 0..4 {
        assert_eq!(&out[row * 16..row * 16 + 8], &src[row * 16..row * 16 + 8]);
        if row < 3 {
            // bytes between rows are left alone
            assert!(out[row * 16 + 8..row * 16 + 16].iter().all(|&b| b == 0xAA));
        }
    }
}

#[test]
fn test_load_zeroes_outside_configured_area() {
    let config = build_configuration(&[(2, 8)]).unwrap();
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&config).unwrap();

    tiles.load(0, &[0x7fu8; 16], 8).unwrap();

    let tile = tiles.backend().tile(TileSlot::new(0).unwrap());
    assert!(tile[..8].iter().all(|&b| b == 0x7f));
    assert!(tile[8..64].iter().all(|&b| b == 0));
    assert!(tile[64..72].iter().all(|&b| b == 0x7f));
    assert!(tile[72..].iter().all(|&b| b == 0));
}

#[test]
fn test_zero_clears_tile() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();

    let mut acc = vec![9i32; 16 * 16];
    tiles.load(1, &acc, 64).unwrap();
    tiles.zero(1).unwrap();
    tiles.store(1, &mut acc, 64).unwrap();

    assert!(acc.iter().all(|&x| x == 0));
}

// ============================================================
// Dot-product accumulate
// ============================================================

#[test]
fn test_uniform_twos_give_256() {
    let mut tiles = TilePipeline::emulated();
    let res = run_scenario(&mut tiles, 2);

    assert_eq!(res.len(), 256);
    for (i, &x) in res.iter().enumerate() {
        assert_eq!(x, 2 * 2 * 64, "element {}", i);
    }
}

#[test]
fn test_accumulates_not_overwrites() {
    let lhs = vec![2i8; 16 * 64];
    let rhs = vec![2i8; 16 * 64];
    let mut acc = vec![5i32; 16 * 16];

    let mut tiles = TilePipeline::emulated();
    run_dot_product(&mut tiles, &lhs, &rhs, &mut acc);
    assert!(acc.iter().all(|&x| x == 261), "should accumulate into 5");

    run_dot_product(&mut tiles, &lhs, &rhs, &mut acc);
    assert!(acc.iter().all(|&x| x == 517));
}

#[test]
fn test_signed_values() {
    let lhs = vec![-3i8; 16 * 64];
    let rhs = vec![7i8; 16 * 64];
    let mut acc = vec![0i32; 16 * 16];

    run_dot_product(&mut TilePipeline::emulated(), &lhs, &rhs, &mut acc);
    assert!(acc.iter().all(|&x| x == -3 * 7 * 64));

    let lhs = vec![i8::MIN; 16 * 64];
    let rhs = vec![i8::MIN; 16 * 64];
    let mut acc = vec![0i32; 16 * 16];

    run_dot_product(&mut TilePipeline::emulated(), &lhs, &rhs, &mut acc);
    assert!(acc.iter().all(|&x| x == 128 * 128 * 64));
}

#[test]
fn test_matches_scalar_reference() {
    let lhs = signed_pattern(16 * 64, 7, 3);
    let rhs = signed_pattern(16 * 64, 5, 2);
    let start: Vec<i32> = (0..256).map(|i| i - 100).collect();

    let mut expected = start.clone();
    dpbssd_reference(&mut expected, &lhs, &rhs, 16, 16, 64);

    let mut actual = start;
    run_dot_product(&mut TilePipeline::emulated(), &lhs, &rhs, &mut actual);

    assert_eq!(expected, actual);
}

#[test]
fn test_small_tile_shapes() {
    // M=3, K=8, N=2
    let config = TileConfiguration::new(&[
        TileShape::accumulator(3, 2),
        TileShape::operand(3, 8),
        TileShape::new(2, 8),
    ])
    .unwrap();

    let lhs = signed_pattern(3 * 8, 9, 4);
    let rhs = signed_pattern(2 * 8, 11, 5);
    let mut expected = vec![1i32; 3 * 2];
    dpbssd_reference(&mut expected, &lhs, &rhs, 3, 2, 8);

    let mut tiles = TilePipeline::emulated();
    let mut acc = vec![1i32; 3 * 2];
    tiles.apply(&config).unwrap();
    tiles.load(0, &acc, 8).unwrap();
    tiles.load(1, &lhs, 8).unwrap();
    tiles.load(2, &rhs, 8).unwrap();
    tiles.multiply_accumulate(0, 1, 2).unwrap();
    tiles.store(0, &mut acc, 8).unwrap();

    assert_eq!(expected, acc);
}

// ============================================================
// Lifecycle
// ============================================================

#[test]
fn test_ops_before_apply_are_rejected() {
    let mut tiles = TilePipeline::emulated();
    let mut buf = vec![0i8; 1024];

    assert_eq!(tiles.state(), TileState::Idle);
    assert_eq!(
        tiles.load(0, &buf, 64),
        Err(PreconditionViolation::NotConfigured { operation: "load" })
    );
    assert_eq!(
        tiles.multiply_accumulate(0, 1, 2),
        Err(PreconditionViolation::NotConfigured { operation: "multiply_accumulate" })
    );
    assert_eq!(
        tiles.store(0, &mut buf, 64),
        Err(PreconditionViolation::NotConfigured { operation: "store" })
    );
    assert_eq!(
        tiles.zero(0),
        Err(PreconditionViolation::NotConfigured { operation: "zero" })
    );
}

#[test]
fn test_ops_after_release_are_rejected() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();
    tiles.release();

    assert_eq!(tiles.state(), TileState::Released);
    assert!(tiles.configuration().is_none());
    assert_eq!(
        tiles.load(2, &[0i8; 1024], 64),
        Err(PreconditionViolation::NotConfigured { operation: "load" })
    );
}

#[test]
fn test_release_twice() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();
    tiles.load(2, &[1i8; 1024], 64).unwrap();

    tiles.release();
    let after_one = *tiles.backend().tile(TileSlot::new(2).unwrap());
    tiles.release();

    assert_eq!(tiles.state(), TileState::Released);
    assert!(!tiles.backend().is_configured());
    assert_eq!(&after_one, tiles.backend().tile(TileSlot::new(2).unwrap()));
    assert!(after_one.iter().all(|&b| b == 0));
}

#[test]
fn test_release_without_apply() {
    let mut tiles = TilePipeline::emulated();
    tiles.release();
    assert_eq!(tiles.state(), TileState::Released);
}

#[test]
fn test_reconfigure_needs_release() {
    let first = build_configuration(&[(16, 64)]).unwrap();
    let second = build_configuration(&[(8, 32)]).unwrap();

    let mut tiles = TilePipeline::emulated();
    tiles.apply(&first).unwrap();

    // same geometry again is fine
    tiles.apply(&first).unwrap();

    assert_eq!(
        tiles.apply(&second),
        Err(PreconditionViolation::ReconfigureWithoutRelease)
    );
    assert_eq!(tiles.configuration(), Some(&first));

    tiles.release();
    tiles.apply(&second).unwrap();
    assert_eq!(tiles.configuration(), Some(&second));
}

#[test]
fn test_reapply_clears_tiles() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();
    tiles.load(2, &[3i8; 1024], 64).unwrap();

    tiles.apply(&scenario_config()).unwrap();

    let mut out = vec![1i8; 1024];
    tiles.store(2, &mut out, 64).unwrap();
    assert!(out.iter().all(|&b| b == 0));
}

// ============================================================
// Precondition checks
// ============================================================

#[test]
fn test_slot_errors() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&build_configuration(&[(16, 64)]).unwrap()).unwrap();

    assert_eq!(
        tiles.load(8, &[0i8; 1024], 64),
        Err(PreconditionViolation::SlotOutOfRange { slot: 8 })
    );
    assert_eq!(
        tiles.load(5, &[0i8; 1024], 64),
        Err(PreconditionViolation::SlotNotConfigured { slot: 5 })
    );
}

#[test]
fn test_buffer_too_small() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();

    assert_eq!(
        tiles.load(2, &[0i8; 1023], 64),
        Err(PreconditionViolation::BufferTooSmall { slot: 2, required: 1024, actual: 1023 })
    );

    // i32 buffers are measured in bytes: 255 elements = 1020 bytes
    let mut acc = vec![0i32; 255];
    assert_eq!(
        tiles.store(1, &mut acc, 64),
        Err(PreconditionViolation::BufferTooSmall { slot: 1, required: 1024, actual: 1020 })
    );

    // stride wider than the buffer allows
    assert_eq!(
        tiles.load(2, &[0i8; 1024], 128),
        Err(PreconditionViolation::BufferTooSmall { slot: 2, required: 15 * 128 + 64, actual: 1024 })
    );
}

#[test]
fn test_duplicate_operands() {
    let mut tiles = TilePipeline::emulated();
    tiles.apply(&scenario_config()).unwrap();

    assert_eq!(
        tiles.multiply_accumulate(1, 2, 2),
        Err(PreconditionViolation::DuplicateOperand { slot: 2 })
    );
    assert_eq!(
        tiles.multiply_accumulate(1, 1, 3),
        Err(PreconditionViolation::DuplicateOperand { slot: 1 })
    );
    assert_eq!(
        tiles.multiply_accumulate(3, 2, 3),
        Err(PreconditionViolation::DuplicateOperand { slot: 3 })
    );
}

#[test]
fn test_geometry_mismatches() {
    let config = TileConfiguration::new(&[
        TileShape::accumulator(16, 16), // 0: 16 x 64
        TileShape::operand(8, 64),      // 1: wrong rows
        TileShape::new(16, 64),         // 2: good rhs
        TileShape::operand(16, 32),     // 3: K=32 needs 8 rhs rows
        TileShape::new(16, 32),         // 4: N=8, doesn't match dst
        TileShape::new(16, 62),         // 5: not whole i32 lanes
        TileShape::operand(16, 64),     // 6: good lhs
    ])
    .unwrap();

    let mut tiles = TilePipeline::emulated();
    tiles.apply(&config).unwrap();

    assert_eq!(
        tiles.multiply_accumulate(0, 1, 2),
        Err(PreconditionViolation::RowMismatch { dst_rows: 16, lhs_rows: 8 })
    );
    assert_eq!(
        tiles.multiply_accumulate(0, 3, 2),
        Err(PreconditionViolation::ContractionMismatch { lhs_colsb: 32, rhs_rows: 16 })
    );
    assert_eq!(
        tiles.multiply_accumulate(0, 6, 4),
        Err(PreconditionViolation::ColumnMismatch { dst_colsb: 64, rhs_colsb: 32 })
    );
    assert_eq!(
        tiles.multiply_accumulate(5, 6, 2),
        Err(PreconditionViolation::ElementWidth { slot: 5, colsb: 62 })
    );

    // the good combination still works
    tiles.multiply_accumulate(0, 6, 2).unwrap();
}

#[test]
fn test_narrow_rhs_tile_is_rejected() {
    // slot 3 at 16 bytes gives N=4 against a 16-column accumulator
    let config = build_configuration(&[(16, 16), (16, 64), (16, 64), (16, 16)]).unwrap();

    let mut tiles = TilePipeline::emulated();
    tiles.apply(&config).unwrap();

    assert_eq!(
        tiles.multiply_accumulate(1, 2, 3),
        Err(PreconditionViolation::ColumnMismatch { dst_colsb: 64, rhs_colsb: 16 })
    );
    assert_eq!(tiles.state(), TileState::Configured);
}

// ============================================================
// multiply_i8 and helpers
// ============================================================

#[test]
fn test_multiply_i8_matches_plain_matmul() {
    let shapes = [(16, 16, 64), (1, 1, 4), (3, 5, 8), (16, 4, 12), (7, 16, 64)];

    for (m, n, k) in shapes {
        let a = signed_pattern(m * k, 13, 6);
        let b = signed_pattern(k * n, 11, 5);

        let mut expected = vec![3i32; m * n];
        let mut actual = vec![3i32; m * n];

        matmul_i8_reference(&a, &b, &mut expected, m, n, k);
        multiply_i8(&a, &b, &mut actual, m, n, k).unwrap();

        assert_eq!(expected, actual, "{}x{}x{}", m, n, k);
    }
}

#[test]
fn test_multiply_i8_rejects_large_problems() {
    let a = vec![0i8; 17 * 4];
    let b = vec![0i8; 4];
    let mut c = vec![0i32; 17];

    let err = multiply_i8(&a, &b, &mut c, 17, 1, 4).unwrap_err();
    assert!(matches!(
        err,
        Error::Precondition(PreconditionViolation::UnsupportedProblem { m: 17, n: 1, k: 4 })
    ));

    let a = vec![0i8; 6];
    let b = vec![0i8; 6];
    let mut c = vec![0i32; 1];
    assert!(multiply_i8(&a, &b, &mut c, 1, 1, 6).is_err());
}

#[test]
fn test_pack_vnni_layout() {
    // K=8, N=2: packed row r holds B[4r..4r+4][j] for each column j
    let b: Vec<i8> = (0..16).collect();
    let packed = pack_vnni(&b, 8, 2);

    assert_eq!(packed, vec![0, 2, 4, 6, 1, 3, 5, 7, 8, 10, 12, 14, 9, 11, 13, 15]);
}

#[test]
fn test_buffer_helpers() {
    let mut buf = vec![0i32; 6];
    fill_buffer(&mut buf, 4);
    assert_eq!(buf, vec![4; 6]);

    buf[5] = -1;
    assert_eq!(format_buffer(&buf, 2, 3), "4 4 4 \n4 4 -1 \n");
    assert_eq!(format_buffer(&buf, 1, 3), "4 4 4 \n");
}
