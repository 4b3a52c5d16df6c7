//! AMX sanity check: one TDPBSSD on 16×64 tiles of twos.
//!
//! Exits with -1 when the kernel or CPU won't allow tile state.

use amxtile::config::{TileConfiguration, TileShape};
use amxtile::matrix::buffer::{fill_buffer, format_buffer};
use amxtile::permission::cpuid;
use amxtile::{Error, TilePermission, TilePipeline, request_tile_permission};
use log::error;

const ROWS: usize = 16;
const COLSB: usize = 64;
const STRIDE: usize = 64;

fn main() {
    env_logger::init();

    println!("=== AMX Tile Check ===\n");

    let features = cpuid::amx_features();
    println!(
        "CPU Features: AMX-TILE={}, AMX-INT8={}, AMX-BF16={}",
        features.tile, features.int8, features.bf16
    );
    if let Some(palette) = cpuid::palette_info(1) {
        println!(
            "Palette 1: {} names, {} rows × {} bytes per tile",
            palette.max_names, palette.max_rows, palette.bytes_per_row
        );
    }
    if let Some(tmul) = cpuid::tmul_info() {
        println!("TMUL: max K {}, max N {}", tmul.max_k, tmul.max_n);
    }
    println!();

    let permit = match request_tile_permission() {
        Ok(permit) => {
            println!("TILE DATA USE SET - OK\n");
            permit
        }
        Err(err) => {
            error!("{err}");
            println!("Fail to do XFEATURE_XTILEDATA: {err}");
            std::process::exit(-1);
        }
    };

    if let Err(err) = run(permit) {
        error!("{err}");
        std::process::exit(-1);
    }
}

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
fn run(_permit: TilePermission) -> Result<(), Error> {
    Err(amxtile::PermissionError::UnsupportedPlatform.into())
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn run(permit: TilePermission) -> Result<(), Error> {
    // tmm0 is configured but unused. tmm1 accumulates 16×16 i32, tmm2 and
    // tmm3 hold the byte operands.
    let config = TileConfiguration::new(&[
        TileShape::accumulator(ROWS as u8, 4),
        TileShape::accumulator(ROWS as u8, (COLSB / 4) as u16),
        TileShape::operand(ROWS as u8, COLSB as u16),
        TileShape::operand(ROWS as u8, COLSB as u16),
    ])?;

    let mut src1 = vec![0i8; ROWS * COLSB];
    let mut src2 = vec![0i8; ROWS * COLSB];
    let mut res = vec![0i32; ROWS * COLSB / 4];

    fill_buffer(&mut src1, 2);
    fill_buffer(&mut src2, 2);
    println!("{}", format_buffer(&src1, ROWS, COLSB));
    println!("{}", format_buffer(&src2, ROWS, COLSB));

    fill_buffer(&mut res, 0);

    let mut tiles = TilePipeline::hardware(permit)?;
    tiles.apply(&config)?;
    tiles.load(1, &res, STRIDE)?;
    tiles.load(2, &src1, STRIDE)?;
    tiles.load(3, &src2, STRIDE)?;
    tiles.multiply_accumulate(1, 2, 3)?;
    tiles.store(1, &mut res, STRIDE)?;
    tiles.release();

    println!("AMX:");
    println!("{}", format_buffer(&res, ROWS, COLSB / 4));
    Ok(())
}
