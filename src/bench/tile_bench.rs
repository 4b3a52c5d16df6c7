use amxtile::config::{TileConfiguration, TileShape};
use amxtile::matrix::reference::dpbssd_reference;
use amxtile::{TileComputeBackend, TilePipeline};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

const M: usize = 16;
const N: usize = 16;
const K: usize = 64;

fn config() -> TileConfiguration {
    TileConfiguration::new(&[
        TileShape::accumulator(M as u8, N as u16),
        TileShape::operand(M as u8, K as u16),
        TileShape::new((K / 4) as u8, (N * 4) as u16),
    ])
    .unwrap()
}

fn run_tiles<B: TileComputeBackend>(tiles: &mut TilePipeline<B>, a: &[i8], b: &[i8], c: &mut [i32]) {
    tiles.load(0, &c[..], N * 4).unwrap();
    tiles.load(1, a, K).unwrap();
    tiles.load(2, b, N * 4).unwrap();
    tiles.multiply_accumulate(0, 1, 2).unwrap();
    tiles.store(0, c, N * 4).unwrap();
}

fn bench_tdpbssd(crit: &mut Criterion) {
    let a: Vec<i8> = (0..M * K).map(|i| (i % 7) as i8 - 3).collect();
    let b: Vec<i8> = (0..K * N).map(|i| (i % 5) as i8 - 2).collect();
    let config = config();

    let mut group = crit.benchmark_group("tdpbssd_16x16x64");

    group.bench_function("reference", |bench| {
        let mut c = vec![0i32; M * N];
        bench.iter(|| {
            c.fill(0);
            dpbssd_reference(black_box(&mut c), black_box(&a), black_box(&b), M, N, K);
        })
    });

    group.bench_function("software", |bench| {
        let mut tiles = TilePipeline::emulated();
        tiles.apply(&config).unwrap();
        let mut c = vec![0i32; M * N];
        bench.iter(|| {
            c.fill(0);
            run_tiles(&mut tiles, black_box(&a), black_box(&b), black_box(&mut c));
        })
    });

    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    if let Ok(mut tiles) = amxtile::request_tile_permission().and_then(TilePipeline::hardware) {
        tiles.apply(&config).unwrap();
        group.bench_function("amx", |bench| {
            let mut c = vec![0i32; M * N];
            bench.iter(|| {
                c.fill(0);
                run_tiles(&mut tiles, black_box(&a), black_box(&b), black_box(&mut c));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tdpbssd);
criterion_main!(benches);
