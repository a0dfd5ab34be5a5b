// PAL scheduling throughput benchmarks: how fast the timeline arena can
// absorb back-to-back NAND operations across varying channel counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ssd_sim::geometry::{Geometry, PageAllocation, SuperblockMask};
use ssd_sim::latency::{LatencyTable, NandType};
use ssd_sim::pal::Pal;

fn make_pal(channels: u32) -> Pal {
    let geometry = Geometry {
        channel: channels,
        package: 1,
        die: 4,
        plane: 1,
        block: 256,
        page: 256,
        page_size: 4096,
        lba_size: 512,
        io_unit_size: 4096,
        over_provisioning_ratio: 0.0,
    };
    let latency = LatencyTable::new(NandType::Tlc, 400, 4096);
    Pal::new(
        geometry,
        latency,
        PageAllocation::parse("CWDP").unwrap(),
        SuperblockMask::default(),
        false,
    )
}

fn bench_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("pal_submit");

    for channels in [1u32, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("channels", channels),
            &channels,
            |b, &channels| {
                let mut pal = make_pal(channels);
                let mut tick = 0u64;
                b.iter(|| {
                    let block = black_box(tick % 256);
                    let page = black_box((tick % 256) as u32);
                    tick += 1;
                    pal.submit(ssd_sim::latency::NandOp::Write, block, page, tick)
                });
            },
        );
    }
    group.finish();
}

fn bench_flush(c: &mut Criterion) {
    c.bench_function("pal_flush_after_backlog", |b| {
        b.iter_batched(
            || {
                let mut pal = make_pal(4);
                for tick in 0..1000u64 {
                    pal.submit(ssd_sim::latency::NandOp::Read, tick % 256, 0, tick);
                }
                pal
            },
            |mut pal| pal.flush(black_box(2000)),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_submit, bench_flush);
criterion_main!(benches);
