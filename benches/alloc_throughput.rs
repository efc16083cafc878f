use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use webproxy::heap::Heap;

const OPS: u64 = 10_000;

/// Segregated-list alloc/free throughput.
fn seg_alloc_free(heap: &mut Heap, size: usize) {
    for _ in 0..OPS {
        let ptr = heap.alloc(size).unwrap();
        black_box(ptr);
        unsafe { heap.free(ptr.as_ptr()) };
    }
}

/// System allocator alloc/free throughput.
fn system_alloc_free(size: usize) {
    let layout = std::alloc::Layout::from_size_align(size, 8).unwrap();
    for _ in 0..OPS {
        unsafe {
            let ptr = std::alloc::alloc(layout);
            black_box(ptr);
            std::alloc::dealloc(ptr, layout);
        }
    }
}

fn bench_alloc_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_throughput");

    for size in [16usize, 64, 256, 1024, 4096] {
        group.throughput(Throughput::Elements(OPS));

        group.bench_with_input(BenchmarkId::new("segregated", size), &size, |b, &size| {
            let mut heap = Heap::new().unwrap();
            b.iter(|| seg_alloc_free(&mut heap, size))
        });

        group.bench_with_input(BenchmarkId::new("system", size), &size, |b, &size| {
            b.iter(|| system_alloc_free(size))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_alloc_throughput);
criterion_main!(benches);
