// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vesta_core::renderer::api::HeapType;
use vesta_data::allocators::HeapAllocator;
use vesta_data::buffers::ResourceBuffer;

fn bench_reservations(c: &mut Criterion) {
    let mut group = c.benchmark_group("Heap Placement");

    group.bench_function("10k mixed-alignment reservations", |b| {
        b.iter(|| {
            let mut pool = HeapAllocator::new(HeapType::GpuOnly);
            for i in 0..10_000u64 {
                let alignment = if i % 3 == 0 { 65_536 } else { 256 };
                black_box(pool.reserve_size_and_get_offset(1 + i % 4096, alignment).unwrap());
            }
            black_box(pool.size())
        });
    });

    let vertex = [0u8; 28 * 24];
    group.bench_function("Resource buffer append (1k models)", |b| {
        b.iter(|| {
            let mut buffer = ResourceBuffer::new("bench vertices");
            for _ in 0..1_000 {
                black_box(buffer.add_data_and_get_shared_address(&vertex));
            }
            black_box(buffer.size())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_reservations);
criterion_main!(benches);
