use std::fmt::Display;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ipfs_car::{write_car_v1, write_car_v2, ImportOptions, Importer, Layout};
use tokio::runtime::Runtime as TokioExecutor;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
struct Params {
    size: usize,
    num: usize,
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "content_size: {} bytes, num_of_duplicates: {}",
            self.size, self.num
        )
    }
}

/// Get content sizes for the benchmarks.
fn get_sizes() -> Vec<usize> {
    vec![
        1024 * 1000,   // 1 MB
        1024 * 10000,  // 10 MB
        1024 * 100000, // 100 MB
    ]
}

/// Get number of copies for the benchmarks. Zero means that there are no copies
/// and the whole content is unique.
fn get_num_copies() -> Vec<usize> {
    vec![0, 1, 4]
}

/// Get combinations of parameters for the benchmarks.
fn get_params() -> Vec<Params> {
    get_sizes()
        .iter()
        .flat_map(|size| {
            get_num_copies().into_iter().map(move |num| Params {
                size: *size,
                num,
            })
        })
        .collect()
}

/// Create random content of a given size. Duplicates are used to specify how
/// many times the content should be repeated.
fn create_content(size: usize, num_of_copies: usize) -> Vec<u8> {
    let single_part_size = size / (num_of_copies + 1);
    let single_content = (0..single_part_size)
        .map(|_| rand::random())
        .collect::<Vec<u8>>();

    single_content.repeat(num_of_copies + 1)
}

fn options(layout: Layout) -> ImportOptions {
    ImportOptions {
        layout,
        ..Default::default()
    }
}

/// Import content into a fresh [`Importer`]. This function is benchmarked.
async fn import_benched(content: Vec<u8>, layout: Layout) {
    let mut importer = Importer::new();
    importer
        .import(content.into(), options(layout))
        .await
        .unwrap();
}

fn import(c: &mut Criterion) {
    for param in get_params() {
        let content = create_content(param.size, param.num);
        for (name, layout) in [("balanced", Layout::Balanced), ("trickle", Layout::Trickle)] {
            c.bench_with_input(BenchmarkId::new(name, param), &(), |b, _: &()| {
                b.to_async(TokioExecutor::new().unwrap()).iter_batched(
                    || content.clone(),
                    |content| import_benched(content, layout),
                    BatchSize::LargeInput,
                );
            });
        }
    }
}

fn write(c: &mut Criterion) {
    let runtime = TokioExecutor::new().unwrap();

    for param in get_params() {
        let content = create_content(param.size, param.num);
        let mut importer = Importer::new();
        let root = runtime.block_on(async {
            importer
                .import(content.into(), ImportOptions::default())
                .await
                .unwrap()
        });
        let store = importer.blockstore();

        c.bench_with_input(BenchmarkId::new("car_v1", param), &(), |b, _: &()| {
            b.to_async(TokioExecutor::new().unwrap()).iter_batched(
                || Vec::with_capacity(param.size),
                |mut buffer| async move {
                    write_car_v1(store, root, &mut buffer, CancellationToken::new())
                        .await
                        .unwrap();
                },
                BatchSize::SmallInput,
            );
        });

        c.bench_with_input(BenchmarkId::new("car_v2", param), &(), |b, _: &()| {
            b.to_async(TokioExecutor::new().unwrap()).iter_batched(
                || Vec::with_capacity(param.size),
                |mut buffer| async move {
                    write_car_v2(store, root, &mut buffer, CancellationToken::new())
                        .await
                        .unwrap();
                },
                BatchSize::SmallInput,
            );
        });
    }
}

criterion_group!(bench_import, import);
criterion_group!(bench_write, write);
criterion_main!(bench_import, bench_write);
