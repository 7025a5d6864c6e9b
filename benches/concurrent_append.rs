use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mmap_append::LocalAppender;
use std::io::{Seek, SeekFrom, Write};
use std::num::NonZeroU64;
use tempfile::tempdir;

/// 测试参数
const FILE_SIZE: u64 = 64 * 1024 * 1024; // 64MB
const RECORD_SIZE: usize = 4096; // 每条记录 4KB
const WORKER_COUNTS: [usize; 4] = [1, 2, 4, 8];

/// 使用 LocalAppender 并发追加填满一个文件
fn append_with_workers(workers: usize) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("append.bin");

    let file = LocalAppender::map_new(&path, NonZeroU64::new(FILE_SIZE).unwrap(), false).unwrap();

    let total_records = FILE_SIZE as usize / RECORD_SIZE;
    let records_per_worker = total_records / workers;

    std::thread::scope(|s| {
        for worker in 0..workers {
            let file = &file;
            s.spawn(move || {
                let record = vec![worker as u8; RECORD_SIZE];
                for _ in 0..records_per_worker {
                    file.write(&record).unwrap();
                }
            });
        }
    });

    file.close().unwrap();
}

/// 基线：每个 worker 用自己的句柄 seek + write 写入自己的条带
fn positioned_write_with_workers(workers: usize) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("positioned.bin");

    let file = std::fs::File::create(&path).unwrap();
    file.set_len(FILE_SIZE).unwrap();
    drop(file);

    let total_records = FILE_SIZE as usize / RECORD_SIZE;
    let records_per_worker = total_records / workers;

    std::thread::scope(|s| {
        for worker in 0..workers {
            let path = path.clone();
            s.spawn(move || {
                let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
                let record = vec![worker as u8; RECORD_SIZE];
                let base = worker * records_per_worker * RECORD_SIZE;
                for index in 0..records_per_worker {
                    let offset = (base + index * RECORD_SIZE) as u64;
                    file.seek(SeekFrom::Start(offset)).unwrap();
                    file.write_all(&record).unwrap();
                }
                file.sync_all().unwrap();
            });
        }
    });
}

fn bench_concurrent_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_append");
    group.sample_size(10);

    for workers in WORKER_COUNTS {
        group.bench_with_input(
            BenchmarkId::new("mmap_append", workers),
            &workers,
            |b, &workers| b.iter(|| append_with_workers(workers)),
        );
        group.bench_with_input(
            BenchmarkId::new("std_fs_positioned", workers),
            &workers,
            |b, &workers| b.iter(|| positioned_write_with_workers(workers)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_concurrent_append);
criterion_main!(benches);
