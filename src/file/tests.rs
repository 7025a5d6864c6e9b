//! 测试模块

use super::*;
use tempfile::tempdir;

fn non_zero(val: u64) -> std::num::NonZeroU64 {
    std::num::NonZeroU64::new(val).unwrap()
}

/// MappedRegion 测试
#[cfg(test)]
mod region_tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};
    use std::sync::atomic::Ordering;

    fn create_region(path: &std::path::Path, size: u64) -> MappedRegion {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .unwrap();
        file.set_len(size).unwrap();
        MappedRegion::map(&file, non_zero(size)).unwrap()
    }

    #[test]
    fn test_put_and_read_bytes() {
        let dir = tempdir().unwrap();
        let region = create_region(&dir.path().join("region.bin"), 128);

        unsafe {
            region.put_bytes(0, b"hello");
            region.put_bytes(100, b"world");
        }

        let mut buf = [0u8; 5];
        unsafe {
            region.read_at(0, &mut buf);
        }
        assert_eq!(&buf, b"hello");
        unsafe {
            region.read_at(100, &mut buf);
        }
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_read_clamps_to_region_size() {
        let dir = tempdir().unwrap();
        let region = create_region(&dir.path().join("clamp.bin"), 16);

        let mut buf = [0u8; 32];
        let read = unsafe { region.read_at(8, &mut buf) };
        assert_eq!(read, 8);

        let read = unsafe { region.read_at(16, &mut buf) };
        assert_eq!(read, 0);
    }

    #[test]
    fn test_put_integers_in_both_byte_orders() {
        let dir = tempdir().unwrap();
        let region = create_region(&dir.path().join("ints.bin"), 64);

        unsafe {
            region.put_u64::<LittleEndian>(0, 0x0102030405060708);
            region.put_u64::<BigEndian>(8, 0x0102030405060708);
            region.put_u16::<LittleEndian>(16, 0xABCD);
        }

        let bytes = unsafe { region.read_slice(0, 18) };
        assert_eq!(&bytes[0..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&bytes[16..18], &[0xCD, 0xAB]);
    }

    #[test]
    fn test_slice_mut_window() {
        let dir = tempdir().unwrap();
        let region = create_region(&dir.path().join("window.bin"), 32);

        let window = unsafe { region.slice_mut(4, 8) };
        window.copy_from_slice(b"12345678");

        let bytes = unsafe { region.read_slice(4, 8) };
        assert_eq!(&bytes, b"12345678");
    }

    #[test]
    fn test_atomic_cells_in_mapping() {
        let dir = tempdir().unwrap();
        let region = create_region(&dir.path().join("atomics.bin"), 64);

        unsafe {
            region.atomic_u64(0).store(42, Ordering::Release);
            region.atomic_i64(8).store(-1, Ordering::Release);
        }

        // 原子单元与普通字节读取看到同一份存储
        let bytes = unsafe { region.read_slice(0, 16) };
        assert_eq!(u64::from_ne_bytes(bytes[0..8].try_into().unwrap()), 42);
        assert_eq!(i64::from_ne_bytes(bytes[8..16].try_into().unwrap()), -1);

        unsafe {
            assert_eq!(region.atomic_u64(0).fetch_add(8, Ordering::AcqRel), 42);
            assert_eq!(region.atomic_u64(0).load(Ordering::Acquire), 50);
        }
    }

    #[test]
    fn test_fill() {
        let dir = tempdir().unwrap();
        let region = create_region(&dir.path().join("fill.bin"), 32);

        unsafe { region.fill(0xAB) };

        let bytes = unsafe { region.read_slice(0, 32) };
        assert_eq!(bytes, vec![0xAB; 32]);
    }
}

/// 单进程 appender 测试
#[cfg(test)]
mod appender_tests {
    use super::*;

    #[test]
    fn test_single_write_exact_fit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exact.bin");

        let file = LocalAppender::map_new(&path, non_zero(128), false).unwrap();

        let record: Vec<u8> = (0u8..128).collect();
        assert_eq!(file.write(&record), Some(0));

        // 精确填满后任何写入都放不下
        assert_eq!(file.write(&[0u8]), None);

        // 精确填满不触发封存
        assert_eq!(file.final_size(), -1);
        assert!(!file.is_pending());

        file.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), record);
    }

    #[test]
    fn test_single_write_overflow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overflow.bin");

        let file = LocalAppender::map_new(&path, non_zero(128), false).unwrap();

        assert_eq!(file.write(&[7u8; 129]), None);

        // 第一个写入就越界：以 0 封存
        assert!(!file.is_pending());
        assert!(file.is_finished());
        assert_eq!(file.final_size(), 0);

        file.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_two_sequential_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sequential.bin");

        let file = LocalAppender::map_new(&path, non_zero(128), false).unwrap();

        assert_eq!(file.write(b"buffer1"), Some(0));
        assert_eq!(file.write(b"bytes2"), Some(7));

        file.close().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..13], b"buffer1bytes2");
    }

    #[test]
    fn test_overflow_after_partial_fill() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        let file = LocalAppender::map_new(&path, non_zero(20), false).unwrap();

        assert_eq!(file.write(b"buffer1"), Some(0));
        assert_eq!(file.write(b"buffer2"), Some(7));
        assert_eq!(file.write(b"buffer3"), None);

        assert_eq!(file.final_size(), 14);
        assert!(file.is_finished());

        file.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"buffer1buffer2");
    }

    #[test]
    fn test_sealing_credits_write_complete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credit.bin");

        let file = LocalAppender::map_new(&path, non_zero(20), false).unwrap();

        file.write(b"buffer1").unwrap();
        assert_eq!(file.write(&[0u8; 20]), None);

        // 封存的预留必须把自己的长度记入完成计数，否则 pending 永不归零
        assert!(!file.is_pending());
        assert_eq!(file.write_complete(), file.next_offset());
    }

    #[test]
    fn test_finish_seals_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("finish.bin");

        let file = LocalAppender::map_new(&path, non_zero(128), false).unwrap();

        file.write(b"hello").unwrap();
        file.finish();

        assert!(file.is_finished());
        assert_eq!(file.final_size(), 5);
        assert_eq!(file.write(b"more"), None);

        // 已封存的文件上 finish 是空操作
        file.finish();
        assert_eq!(file.final_size(), 5);

        file.close().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_close_fails_while_pending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pending.bin");

        let file = LocalAppender::map_new(&path, non_zero(64), false).unwrap();

        // 回调执行期间写入尚未完成
        file.write_with(4, |dst| {
            dst.copy_from_slice(b"abcd");
            assert!(file.is_pending());
            assert!(matches!(file.close(), Err(Error::PendingWrites)));
        });

        assert!(!file.is_pending());
        file.close().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.bin");

        let file = LocalAppender::map_new(&path, non_zero(64), false).unwrap();
        file.write(b"data").unwrap();

        file.close().unwrap();
        file.close().unwrap();
    }

    #[test]
    fn test_map_new_refuses_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("existing.bin");
        std::fs::write(&path, b"already here").unwrap();

        let result = LocalAppender::map_new(&path, non_zero(64), false);
        assert!(matches!(result, Err(Error::FileExists { .. })));
    }

    #[test]
    fn test_capacity_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.bin");

        let result = LocalAppender::map_new(&path, non_zero(u64::from(u32::MAX)), false);
        assert!(matches!(result, Err(Error::InvalidCapacity { .. })));
    }

    #[test]
    fn test_fill_with_zeros() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("zeroed.bin");

        let file = LocalAppender::map_new(&path, non_zero(64), true).unwrap();
        assert_eq!(file.capacity(), 64);
        assert!(file.has_available_capacity());
        file.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), vec![0u8; 64]);
    }
}

/// 写入变体测试
#[cfg(test)]
mod write_variant_tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian};

    fn new_file(dir: &tempfile::TempDir, name: &str, capacity: u64) -> LocalAppender {
        LocalAppender::map_new(dir.path().join(name), non_zero(capacity), false).unwrap()
    }

    #[test]
    fn test_write_ascii() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "ascii.bin", 64);

        assert_eq!(file.write_ascii("Hello "), Some(0));
        assert_eq!(file.write_ascii("World!"), Some(6));

        let path = file.path().to_path_buf();
        file.close().unwrap();
        assert_eq!(&std::fs::read(path).unwrap()[0..12], b"Hello World!");
    }

    #[test]
    fn test_write_ascii_replaces_non_ascii() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "replaced.bin", 64);

        // 每个字符一个字节，非 ASCII 变成 '?'
        assert_eq!(file.write_ascii("héllo"), Some(0));

        let path = file.path().to_path_buf();
        file.close().unwrap();
        assert_eq!(&std::fs::read(path).unwrap()[0..5], b"h?llo");
    }

    #[test]
    fn test_write_chars_little_endian() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "chars_le.bin", 64);

        assert_eq!(file.write_chars::<LittleEndian>("Hi"), Some(0));

        let path = file.path().to_path_buf();
        file.close().unwrap();
        assert_eq!(&std::fs::read(path).unwrap()[0..4], &[b'H', 0, b'i', 0]);
    }

    #[test]
    fn test_write_chars_big_endian() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "chars_be.bin", 64);

        assert_eq!(file.write_chars::<BigEndian>("Hi"), Some(0));

        let path = file.path().to_path_buf();
        file.close().unwrap();
        assert_eq!(&std::fs::read(path).unwrap()[0..4], &[0, b'H', 0, b'i']);
    }

    #[test]
    fn test_write_u64() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "u64.bin", 64);

        assert_eq!(file.write_u64::<LittleEndian>(0x0102030405060708), Some(0));
        assert_eq!(file.write_u64::<BigEndian>(0x0102030405060708), Some(8));

        let path = file.path().to_path_buf();
        file.close().unwrap();
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[0..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&bytes[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_write_u64s_is_one_record() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "u64s.bin", 24);

        assert_eq!(file.write_u64s::<LittleEndian>(&[1, 2]), Some(0));

        // 剩 8 字节，16 字节的记录整体放不下
        assert_eq!(file.write_u64s::<LittleEndian>(&[3, 4]), None);

        let path = file.path().to_path_buf();
        file.close().unwrap();
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 2);
    }

    #[test]
    fn test_write_with_composes_in_place() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "callback.bin", 64);

        let sequence: u32 = 9;
        let offset = file.write_with(8, |dst| {
            dst[..4].copy_from_slice(&sequence.to_le_bytes());
            dst[4..].copy_from_slice(b"ping");
        });
        assert_eq!(offset, Some(0));

        let path = file.path().to_path_buf();
        file.close().unwrap();
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 9);
        assert_eq!(&bytes[4..8], b"ping");
    }

    #[test]
    fn test_write_with_panicking_callback_still_completes() {
        let dir = tempdir().unwrap();
        let file = new_file(&dir, "panic.bin", 64);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            file.write_with(4, |_dst| panic!("listener bug"));
        }));
        assert!(result.is_err());

        // 回调 panic 也不能让文件卡在 pending
        assert!(!file.is_pending());
        file.close().unwrap();
    }
}

/// 多进程共享变体测试
#[cfg(test)]
mod shared_tests {
    use super::*;
    use crate::file::counters::shared::HEADER_SIZE;

    #[test]
    fn test_header_layout_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.bin");

        let file = SharedAppender::map_new(&path, non_zero(64), false).unwrap();
        assert_eq!(file.header_size(), HEADER_SIZE);
        assert_eq!(file.capacity(), 64);
        assert_eq!(file.region_size(), 64 + HEADER_SIZE);

        // 第一个授予的偏移是头部之后的第一个字节
        assert_eq!(file.write(b"Hello "), Some(HEADER_SIZE));
        file.flush().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, 64 + HEADER_SIZE);

        // 头部槽位：N@0 W@8 F@16，本机字节序
        let next = u64::from_ne_bytes(bytes[0..8].try_into().unwrap());
        let complete = u64::from_ne_bytes(bytes[8..16].try_into().unwrap());
        let final_size = i64::from_ne_bytes(bytes[16..24].try_into().unwrap());
        assert_eq!(next, HEADER_SIZE + 6);
        assert_eq!(complete, HEADER_SIZE + 6);
        assert_eq!(final_size, -1);

        // 保留区为零
        assert_eq!(&bytes[24..64], &[0u8; 40]);

        let start = HEADER_SIZE as usize;
        assert_eq!(&bytes[start..start + 6], b"Hello ");

        file.close().unwrap();
    }

    #[test]
    fn test_reopen_continues_where_creator_left_off() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.bin");

        let first = SharedAppender::map_new(&path, non_zero(64), false).unwrap();
        assert_eq!(first.write(b"Hello "), Some(HEADER_SIZE));

        {
            let second = SharedAppender::map_existing(&path).unwrap();
            assert_eq!(second.write(b"World!"), Some(HEADER_SIZE + 6));
            second.close().unwrap();
        }

        first.flush().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let start = HEADER_SIZE as usize;
        assert_eq!(&bytes[start..start + 12], b"Hello World!");

        first.close().unwrap();
    }

    #[test]
    fn test_map_new_attaches_to_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attach.bin");

        let creator = SharedAppender::map_new(&path, non_zero(64), false).unwrap();
        creator.write(b"one").unwrap();

        // 已存在时 map_new 挂接而不是报错
        let joiner = SharedAppender::map_new(&path, non_zero(64), false).unwrap();
        assert_eq!(joiner.write(b"two"), Some(HEADER_SIZE + 3));

        creator.close().unwrap();
        joiner.close().unwrap();
    }

    #[test]
    fn test_map_existing_missing_file() {
        let dir = tempdir().unwrap();
        let result = SharedAppender::map_existing(dir.path().join("missing.bin"));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_map_existing_rejects_truncated_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, &[0u8; 10]).unwrap();

        let result = SharedAppender::map_existing(&path);
        assert!(matches!(result, Err(Error::FileTooSmall { actual: 10 })));
    }

    #[test]
    fn test_shared_seal_and_truncate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sealed.bin");

        let file = SharedAppender::map_new(&path, non_zero(20), false).unwrap();
        file.write(b"buffer1").unwrap();
        file.write(b"buffer2").unwrap();
        assert_eq!(file.write(b"buffer3"), None);

        assert_eq!(file.final_size(), (HEADER_SIZE + 14) as i64);
        assert!(file.is_finished());

        file.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE + 14);
    }
}

/// 并发测试
#[cfg(test)]
mod concurrent_tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_many_writers_disjoint_grants() {
        const THREADS: u64 = 8;
        const WRITES: u64 = 64;
        const LENGTH: u64 = 16;

        let dir = tempdir().unwrap();
        let path = dir.path().join("many.bin");

        let capacity = THREADS * WRITES * LENGTH;
        let file = LocalAppender::map_new(&path, non_zero(capacity), false).unwrap();

        let mut grants: Vec<(u64, u8)> = Vec::new();
        std::thread::scope(|s| {
            let mut handles = Vec::new();
            for thread in 0..THREADS {
                let file = &file;
                handles.push(s.spawn(move || {
                    let marker = thread as u8 + 1;
                    let record = [marker; LENGTH as usize];
                    let mut offsets = Vec::new();
                    for _ in 0..WRITES {
                        offsets.push((file.write(&record).unwrap(), marker));
                    }
                    offsets
                }));
            }
            for handle in handles {
                grants.extend(handle.join().unwrap());
            }
        });

        assert!(!file.is_pending());

        // 授予的偏移两两不同且构成等差集合 {0, l, 2l, ...}
        let offsets: BTreeSet<u64> = grants.iter().map(|(offset, _)| *offset).collect();
        assert_eq!(offsets.len() as u64, THREADS * WRITES);
        let expected: BTreeSet<u64> = (0..capacity).step_by(LENGTH as usize).collect();
        assert_eq!(offsets, expected);

        file.close().unwrap();
        let bytes = std::fs::read(&path).unwrap();
        for (offset, marker) in grants {
            let start = offset as usize;
            assert_eq!(&bytes[start..start + LENGTH as usize], &[marker; LENGTH as usize]);
        }
    }

    #[test]
    fn test_concurrent_seal_single_final_size() {
        const THREADS: u64 = 8;
        const LENGTH: u64 = 16;

        let dir = tempdir().unwrap();
        let path = dir.path().join("race.bin");

        // 1000 不是 16 的倍数：最后一条完整记录结束于 992
        let file = LocalAppender::map_new(&path, non_zero(1000), false).unwrap();

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                let file = &file;
                s.spawn(move || {
                    while file.write(&[0xEE; LENGTH as usize]).is_some() {}
                });
            }
        });

        assert!(!file.is_pending());
        assert!(file.is_finished());
        assert_eq!(file.final_size(), 992);

        file.close().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 992);
    }

    #[test]
    fn test_shared_counters_under_concurrency() {
        const THREADS: u64 = 4;
        const WRITES: u64 = 32;
        const LENGTH: u64 = 8;

        let dir = tempdir().unwrap();
        let path = dir.path().join("shared_race.bin");

        let capacity = THREADS * WRITES * LENGTH;
        let file = SharedAppender::map_new(&path, non_zero(capacity), false).unwrap();
        let header = file.header_size();

        let mut offsets: Vec<u64> = Vec::new();
        std::thread::scope(|s| {
            let mut handles = Vec::new();
            for thread in 0..THREADS {
                let file = &file;
                handles.push(s.spawn(move || {
                    let record = [thread as u8 + 1; LENGTH as usize];
                    (0..WRITES).map(|_| file.write(&record).unwrap()).collect::<Vec<_>>()
                }));
            }
            for handle in handles {
                offsets.extend(handle.join().unwrap());
            }
        });

        offsets.sort_unstable();
        let expected: Vec<u64> = (0..THREADS * WRITES).map(|i| header + i * LENGTH).collect();
        assert_eq!(offsets, expected);

        assert!(!file.is_pending());
        file.close().unwrap();
    }
}

/// 文件提供者测试
#[cfg(test)]
mod provider_tests {
    use super::*;
    use crate::file::counters::local;
    use std::sync::Arc;

    #[test]
    fn test_fresh_files_with_distinct_names() {
        let dir = tempdir().unwrap();

        let provider = FileProvider::<local::Counters>::new(
            dir.path().join("logs"),
            "test-",
            ".bin",
            non_zero(64),
            false,
            Arc::new(RollListeners::default()),
        )
        .unwrap();

        let first = provider.next_file().unwrap();
        let second = provider.next_file().unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.path().exists());
        assert!(second.path().exists());

        let name = first.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("test-"));
        assert!(name.ends_with(".bin"));

        assert_eq!(provider.capacity(), non_zero(64));
        assert_eq!(provider.directory(), dir.path().join("logs"));
    }

    #[test]
    fn test_missing_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let provider = FileProvider::<local::Counters>::new(
            &nested,
            "",
            "",
            non_zero(32),
            false,
            Arc::new(RollListeners::default()),
        )
        .unwrap();

        provider.next_file().unwrap();
        assert!(nested.is_dir());
    }
}

/// 滚动测试
#[cfg(test)]
mod rolling_tests {
    use super::*;
    use crate::file::counters::shared::HEADER_SIZE;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    struct Recorder {
        created: Arc<Mutex<Vec<PathBuf>>>,
        closed: Arc<Mutex<Vec<PathBuf>>>,
    }

    fn rolling_file(dir: &std::path::Path, capacity: u64, multi_process: bool) -> (AppendFile, Recorder) {
        let created = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));
        let created_hook = Arc::clone(&created);
        let closed_hook = Arc::clone(&closed);

        let file = OpenOptions::new()
            .location(dir)
            .capacity(non_zero(capacity))
            .multi_process(multi_process)
            .roll(|roll| {
                roll.enabled(true)
                    .file_name_prefix("roll-")
                    .file_name_suffix(".bin")
                    .file_created_listener(move |path| {
                        created_hook.lock().unwrap().push(path.to_path_buf());
                    })
                    .file_closed_listener(move |path| {
                        closed_hook.lock().unwrap().push(path.to_path_buf());
                    })
            })
            .map()
            .unwrap();

        (file, Recorder { created, closed })
    }

    #[test]
    fn test_roll_to_second_file() {
        let dir = tempdir().unwrap();
        let (file, recorder) = rolling_file(dir.path(), 20, false);

        // 前两条记录落在第一个文件
        assert_eq!(file.write(b"buffer1").unwrap(), Some(0));
        assert_eq!(file.write(b"buffer2").unwrap(), Some(7));

        // 第三条触发滚动，落在第二个文件的起始
        assert_eq!(file.write(b"buffer3").unwrap(), Some(0));

        let created = recorder.created.lock().unwrap().clone();
        let closed = recorder.closed.lock().unwrap().clone();
        assert_eq!(created.len(), 2);
        assert_eq!(closed, vec![created[0].clone()]);

        // 第一个文件被截断到封存大小
        assert_eq!(std::fs::metadata(&created[0]).unwrap().len(), 14);
        assert_eq!(std::fs::read(&created[0]).unwrap(), b"buffer1buffer2");

        file.close().unwrap();
        assert_eq!(std::fs::read(&created[1]).unwrap()[0..7], *b"buffer3");
    }

    #[test]
    fn test_rolling_shared_variant_offsets() {
        let dir = tempdir().unwrap();
        let (file, _recorder) = rolling_file(dir.path(), 20, true);

        assert_eq!(file.write(b"buffer1").unwrap(), Some(HEADER_SIZE));
        assert_eq!(file.write(b"buffer2").unwrap(), Some(HEADER_SIZE + 7));
        assert_eq!(file.write(b"buffer3").unwrap(), Some(HEADER_SIZE));

        file.close().unwrap();
    }

    #[test]
    fn test_record_too_large_fails_fast() {
        let dir = tempdir().unwrap();
        let (file, _recorder) = rolling_file(dir.path(), 20, false);

        let result = file.write(&[0u8; 21]);
        assert!(matches!(result, Err(Error::RecordTooLarge { length: 21, capacity: 20 })));

        file.close().unwrap();
    }

    #[test]
    fn test_finish_forces_roll() {
        let dir = tempdir().unwrap();
        let (file, recorder) = rolling_file(dir.path(), 64, false);

        assert!(!file.is_finished());

        file.write(b"aaaa").unwrap();
        file.finish();

        // 滚动流永不结束，finish 只封存当前文件
        assert!(!file.is_finished());
        assert_eq!(file.write(b"bbbb").unwrap(), Some(0));

        let created = recorder.created.lock().unwrap().clone();
        assert_eq!(created.len(), 2);
        assert_eq!(std::fs::read(&created[0]).unwrap(), b"aaaa");

        file.close().unwrap();
    }

    #[test]
    fn test_async_close_truncates_eventually() {
        let dir = tempdir().unwrap();
        let closed = Arc::new(Mutex::new(Vec::new()));
        let closed_hook = Arc::clone(&closed);

        let file = OpenOptions::new()
            .location(dir.path())
            .capacity(non_zero(20))
            .roll(|roll| {
                roll.enabled(true)
                    .async_close(true)
                    .file_closed_listener(move |path| {
                        closed_hook.lock().unwrap().push(path.to_path_buf());
                    })
            })
            .map()
            .unwrap();

        file.write(b"buffer1").unwrap();
        file.write(b"buffer2").unwrap();
        file.write(b"buffer3").unwrap();

        // 后台关闭最终会截断第一个文件
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let closed = closed.lock().unwrap().clone();
            if let Some(first) = closed.first() {
                assert_eq!(std::fs::metadata(first).unwrap().len(), 14);
                break;
            }
            assert!(Instant::now() < deadline, "close thread never finished");
            std::thread::sleep(Duration::from_millis(10));
        }

        file.close().unwrap();
    }

    #[test]
    fn test_panicking_listener_does_not_wedge_rolling() {
        let dir = tempdir().unwrap();

        let file = OpenOptions::new()
            .location(dir.path())
            .capacity(non_zero(20))
            .roll(|roll| {
                roll.enabled(true)
                    .file_mapped_listener(|_path| panic!("bad listener"))
            })
            .map()
            .unwrap();

        // 每次滚动监听器都 panic，写入仍然照常进行
        file.write(b"buffer1").unwrap();
        file.write(b"buffer2").unwrap();
        assert_eq!(file.write(b"buffer3").unwrap(), Some(0));

        file.close().unwrap();
    }

    #[test]
    fn test_concurrent_writers_roll_exactly_once_per_exhaustion() {
        const THREADS: usize = 4;
        const WRITES: usize = 50;
        const LENGTH: usize = 5;

        let dir = tempdir().unwrap();
        let (file, recorder) = rolling_file(dir.path(), 20, false);

        std::thread::scope(|s| {
            for thread in 0..THREADS {
                let file = &file;
                s.spawn(move || {
                    let record = [thread as u8 + 1; LENGTH];
                    for _ in 0..WRITES {
                        file.write(&record).unwrap();
                    }
                });
            }
        });

        assert!(!file.is_pending());
        file.close().unwrap();

        // 每条记录都完整落在某个文件中，记录总数守恒
        let created = recorder.created.lock().unwrap().clone();
        let mut records = 0usize;
        for path in &created {
            let bytes = std::fs::read(path).unwrap();
            assert!(bytes.len() <= 20);
            for chunk in bytes.chunks(LENGTH) {
                if chunk.iter().all(|byte| *byte == 0) {
                    continue;
                }
                assert_eq!(chunk.len(), LENGTH);
                assert!(chunk.iter().all(|byte| *byte == chunk[0]));
                records += 1;
            }
        }
        assert_eq!(records, THREADS * WRITES);

        // 每次耗尽最多产生一个新文件
        assert!(created.len() <= THREADS * WRITES / (20 / LENGTH) + 1);
    }

    #[test]
    fn test_busy_spin_contention_path() {
        let dir = tempdir().unwrap();

        let file = OpenOptions::new()
            .location(dir.path())
            .capacity(non_zero(20))
            .roll(|roll| roll.enabled(true).yield_on_allocate_contention(false))
            .map()
            .unwrap();

        for _ in 0..10 {
            file.write(b"12345").unwrap();
        }

        file.close().unwrap();
    }
}

/// 构建器测试
#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn test_missing_location() {
        let result = OpenOptions::new().map();
        assert!(matches!(result, Err(Error::MissingLocation)));
    }

    #[test]
    fn test_missing_capacity() {
        let dir = tempdir().unwrap();
        let result = OpenOptions::new().location(dir.path().join("x.bin")).map();
        assert!(matches!(result, Err(Error::MissingCapacity)));
    }

    #[test]
    fn test_bounded_local_mapping() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bounded.bin");

        let file = OpenOptions::new()
            .location(&path)
            .capacity(non_zero(128))
            .map()
            .unwrap();

        assert!(matches!(file, AppendFile::Local(_)));
        assert_eq!(file.write(b"hello").unwrap(), Some(0));
        assert_eq!(file.path(), path);
        assert!(!file.is_pending());
        assert!(!file.is_finished());
        file.close().unwrap();
    }

    #[test]
    fn test_bounded_shared_mapping() {
        let dir = tempdir().unwrap();

        let file = OpenOptions::new()
            .location(dir.path().join("shared.bin"))
            .capacity(non_zero(128))
            .multi_process(true)
            .map()
            .unwrap();

        assert!(matches!(file, AppendFile::Shared(_)));
        assert_eq!(file.write(b"hello").unwrap(), Some(64));
        file.close().unwrap();
    }

    #[test]
    fn test_bounded_does_not_fit_signal() {
        let dir = tempdir().unwrap();

        let file = OpenOptions::new()
            .location(dir.path().join("full.bin"))
            .capacity(non_zero(8))
            .map()
            .unwrap();

        assert_eq!(file.write(b"12345678").unwrap(), Some(0));
        // 有界形态用 Ok(None) 表示放不下
        assert_eq!(file.write(b"x").unwrap(), None);

        file.finish();
        file.close().unwrap();
    }

    #[test]
    fn test_facade_write_variants() {
        use byteorder::LittleEndian;

        let dir = tempdir().unwrap();

        let file = OpenOptions::new()
            .location(dir.path().join("variants.bin"))
            .capacity(non_zero(256))
            .map()
            .unwrap();

        assert_eq!(file.write_ascii("abc").unwrap(), Some(0));
        assert_eq!(file.write_chars::<LittleEndian>("de").unwrap(), Some(3));
        assert_eq!(file.write_u64::<LittleEndian>(1).unwrap(), Some(7));
        assert_eq!(file.write_u64s::<LittleEndian>(&[2, 3]).unwrap(), Some(15));
        assert_eq!(
            file.write_with(4, |dst| dst.copy_from_slice(b"tail")).unwrap(),
            Some(31)
        );

        file.close().unwrap();
    }
}
