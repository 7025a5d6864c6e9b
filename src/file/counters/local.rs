//! Process-private counter storage
//!
//! 进程私有的计数器存储

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use super::AppendCounters;
use crate::file::region::MappedRegion;

/// Counter triple resident in process memory
///
/// 驻留在进程内存中的计数器三元组
///
/// Used by the single-process variant. There is no header: payload starts at
/// offset 0, so a closed file is the raw concatenation of its records.
///
/// 供单进程变体使用。没有头部：负载从偏移 0 开始，
/// 关闭后的文件就是记录的原始拼接。
pub struct Counters {
    /// Next write offset `N`
    ///
    /// 下一写入偏移 `N`
    next_offset: AtomicU64,

    /// Write complete mark `W`
    ///
    /// 写入完成标记 `W`
    write_complete: AtomicU64,

    /// Final size `F`, `-1` until sealed
    ///
    /// 最终大小 `F`，封存前为 `-1`
    final_size: AtomicI64,
}

impl AppendCounters for Counters {
    const HEADER_SIZE: u64 = 0;

    #[inline]
    fn attach(_region: &MappedRegion, _initialize: bool) -> Self {
        Self {
            next_offset: AtomicU64::new(Self::HEADER_SIZE),
            write_complete: AtomicU64::new(Self::HEADER_SIZE),
            final_size: AtomicI64::new(-1),
        }
    }

    #[inline]
    fn next_offset(&self) -> u64 {
        self.next_offset.load(Ordering::Acquire)
    }

    #[inline]
    fn try_reserve(&self, current: u64, new: u64) -> bool {
        self.next_offset
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    fn write_complete(&self) -> u64 {
        self.write_complete.load(Ordering::Acquire)
    }

    #[inline]
    fn add_write_complete(&self, length: u64) {
        self.write_complete.fetch_add(length, Ordering::Release);
    }

    #[inline]
    fn final_size(&self) -> i64 {
        self.final_size.load(Ordering::Acquire)
    }

    #[inline]
    fn seal(&self, final_size: u64) -> bool {
        self.final_size
            .compare_exchange(-1, final_size as i64, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}
