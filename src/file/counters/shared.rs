//! Mapped-header counter storage for multi-process coordination
//!
//! 用于多进程协调的映射头部计数器存储

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use super::AppendCounters;
use crate::file::region::MappedRegion;

/// Size of the counter header at the start of a shared file
///
/// 共享文件起始处计数器头部的大小
pub const HEADER_SIZE: u64 = 64;

/// Header slot of the next-write-offset `N`
///
/// 下一写入偏移 `N` 的头部槽位
const NEXT_OFFSET_SLOT: u64 = 0;

/// Header slot of the write-complete mark `W`
///
/// 写入完成标记 `W` 的头部槽位
const WRITE_COMPLETE_SLOT: u64 = 8;

/// Header slot of the final size `F`
///
/// 最终大小 `F` 的头部槽位
const FINAL_SIZE_SLOT: u64 = 16;

/// Counter triple resident in the mapped file header
///
/// 驻留在映射文件头部的计数器三元组
///
/// The first 64 bytes of the region hold the counters in native byte order:
/// bytes 0-7 `N`, 8-15 `W`, 16-23 `F`, 24-63 reserved (zero). Payload starts
/// at offset 64. Every process mapping the file performs its CAS and
/// fetch-add operations directly on the mapped addresses, so producers in
/// different processes coordinate exactly like threads of one process.
///
/// 区域的前 64 字节以本机字节序存放计数器：
/// 字节 0-7 为 `N`，8-15 为 `W`，16-23 为 `F`，24-63 保留（为零）。
/// 负载从偏移 64 开始。映射该文件的每个进程都直接在映射地址上
/// 执行 CAS 和 fetch-add，因此不同进程的生产者与同进程线程的协调方式完全一致。
pub struct Counters {
    /// Region holding the header cells; kept alive as long as the counters
    ///
    /// 持有头部单元的区域；与计数器同生命周期
    region: MappedRegion,
}

impl Counters {
    #[inline]
    fn next_cell(&self) -> &AtomicU64 {
        // Safety: slot is 8-byte aligned and within the header, accessed atomically only
        // Safety: 槽位 8 字节对齐且在头部内，仅被原子访问
        unsafe { self.region.atomic_u64(NEXT_OFFSET_SLOT) }
    }

    #[inline]
    fn write_complete_cell(&self) -> &AtomicU64 {
        // Safety: slot is 8-byte aligned and within the header, accessed atomically only
        // Safety: 槽位 8 字节对齐且在头部内，仅被原子访问
        unsafe { self.region.atomic_u64(WRITE_COMPLETE_SLOT) }
    }

    #[inline]
    fn final_size_cell(&self) -> &AtomicI64 {
        // Safety: slot is 8-byte aligned and within the header, accessed atomically only
        // Safety: 槽位 8 字节对齐且在头部内，仅被原子访问
        unsafe { self.region.atomic_i64(FINAL_SIZE_SLOT) }
    }
}

impl AppendCounters for Counters {
    const HEADER_SIZE: u64 = HEADER_SIZE;

    fn attach(region: &MappedRegion, initialize: bool) -> Self {
        let counters = Self { region: region.clone() };
        if initialize {
            // Creation convention: the creating process owns the fresh,
            // zero-filled file exclusively. W and F are stored first, N last;
            // a reservation can only begin once N carries the initial offset.
            //
            // 创建约定：创建进程独占这个刚建好的零填充文件。
            // 先写 W 和 F，最后写 N；只有 N 带上初始偏移后预留才会开始。
            counters.write_complete_cell().store(HEADER_SIZE, Ordering::Release);
            counters.final_size_cell().store(-1, Ordering::Release);
            counters.next_cell().store(HEADER_SIZE, Ordering::Release);
        }
        counters
    }

    #[inline]
    fn next_offset(&self) -> u64 {
        self.next_cell().load(Ordering::Acquire)
    }

    #[inline]
    fn try_reserve(&self, current: u64, new: u64) -> bool {
        self.next_cell()
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    fn write_complete(&self) -> u64 {
        self.write_complete_cell().load(Ordering::Acquire)
    }

    #[inline]
    fn add_write_complete(&self, length: u64) {
        self.write_complete_cell().fetch_add(length, Ordering::Release);
    }

    #[inline]
    fn final_size(&self) -> i64 {
        self.final_size_cell().load(Ordering::Acquire)
    }

    #[inline]
    fn seal(&self, final_size: u64) -> bool {
        self.final_size_cell()
            .compare_exchange(-1, final_size as i64, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}
