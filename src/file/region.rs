//! Memory-mapped byte region based on memmap2
//!
//! 基于 memmap2 的内存映射字节区域

use byteorder::ByteOrder;
use memmap2::MmapMut;
use std::cell::UnsafeCell;
use std::fs::File;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64};
use super::error::Result;

/// Fixed-size byte region mapped over a file
///
/// 映射在文件上的固定大小字节区域
///
/// The region is the raw storage an appender grants offsets into. It exposes
/// bulk byte writes, byte-order-aware integer puts, and 64-bit atomic cells
/// carved out of the mapping (used by the multi-process counter header).
///
/// 区域是 appender 授予偏移的底层存储。它提供批量字节写入、
/// 按字节序写入整数，以及从映射中切出的 64 位原子单元
/// （供多进程计数器头部使用）。
///
/// # Features
///
/// - **Zero-copy writes**: Write operations directly modify mapped memory without system calls
/// - **Lock-free concurrency**: Concurrent writes to different regions require no locking
/// - **Reference counting**: Can be cloned and shared among multiple workers
/// - **Manual flushing**: Control when data is synchronized to disk
///
/// # 特性
///
/// - **零拷贝写入**：写入操作直接修改映射内存，无需系统调用
/// - **无锁并发**：不同区域的并发写入无需加锁
/// - **引用计数**：可以克隆并在多个 worker 间共享
/// - **手动刷盘**：控制何时将数据同步到磁盘
///
/// # Safety Notes
///
/// This implementation uses `UnsafeCell` to allow lock-free concurrent writes.
/// As long as:
/// - Different threads write to non-overlapping memory regions
/// - No reads occur to the same region during writes
///
/// It is completely safe. The appender's reservation protocol is what upholds
/// these guarantees; direct users of the region must uphold them manually.
///
/// # 安全性说明
///
/// 这个实现使用 `UnsafeCell` 来允许无锁并发写入。只要：
/// - 不同线程写入不重叠的内存区域
/// - 不在写入同时读取同一区域
///
/// 那么就是完全安全的。appender 的预留协议负责维护这些保证；
/// 直接使用区域的调用者需要自行维护。
#[derive(Clone)]
pub struct MappedRegion {
    /// Mutable reference to memory mapping, using UnsafeCell for interior mutability
    ///
    /// 内存映射的可变引用，使用 UnsafeCell 允许内部可变性
    ///
    /// # Safety
    /// Safe as long as different threads write to non-overlapping regions
    ///
    /// # Safety
    /// 只要不同线程写入不重叠的区域，就是安全的
    mmap: Arc<UnsafeCell<MmapMut>>,

    /// Region size in bytes
    ///
    /// 区域大小
    size: NonZeroU64,
}

impl MappedRegion {
    /// Map the whole of an open file into memory
    ///
    /// 将打开的文件整体映射到内存
    ///
    /// The file must already be sized to `size` bytes (`set_len` first).
    ///
    /// 文件必须已经预分配到 `size` 字节（先调用 `set_len`）。
    ///
    /// # Parameters
    /// - `file`: open read/write file handle
    /// - `size`: mapping size in bytes, must be > 0
    ///
    /// # 参数
    /// - `file`: 已打开的读写文件句柄
    /// - `size`: 映射大小（字节），必须大于 0
    ///
    /// # Errors
    /// Returns corresponding I/O errors if memory mapping fails
    ///
    /// # Errors
    /// 如果映射内存失败，返回相应的 I/O 错误
    pub fn map(file: &File, size: NonZeroU64) -> Result<Self> {
        let mmap = unsafe { MmapMut::map_mut(file)? };

        Ok(Self {
            #[allow(clippy::arc_with_non_send_sync)]
            mmap: Arc::new(UnsafeCell::new(mmap)),
            size,
        })
    }

    /// Get region size
    ///
    /// 获取区域大小
    #[inline]
    pub fn size(&self) -> NonZeroU64 {
        self.size
    }

    /// Write bytes at the specified position (lock-free operation)
    ///
    /// 在指定位置写入字节（无锁操作）
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `offset + src.len()` does not exceed the region size
    /// - Different threads do not write to overlapping memory regions concurrently
    /// - No reads occur to the same region during writes
    ///
    /// # Safety
    ///
    /// 调用者需要确保：
    /// - `offset + src.len()` 不超过区域大小
    /// - 不同线程不会并发写入重叠的内存区域
    /// - 不会在写入时读取同一区域
    #[inline]
    pub unsafe fn put_bytes(&self, offset: u64, src: &[u8]) {
        let offset = offset as usize;
        debug_assert!(
            offset + src.len() <= self.size.get() as usize,
            "put_bytes at {}..{} exceeds region size {}",
            offset, offset + src.len(), self.size
        );

        unsafe {
            let mmap = &mut *self.mmap.get();
            mmap[offset..offset + src.len()].copy_from_slice(src);
        }
    }

    /// Write a single byte at the specified position
    ///
    /// 在指定位置写入单个字节
    ///
    /// # Safety
    /// Same contract as [`put_bytes`](Self::put_bytes)
    ///
    /// # Safety
    /// 与 [`put_bytes`](Self::put_bytes) 相同的约束
    #[inline]
    pub unsafe fn put_byte(&self, offset: u64, value: u8) {
        let offset = offset as usize;
        debug_assert!(offset < self.size.get() as usize);

        unsafe {
            let mmap = &mut *self.mmap.get();
            mmap[offset] = value;
        }
    }

    /// Write a 64-bit integer at the specified position in the byte order `E`
    ///
    /// 在指定位置按字节序 `E` 写入 64 位整数
    ///
    /// # Safety
    /// Same contract as [`put_bytes`](Self::put_bytes)
    ///
    /// # Safety
    /// 与 [`put_bytes`](Self::put_bytes) 相同的约束
    #[inline]
    pub unsafe fn put_u64<E: ByteOrder>(&self, offset: u64, value: u64) {
        let offset = offset as usize;
        debug_assert!(offset + 8 <= self.size.get() as usize);

        unsafe {
            let mmap = &mut *self.mmap.get();
            E::write_u64(&mut mmap[offset..offset + 8], value);
        }
    }

    /// Write a 16-bit integer at the specified position in the byte order `E`
    ///
    /// 在指定位置按字节序 `E` 写入 16 位整数
    ///
    /// # Safety
    /// Same contract as [`put_bytes`](Self::put_bytes)
    ///
    /// # Safety
    /// 与 [`put_bytes`](Self::put_bytes) 相同的约束
    #[inline]
    pub unsafe fn put_u16<E: ByteOrder>(&self, offset: u64, value: u16) {
        let offset = offset as usize;
        debug_assert!(offset + 2 <= self.size.get() as usize);

        unsafe {
            let mmap = &mut *self.mmap.get();
            E::write_u16(&mut mmap[offset..offset + 2], value);
        }
    }

    /// Borrow a mutable window of the region for in-place composition
    ///
    /// 借出区域的可变窗口用于原地组装数据
    ///
    /// # Safety
    ///
    /// The caller must ensure exclusive access to `[offset, offset + len)`
    /// for the lifetime of the returned slice. The appender hands this window
    /// to write callbacks only for ranges it has reserved.
    ///
    /// # Safety
    ///
    /// 调用者必须在返回切片的生命周期内独占访问 `[offset, offset + len)`。
    /// appender 只会把已预留的范围交给写入回调。
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slice_mut(&self, offset: u64, len: usize) -> &mut [u8] {
        let offset = offset as usize;
        debug_assert!(offset + len <= self.size.get() as usize);

        unsafe {
            let mmap = &mut *self.mmap.get();
            &mut mmap[offset..offset + len]
        }
    }

    /// Read data at the specified position
    ///
    /// 在指定位置读取数据
    ///
    /// Reads are clamped to the region size; returns the number of bytes read.
    ///
    /// 读取会被钳制在区域大小内；返回实际读取的字节数。
    ///
    /// # Safety
    ///
    /// The caller must ensure no writes occur to the same region during reads.
    /// Concurrent reads are safe, but concurrent read-write to the same region
    /// leads to data races.
    ///
    /// # Safety
    ///
    /// 调用者需要确保不会在读取时写入同一区域。
    /// 并发读取是安全的，但读写同一区域会导致数据竞争。
    pub unsafe fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let offset = offset as usize;

        if offset >= self.size.get() as usize {
            return 0;
        }

        let available = (self.size.get() as usize - offset).min(buf.len());

        unsafe {
            let mmap = &*self.mmap.get();
            buf[..available].copy_from_slice(&mmap[offset..offset + available]);
        }

        available
    }

    /// Read a specific region into a new Vec
    ///
    /// 读取指定区域到新的 Vec
    ///
    /// # Safety
    /// Same contract as [`read_at`](Self::read_at)
    ///
    /// # Safety
    /// 与 [`read_at`](Self::read_at) 相同的约束
    pub unsafe fn read_slice(&self, offset: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        let read = unsafe { self.read_at(offset, &mut buf) };
        buf.truncate(read);
        buf
    }

    /// Borrow a 64-bit atomic cell inside the mapping
    ///
    /// 借出映射内部的 64 位原子单元
    ///
    /// Counter storage for the multi-process variant: all processes mapping
    /// the same file CAS and fetch-add on these cells directly.
    ///
    /// 多进程变体的计数器存储：映射同一文件的所有进程
    /// 直接对这些单元执行 CAS 和 fetch-add。
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `offset` is 8-byte aligned and `offset + 8` is within the region
    /// - The cell is only ever accessed atomically, by every mapper of the file
    ///
    /// # Safety
    ///
    /// 调用者需要确保：
    /// - `offset` 是 8 字节对齐的，且 `offset + 8` 在区域内
    /// - 该单元只被原子访问，文件的每个映射者都如此
    #[inline]
    pub unsafe fn atomic_u64(&self, offset: u64) -> &AtomicU64 {
        debug_assert!(offset % 8 == 0 && offset + 8 <= self.size.get());

        unsafe {
            let mmap = &mut *self.mmap.get();
            &*(mmap.as_mut_ptr().add(offset as usize) as *const AtomicU64)
        }
    }

    /// Borrow a signed 64-bit atomic cell inside the mapping
    ///
    /// 借出映射内部的有符号 64 位原子单元
    ///
    /// # Safety
    /// Same contract as [`atomic_u64`](Self::atomic_u64)
    ///
    /// # Safety
    /// 与 [`atomic_u64`](Self::atomic_u64) 相同的约束
    #[inline]
    pub unsafe fn atomic_i64(&self, offset: u64) -> &AtomicI64 {
        debug_assert!(offset % 8 == 0 && offset + 8 <= self.size.get());

        unsafe {
            let mmap = &mut *self.mmap.get();
            &*(mmap.as_mut_ptr().add(offset as usize) as *const AtomicI64)
        }
    }

    /// Fill the entire region with a specified byte
    ///
    /// 填充整个区域为指定字节
    ///
    /// Used by the fill-with-zeros option to pre-touch every page at creation.
    ///
    /// 供 fill-with-zeros 选项在创建时预触碰每个页面。
    ///
    /// # Safety
    ///
    /// The caller must ensure no other threads are reading or writing any part
    /// of the region during the fill.
    ///
    /// # Safety
    ///
    /// 调用者需要确保在填充期间没有其他线程正在读写区域的任何部分。
    pub unsafe fn fill(&self, byte: u8) {
        unsafe {
            let mmap = &mut *self.mmap.get();
            mmap.fill(byte);
        }
    }

    /// Flush data to disk asynchronously
    ///
    /// 异步刷新数据到磁盘
    ///
    /// Initiates an asynchronous flush operation without blocking for
    /// completion. The operating system will write data to disk in the
    /// background.
    ///
    /// 发起异步刷新操作，不会阻塞等待完成。操作系统会在后台将数据写入磁盘。
    pub fn flush(&self) -> Result<()> {
        unsafe {
            let mmap = &*self.mmap.get();
            Ok(mmap.flush_async()?)
        }
    }

    /// Flush data to disk synchronously
    ///
    /// 同步刷新数据到磁盘
    ///
    /// Blocks until the data has been written to disk. Slower than
    /// [`flush`](Self::flush) but guarantees durability on return.
    ///
    /// 阻塞直到数据写入磁盘。比 [`flush`](Self::flush) 慢，但返回时保证数据已落盘。
    ///
    /// # Safety
    ///
    /// During the flush, the caller must ensure no other threads are modifying
    /// the mapped memory.
    ///
    /// # Safety
    ///
    /// 在刷新期间，调用者需要确保没有其他线程正在修改映射的内存。
    pub unsafe fn sync_all(&self) -> Result<()> {
        unsafe {
            let mmap = &*self.mmap.get();
            Ok(mmap.flush()?)
        }
    }

    /// Get a raw pointer to the underlying mapping
    ///
    /// 获取底层映射的原始指针
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        unsafe {
            let mmap = &*self.mmap.get();
            mmap.as_ptr()
        }
    }

    /// Get a mutable raw pointer to the underlying mapping
    ///
    /// 获取底层映射的可变原始指针
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - No multiple mutable references are created
    /// - The pointer lifetime does not exceed MappedRegion
    /// - No concurrent access to overlapping memory regions
    ///
    /// # Safety
    ///
    /// 调用者需要确保：
    /// - 不会创建多个可变引用
    /// - 指针的生命周期不会超过 MappedRegion
    /// - 不会并发访问重叠的内存区域
    #[inline]
    pub unsafe fn as_mut_ptr(&self) -> *mut u8 {
        unsafe {
            let mmap = &mut *self.mmap.get();
            mmap.as_mut_ptr()
        }
    }
}

/// Implement Debug for MappedRegion
///
/// 为 MappedRegion 实现 Debug
impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("size", &self.size)
            .field("mmap", &"MmapMut")
            .finish()
    }
}

// Implement Send and Sync
// Safety: Safe as long as users ensure different threads write to non-overlapping regions
//
// 实现 Send 和 Sync
// Safety: 只要用户确保不同线程写入不重叠区域，就是安全的
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}
