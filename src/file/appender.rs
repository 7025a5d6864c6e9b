//! Concurrent single-file appender
//!
//! 并发单文件追加器

use byteorder::ByteOrder;
use std::fs::{File, OpenOptions};
use std::io;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use super::counters::{AppendCounters, local, shared};
use super::error::{Error, Result};
use super::region::MappedRegion;

/// Largest region size an appender will map
///
/// 追加器允许映射的最大区域大小
///
/// Granted offsets fit in 31 bits, matching the wire-friendly `int` offsets
/// the on-disk format was designed around.
///
/// 授予的偏移在 31 位以内，与磁盘格式设计时采用的 `int` 偏移保持一致。
const MAX_REGION_SIZE: u64 = i32::MAX as u64;

/// Single-process appender: counters in process memory, no file header
///
/// 单进程追加器：计数器在进程内存中，文件没有头部
pub type LocalAppender = Appender<local::Counters>;

/// Multi-process appender: counters in a 64-byte header at the start of the file
///
/// 多进程追加器：计数器位于文件起始的 64 字节头部中
pub type SharedAppender = Appender<shared::Counters>;

/// Lock-free multi-writer appender over one memory-mapped file
///
/// 单个内存映射文件上的无锁多写入者追加器
///
/// Any number of threads may call the write methods concurrently. Each write
/// reserves a distinct byte range by atomically bumping the next-write-offset,
/// copies its payload into the mapped region without locking, then credits the
/// write-complete mark. Once a reservation would run past capacity the file is
/// sealed: the final size is recorded and every later write reports
/// does-not-fit.
///
/// 任意数量的线程都可以并发调用写入方法。每次写入通过原子推进
/// 下一写入偏移来预留一段互不重叠的字节范围，在无锁状态下把负载
/// 拷入映射区域，然后记入写入完成标记。一旦某次预留越过容量，
/// 文件即被封存：记录最终大小，之后的所有写入都报告放不下。
///
/// # Features
///
/// - **Lock-free writes**: reservation is a single CAS; the copy itself runs
///   on a range no other writer can touch
/// - **Completion tracking**: observers trust bytes only up to the
///   write-complete mark, never the reservation mark
/// - **Sealing**: the first over-capacity reservation records the exact final
///   size, used to truncate the file on close
///
/// # 特性
///
/// - **无锁写入**：预留只是一次 CAS；拷贝发生在其他写入者无法触及的范围上
/// - **完成追踪**：观察者只信任写入完成标记之前的字节，而不是预留标记
/// - **封存**：第一个越过容量的预留记录精确的最终大小，关闭时用于截断文件
///
/// # Examples
///
/// ```
/// # use mmap_append::{LocalAppender, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("records.log");
/// # use std::num::NonZeroU64;
/// let file = LocalAppender::map_new(&path, NonZeroU64::new(64).unwrap(), false)?;
///
/// // Sequential grants are adjacent
/// // 顺序授予的偏移是相邻的
/// assert_eq!(file.write(b"hello"), Some(0));
/// assert_eq!(file.write(b"world"), Some(5));
///
/// file.close()?;
/// # Ok(())
/// # }
/// ```
///
/// Concurrent writers each receive a disjoint range:
///
/// 并发写入者各自获得互不重叠的范围：
///
/// ```
/// # use mmap_append::{LocalAppender, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// # let path = dir.path().join("concurrent.log");
/// # use std::num::NonZeroU64;
/// let file = LocalAppender::map_new(&path, NonZeroU64::new(4096).unwrap(), false)?;
///
/// std::thread::scope(|s| {
///     for worker in 0u8..4 {
///         let file = &file;
///         s.spawn(move || {
///             for _ in 0..16 {
///                 file.write(&[worker; 8]).unwrap();
///             }
///         });
///     }
/// });
///
/// assert!(!file.is_pending());
/// file.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Appender<C: AppendCounters> {
    /// Mapped byte region backing the file
    ///
    /// 文件背后的映射字节区域
    region: MappedRegion,

    /// Counter triple coordinating concurrent writers
    ///
    /// 协调并发写入者的计数器三元组
    counters: C,

    /// File handle, kept for truncation on close
    ///
    /// 文件句柄，保留用于关闭时截断
    file: File,

    /// Path of the underlying file
    ///
    /// 底层文件的路径
    path: PathBuf,

    /// Total region size including the counter header
    ///
    /// 含计数器头部的区域总大小
    size: u64,

    /// Set once by the first successful close
    ///
    /// 由第一次成功关闭置位
    closed: AtomicBool,
}

impl Appender<local::Counters> {
    /// Create a fresh single-process append file
    ///
    /// 创建全新的单进程追加文件
    ///
    /// Fails with [`Error::FileExists`] if `path` already exists: the
    /// single-process variant keeps no on-disk counter state, so re-mapping an
    /// existing file could silently overwrite records.
    ///
    /// 如果 `path` 已存在则以 [`Error::FileExists`] 失败：
    /// 单进程变体不在磁盘上保存计数器状态，重新映射已有文件可能悄悄覆盖记录。
    ///
    /// # Parameters
    /// - `path`: file to create
    /// - `capacity`: usable payload bytes
    /// - `fill_with_zeros`: pre-touch every page by filling the region
    ///
    /// # 参数
    /// - `path`: 要创建的文件
    /// - `capacity`: 可用负载字节数
    /// - `fill_with_zeros`: 通过填充区域预触碰每个页面
    ///
    /// # Examples
    ///
    /// ```
    /// # use mmap_append::{LocalAppender, Result};
    /// # use tempfile::tempdir;
    /// # fn main() -> Result<()> {
    /// # let dir = tempdir()?;
    /// # let path = dir.path().join("fresh.log");
    /// # use std::num::NonZeroU64;
    /// let file = LocalAppender::map_new(&path, NonZeroU64::new(128).unwrap(), false)?;
    /// assert_eq!(file.capacity(), 128);
    /// # Ok(())
    /// # }
    /// ```
    pub fn map_new(path: impl AsRef<Path>, capacity: NonZeroU64, fill_with_zeros: bool) -> Result<Self> {
        Self::create_new_file(path.as_ref(), capacity, fill_with_zeros)
    }
}

impl Appender<shared::Counters> {
    /// Create or attach to a multi-process append file
    ///
    /// 创建或挂接到多进程追加文件
    ///
    /// If `path` does not exist, the file is created at its full size and the
    /// counter header is initialized; if it does (or another process wins the
    /// creation race), the existing header is adopted so this process joins
    /// the producers already appending to the file.
    ///
    /// 如果 `path` 不存在，文件按完整大小创建并初始化计数器头部；
    /// 如果已存在（或其他进程赢得创建竞争），则采用已有头部，
    /// 本进程加入正在向该文件追加的生产者行列。
    pub fn map_new(path: impl AsRef<Path>, capacity: NonZeroU64, fill_with_zeros: bool) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::map_existing(path);
        }
        match Self::create_new_file(path, capacity, fill_with_zeros) {
            // Lost the creation race to another process: adopt its file
            // 创建竞争中输给了其他进程：采用它创建的文件
            Err(Error::FileExists { .. }) => Self::map_existing(path),
            other => other,
        }
    }

    /// Map an already-created multi-process append file
    ///
    /// 映射已创建的多进程追加文件
    ///
    /// The region size is taken from the file length; the counter header
    /// written by the creating process is adopted as-is, so appends continue
    /// exactly where every other mapper left off.
    ///
    /// 区域大小取自文件长度；创建进程写入的计数器头部被原样采用，
    /// 追加会精确地接在其他映射者之后。
    ///
    /// # Errors
    /// - [`Error::FileTooSmall`] if the file cannot hold the counter header
    /// - I/O errors from open or mmap, unchanged
    ///
    /// # Errors
    /// - 文件装不下计数器头部时返回 [`Error::FileTooSmall`]
    /// - 打开或映射的 I/O 错误原样传出
    pub fn map_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let size = file.metadata()?.len();
        if size <= shared::Counters::HEADER_SIZE {
            return Err(Error::FileTooSmall { actual: size });
        }

        let region = MappedRegion::map(&file, NonZeroU64::new(size).expect("size checked above"))?;
        let counters = shared::Counters::attach(&region, false);

        Ok(Self {
            region,
            counters,
            file,
            path: path.to_path_buf(),
            size,
            closed: AtomicBool::new(false),
        })
    }
}

impl<C: AppendCounters> Appender<C> {
    /// Create a strictly-fresh file of `capacity + HEADER_SIZE` bytes and map it
    ///
    /// 创建严格全新的 `capacity + HEADER_SIZE` 字节文件并映射
    pub(crate) fn create_new_file(path: &Path, capacity: NonZeroU64, fill_with_zeros: bool) -> Result<Self> {
        let size = capacity.get() + C::HEADER_SIZE;
        if size > MAX_REGION_SIZE {
            return Err(Error::InvalidCapacity { capacity: capacity.get() });
        }

        let file = match OpenOptions::new().read(true).write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::FileExists { path: path.to_path_buf() });
            }
            Err(err) => return Err(err.into()),
        };

        file.set_len(size)?;

        let region = MappedRegion::map(&file, NonZeroU64::new(size).expect("capacity is non-zero"))?;

        if fill_with_zeros {
            // Safety: the file was just created, no other thread can hold the region yet
            // Safety: 文件刚刚创建，尚无其他线程持有该区域
            unsafe { region.fill(0) };
        }

        // Fill first: initialization must land after the wipe
        // 先填充：初始化必须发生在清零之后
        let counters = C::attach(&region, true);

        Ok(Self {
            region,
            counters,
            file,
            path: path.to_path_buf(),
            size,
            closed: AtomicBool::new(false),
        })
    }

    /// Reserve `length` bytes, returning the granted offset
    ///
    /// 预留 `length` 字节并返回授予的偏移
    ///
    /// Returns `None` without modifying state once the file is full. The
    /// reservation that first runs past capacity seals the file: it records
    /// the final size and credits its own length to the write-complete mark so
    /// the mark can still catch up to the reservation mark.
    ///
    /// 文件已满时返回 `None` 且不修改状态。第一个越过容量的预留会封存文件：
    /// 记录最终大小，并把自己的长度记入写入完成标记，
    /// 使完成标记仍能追上预留标记。
    pub(crate) fn reserve(&self, length: u64) -> Option<u64> {
        loop {
            let offset = self.counters.next_offset();
            if offset >= self.size {
                // Space was exhausted before this call, nothing more can ever be written
                // 空间在本次调用前已耗尽，不可能再写入任何数据
                return None;
            }

            let new_offset = offset.saturating_add(length);
            if self.counters.try_reserve(offset, new_offset) {
                if new_offset <= self.size {
                    return Some(offset);
                }

                // First reservation that does not fit: seal at the pre-bump offset,
                // then credit the skipped bytes so write-complete can reach the mark
                // 第一个放不下的预留：以推进前的偏移封存，
                // 再记入被跳过的字节数，使写入完成标记能够到位
                self.counters.seal(offset);
                self.counters.add_write_complete(new_offset - offset);
                return None;
            }
        }
    }

    /// Credit `length` completed bytes
    ///
    /// 记入 `length` 个已完成字节
    #[inline]
    pub(crate) fn wrote(&self, length: u64) {
        self.counters.add_write_complete(length);
    }

    /// Append the given bytes
    ///
    /// 追加给定的字节
    ///
    /// Returns the offset the bytes were written at, or `None` if they do not
    /// fit in this file.
    ///
    /// 返回字节写入的偏移；放不下时返回 `None`。
    ///
    /// # Examples
    ///
    /// ```
    /// # use mmap_append::{LocalAppender, Result};
    /// # use tempfile::tempdir;
    /// # fn main() -> Result<()> {
    /// # let dir = tempdir()?;
    /// # let path = dir.path().join("bytes.log");
    /// # use std::num::NonZeroU64;
    /// let file = LocalAppender::map_new(&path, NonZeroU64::new(16).unwrap(), false)?;
    /// assert_eq!(file.write(b"0123456789"), Some(0));
    /// // 10 bytes used, 7 more do not fit
    /// // 已用 10 字节，再写 7 字节放不下
    /// assert_eq!(file.write(b"abcdefg"), None);
    /// # Ok(())
    /// # }
    /// ```
    pub fn write(&self, src: &[u8]) -> Option<u64> {
        let length = src.len() as u64;
        let offset = self.reserve(length)?;

        // Safety: the reservation grants exclusive access to [offset, offset + length)
        // Safety: 预留授予了对 [offset, offset + length) 的独占访问
        unsafe { self.region.put_bytes(offset, src) };

        self.wrote(length);
        Some(offset)
    }

    /// Append a string as one byte per character
    ///
    /// 以每字符一个字节追加字符串
    ///
    /// Characters outside the ASCII range are replaced by `'?'`.
    ///
    /// ASCII 范围之外的字符被替换为 `'?'`。
    pub fn write_ascii(&self, src: &str) -> Option<u64> {
        let length = src.chars().count() as u64;
        let offset = self.reserve(length)?;

        let mut position = offset;
        for c in src.chars() {
            let byte = if c.is_ascii() { c as u8 } else { b'?' };
            // Safety: position stays within the reserved range
            // Safety: position 始终在预留范围内
            unsafe { self.region.put_byte(position, byte) };
            position += 1;
        }

        self.wrote(length);
        Some(offset)
    }

    /// Append a string as two-byte UTF-16 code units in the byte order `E`
    ///
    /// 以字节序 `E` 按双字节 UTF-16 编码单元追加字符串
    ///
    /// # Examples
    ///
    /// ```
    /// # use mmap_append::{LocalAppender, Result};
    /// # use tempfile::tempdir;
    /// # use byteorder::LittleEndian;
    /// # fn main() -> Result<()> {
    /// # let dir = tempdir()?;
    /// # let path = dir.path().join("chars.log");
    /// # use std::num::NonZeroU64;
    /// let file = LocalAppender::map_new(&path, NonZeroU64::new(64).unwrap(), false)?;
    /// let offset = file.write_chars::<LittleEndian>("Hi").unwrap();
    /// assert_eq!(offset, 0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_chars<E: ByteOrder>(&self, src: &str) -> Option<u64> {
        let length = src.encode_utf16().count() as u64 * 2;
        let offset = self.reserve(length)?;

        let mut position = offset;
        for unit in src.encode_utf16() {
            // Safety: position stays within the reserved range
            // Safety: position 始终在预留范围内
            unsafe { self.region.put_u16::<E>(position, unit) };
            position += 2;
        }

        self.wrote(length);
        Some(offset)
    }

    /// Append one 64-bit integer in the byte order `E`
    ///
    /// 以字节序 `E` 追加一个 64 位整数
    pub fn write_u64<E: ByteOrder>(&self, value: u64) -> Option<u64> {
        let offset = self.reserve(8)?;

        // Safety: the reservation grants exclusive access to 8 bytes at offset
        // Safety: 预留授予了对 offset 处 8 字节的独占访问
        unsafe { self.region.put_u64::<E>(offset, value) };

        self.wrote(8);
        Some(offset)
    }

    /// Append several 64-bit integers as one contiguous record
    ///
    /// 将若干 64 位整数作为一条连续记录追加
    ///
    /// The values land adjacently, so the whole record either fits or the
    /// write reports `None`.
    ///
    /// 所有值相邻落盘，整条记录要么放得下，要么写入返回 `None`。
    pub fn write_u64s<E: ByteOrder>(&self, values: &[u64]) -> Option<u64> {
        let length = values.len() as u64 * 8;
        let offset = self.reserve(length)?;

        for (index, value) in values.iter().enumerate() {
            // Safety: every put stays within the reserved range
            // Safety: 每次写入都在预留范围内
            unsafe { self.region.put_u64::<E>(offset + index as u64 * 8, *value) };
        }

        self.wrote(length);
        Some(offset)
    }

    /// Append `length` bytes composed in place by a callback
    ///
    /// 追加由回调原地组装的 `length` 字节
    ///
    /// The callback receives a mutable window of exactly `length` bytes inside
    /// the mapped region and must fill all of it. Contextual values reach the
    /// callback through closure capture, so no allocation is needed on the
    /// write path.
    ///
    /// 回调获得映射区域内恰好 `length` 字节的可变窗口，必须全部填满。
    /// 上下文值通过闭包捕获传入，写入路径无需分配。
    ///
    /// Completion is credited even if the callback panics, so a faulty
    /// callback cannot leave the file pending forever.
    ///
    /// 即使回调 panic 也会记入完成计数，有缺陷的回调不会让文件永远 pending。
    ///
    /// # Examples
    ///
    /// ```
    /// # use mmap_append::{LocalAppender, Result};
    /// # use tempfile::tempdir;
    /// # fn main() -> Result<()> {
    /// # let dir = tempdir()?;
    /// # let path = dir.path().join("framed.log");
    /// # use std::num::NonZeroU64;
    /// let file = LocalAppender::map_new(&path, NonZeroU64::new(64).unwrap(), false)?;
    ///
    /// let sequence: u32 = 7;
    /// let offset = file.write_with(8, |dst| {
    ///     dst[..4].copy_from_slice(&sequence.to_le_bytes());
    ///     dst[4..].copy_from_slice(b"ping");
    /// });
    /// assert_eq!(offset, Some(0));
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_with<F>(&self, length: u64, f: F) -> Option<u64>
    where
        F: FnOnce(&mut [u8]),
    {
        let offset = self.reserve(length)?;

        let commit = CommitOnDrop { counters: &self.counters, length };
        // Safety: the reservation grants exclusive access to [offset, offset + length)
        // Safety: 预留授予了对 [offset, offset + length) 的独占访问
        let window = unsafe { self.region.slice_mut(offset, length as usize) };
        f(window);
        drop(commit);

        Some(offset)
    }

    /// Check if there are reserved writes that have not completed yet
    ///
    /// 检查是否存在尚未完成的预留写入
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.counters.next_offset() != self.counters.write_complete()
    }

    /// Check if all writes have completed and no write can ever succeed again
    ///
    /// 检查是否所有写入都已完成且不可能再有写入成功
    pub fn is_finished(&self) -> bool {
        let write_complete = self.counters.write_complete();
        let next_offset = self.counters.next_offset();
        write_complete == next_offset
            && next_offset >= self.size
            && self.counters.final_size() >= 0
    }

    /// Seal the file so no more writes can ever succeed
    ///
    /// 封存文件，使之后的写入不可能成功
    ///
    /// Works by reserving more bytes than any file can hold, which triggers
    /// the sealing branch of the reservation protocol. A no-op on an already
    /// sealed file.
    ///
    /// 通过预留超过任何文件所能容纳的字节数来触发预留协议的封存分支。
    /// 对已封存的文件是空操作。
    pub fn finish(&self) {
        let _ = self.reserve(MAX_REGION_SIZE);
    }

    /// Check if another reservation could still succeed
    ///
    /// 检查是否还可能有预留成功
    #[inline]
    pub fn has_available_capacity(&self) -> bool {
        self.counters.next_offset() < self.size
    }

    /// Usable payload capacity in bytes
    ///
    /// 可用负载容量（字节）
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.size - C::HEADER_SIZE
    }

    /// Total region size including the counter header
    ///
    /// 含计数器头部的区域总大小
    #[inline]
    pub fn region_size(&self) -> u64 {
        self.size
    }

    /// First payload offset; grants never fall below this
    ///
    /// 第一个负载偏移；授予的偏移不会低于它
    #[inline]
    pub fn header_size(&self) -> u64 {
        C::HEADER_SIZE
    }

    /// Current next-write-offset
    ///
    /// 当前下一写入偏移
    #[inline]
    pub fn next_offset(&self) -> u64 {
        self.counters.next_offset()
    }

    /// Current write-complete mark
    ///
    /// 当前写入完成标记
    ///
    /// Readers that scan the region must trust bytes up to this mark only;
    /// ranges between this mark and the next-write-offset may still be
    /// mid-copy.
    ///
    /// 扫描区域的读取者只能信任这个标记之前的字节；
    /// 这个标记与下一写入偏移之间的范围可能仍在拷贝中。
    #[inline]
    pub fn write_complete(&self) -> u64 {
        self.counters.write_complete()
    }

    /// Final size recorded at sealing, `-1` while the file is not sealed
    ///
    /// 封存时记录的最终大小，未封存时为 `-1`
    #[inline]
    pub fn final_size(&self) -> i64 {
        self.counters.final_size()
    }

    /// Path of the underlying file
    ///
    /// 底层文件的路径
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read bytes back out of the mapped region
    ///
    /// 从映射区域读回字节
    ///
    /// # Safety
    ///
    /// The caller must only read ranges at or below the
    /// [`write_complete`](Self::write_complete) mark observed beforehand;
    /// ranges above it may be written concurrently.
    ///
    /// # Safety
    ///
    /// 调用者只能读取事先观察到的 [`write_complete`](Self::write_complete)
    /// 标记之下的范围；标记之上的范围可能正被并发写入。
    pub unsafe fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        unsafe { self.region.read_at(offset, buf) }
    }

    /// Flush the mapped region to disk asynchronously
    ///
    /// 异步刷新映射区域到磁盘
    pub fn flush(&self) -> Result<()> {
        self.region.flush()
    }

    /// Close the file
    ///
    /// 关闭文件
    ///
    /// Fails with [`Error::PendingWrites`] while reserved writes are still
    /// completing; retry after the writers drain. If the file was sealed it is
    /// truncated to its final size, discarding the unused tail of the
    /// pre-sized region. The mapping itself is released when the last clone of
    /// the region drops. Closing twice is a no-op.
    ///
    /// 预留的写入尚未完成时以 [`Error::PendingWrites`] 失败；
    /// 等写入者排空后重试。若文件已封存则截断到最终大小，
    /// 丢弃预分配区域中未使用的尾部。映射本身在区域的最后一个克隆
    /// 释放时解除。重复关闭是空操作。
    pub fn close(&self) -> Result<()> {
        if self.is_pending() {
            return Err(Error::PendingWrites);
        }

        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let final_size = self.counters.final_size();
        if final_size >= 0 {
            self.file.set_len(final_size as u64)?;
        }

        Ok(())
    }
}

/// Credits the reserved length to the write-complete mark on drop
///
/// 在 drop 时把预留长度记入写入完成标记
///
/// The write-callback equivalent of committing in a `finally` block: the mark
/// must catch up to the reservation even when the callback panics.
///
/// 相当于在 `finally` 块中提交：即使回调 panic，
/// 完成标记也必须追上预留标记。
struct CommitOnDrop<'a, C: AppendCounters> {
    counters: &'a C,
    length: u64,
}

impl<C: AppendCounters> Drop for CommitOnDrop<'_, C> {
    fn drop(&mut self) {
        self.counters.add_write_complete(self.length);
    }
}

/// Implement Debug for Appender
///
/// 为 Appender 实现 Debug
impl<C: AppendCounters> std::fmt::Debug for Appender<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Appender")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("next_offset", &self.counters.next_offset())
            .field("write_complete", &self.counters.write_complete())
            .field("final_size", &self.counters.final_size())
            .finish()
    }
}
