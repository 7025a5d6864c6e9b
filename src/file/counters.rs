//! Counter storage for the append protocol
//!
//! 追加协议的计数器存储
//!
//! An appender coordinates concurrent writers through three 64-bit counters:
//! the next-write-offset `N`, the write-complete mark `W`, and the final size
//! `F` (`-1` until the file is sealed). The two implementations differ only in
//! where the triple lives:
//!
//! - [`local::Counters`]: process-private atomics; visible to the threads of
//!   this process only
//! - [`shared::Counters`]: atomics resident in a fixed header at the start of
//!   the mapped region; visible to every process mapping the same file
//!
//! appender 通过三个 64 位计数器协调并发写入者：
//! 下一写入偏移 `N`、写入完成标记 `W`、最终大小 `F`（封存前为 `-1`）。
//! 两种实现只在三元组的存放位置上不同：
//!
//! - [`local::Counters`]: 进程私有原子变量，仅本进程线程可见
//! - [`shared::Counters`]: 位于映射区域起始固定头部的原子变量，
//!   映射同一文件的所有进程都可见

pub mod local;
pub mod shared;

use super::region::MappedRegion;

/// Storage abstraction for the `(N, W, F)` counter triple
///
/// `(N, W, F)` 计数器三元组的存储抽象
///
/// All orderings are fixed by the trait contract so the reservation protocol
/// behaves identically over both storages:
///
/// - `N`: load Acquire, CAS AcqRel
/// - `W`: fetch-add Release (payload writes happen-before the credit),
///   load Acquire
/// - `F`: CAS from the `-1` sentinel with Release so only the first sealer
///   wins, load Acquire
///
/// 所有内存序都由 trait 约定固定，使预留协议在两种存储上行为一致：
///
/// - `N`: Acquire 加载，AcqRel CAS
/// - `W`: Release fetch-add（负载写入 happens-before 完成计数），Acquire 加载
/// - `F`: 从 `-1` 哨兵值 Release CAS，只有第一个封存者生效，Acquire 加载
pub trait AppendCounters: Send + Sync + 'static {
    /// Bytes reserved at the start of the region for counter storage.
    /// Payload offsets start here.
    ///
    /// 区域起始处为计数器存储预留的字节数。负载偏移从这里开始。
    const HEADER_SIZE: u64;

    /// Construct counters over a freshly mapped region.
    ///
    /// 在刚映射的区域上构造计数器。
    ///
    /// With `initialize` set, the storage is reset to the initial triple
    /// `(HEADER_SIZE, HEADER_SIZE, -1)`; otherwise the values already present
    /// in the storage are adopted (re-mapping an existing shared file).
    ///
    /// `initialize` 为真时，存储被重置为初始三元组
    /// `(HEADER_SIZE, HEADER_SIZE, -1)`；否则采用存储中已有的值
    /// （重新映射已存在的共享文件）。
    fn attach(region: &MappedRegion, initialize: bool) -> Self;

    /// Current next-write-offset `N`
    ///
    /// 当前下一写入偏移 `N`
    fn next_offset(&self) -> u64;

    /// Try to advance `N` from `current` to `new`. Returns false if another
    /// writer won the race.
    ///
    /// 尝试把 `N` 从 `current` 推进到 `new`。若其他写入者抢先则返回 false。
    fn try_reserve(&self, current: u64, new: u64) -> bool;

    /// Current write-complete mark `W`
    ///
    /// 当前写入完成标记 `W`
    fn write_complete(&self) -> u64;

    /// Credit `length` completed bytes to `W`
    ///
    /// 向 `W` 记入 `length` 个已完成字节
    fn add_write_complete(&self, length: u64);

    /// Current final size `F`, `-1` while the file is not sealed
    ///
    /// 当前最终大小 `F`，未封存时为 `-1`
    fn final_size(&self) -> i64;

    /// Seal the file at `final_size`. Only the first call wins; later calls
    /// return false and leave `F` untouched.
    ///
    /// 以 `final_size` 封存文件。只有第一次调用生效；
    /// 之后的调用返回 false 且不改动 `F`。
    fn seal(&self, final_size: u64) -> bool;
}
