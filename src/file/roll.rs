//! Rolling coordination across append files
//!
//! 追加文件间的滚动协调

use arc_swap::ArcSwap;
use std::hint;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use tracing::error;
use super::appender::Appender;
use super::counters::AppendCounters;
use super::error::Result;
use super::provider::FileProvider;

/// Listener invoked with the path of the file an event concerns
///
/// 以事件所涉文件的路径调用的监听器
pub type FileEventListener = Box<dyn Fn(&Path) + Send + Sync>;

/// Optional hooks fired around the lifecycle of rolled files
///
/// 围绕滚动文件生命周期触发的可选钩子
///
/// - `file_created`: a fresh file exists on disk
/// - `file_mapped`: a fresh file was published as the current append target
/// - `file_complete`: an exhausted file has drained all pending writes
/// - `file_closed`: an exhausted file was closed (and truncated if sealed)
///
/// - `file_created`: 新文件已在磁盘上创建
/// - `file_mapped`: 新文件已发布为当前追加目标
/// - `file_complete`: 写满的文件已排空所有未完成写入
/// - `file_closed`: 写满的文件已关闭（若封存则已截断）
///
/// A panicking listener is caught, reported through `tracing`, and swallowed:
/// one bad hook must not wedge rolling.
///
/// 监听器 panic 会被捕获、经 `tracing` 上报并吞掉：
/// 一个坏钩子不能卡住滚动。
#[derive(Default)]
pub struct RollListeners {
    pub(crate) file_created: Option<FileEventListener>,
    pub(crate) file_mapped: Option<FileEventListener>,
    pub(crate) file_complete: Option<FileEventListener>,
    pub(crate) file_closed: Option<FileEventListener>,
}

impl RollListeners {
    fn notify(listener: &Option<FileEventListener>, event: &'static str, path: &Path) {
        if let Some(listener) = listener {
            if catch_unwind(AssertUnwindSafe(|| listener(path))).is_err() {
                error!(listener = event, path = %path.display(), "file listener panicked");
            }
        }
    }

    pub(crate) fn notify_created(&self, path: &Path) {
        Self::notify(&self.file_created, "created", path);
    }

    pub(crate) fn notify_mapped(&self, path: &Path) {
        Self::notify(&self.file_mapped, "mapped", path);
    }

    pub(crate) fn notify_complete(&self, path: &Path) {
        Self::notify(&self.file_complete, "complete", path);
    }

    pub(crate) fn notify_closed(&self, path: &Path) {
        Self::notify(&self.file_closed, "closed", path);
    }
}

impl std::fmt::Debug for RollListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollListeners")
            .field("file_created", &self.file_created.is_some())
            .field("file_mapped", &self.file_mapped.is_some())
            .field("file_complete", &self.file_complete.is_some())
            .field("file_closed", &self.file_closed.is_some())
            .finish()
    }
}

/// Selects exactly one thread to roll to the next append file
///
/// 挑选恰好一个线程滚动到下一个追加文件
///
/// Holds the current appender behind a lock-free pointer. Writers that find
/// the current file exhausted contend on a single CAS flag; the winner maps
/// the successor from the [`FileProvider`], publishes it, and initiates the
/// close of the exhausted file, while losers simply adopt the new current.
/// The flag is a non-blocking mutex: contention only ever happens at file
/// boundaries, so the spin window is the provider's file-creation cost.
///
/// 当前追加器保存在一个无锁指针后面。发现当前文件已满的写入者
/// 在单个 CAS 标志上竞争；胜者从 [`FileProvider`] 映射后继文件、
/// 发布它并发起对已满文件的关闭，败者直接采用新的当前文件。
/// 该标志是非阻塞互斥：竞争只发生在文件边界，
/// 自旋窗口就是提供者创建文件的开销。
pub struct RollingCoordinator<C: AppendCounters> {
    /// Current append target, swapped only while holding the allocating flag
    ///
    /// 当前追加目标，仅在持有分配标志时换入
    current: ArcSwap<Appender<C>>,

    /// Non-blocking mutex guarding the current-appender swap
    ///
    /// 守护当前追加器换入的非阻塞互斥
    allocating: AtomicBool,

    provider: FileProvider<C>,
    async_close: bool,
    yield_on_allocate_contention: bool,
    listeners: Arc<RollListeners>,

    /// Name counter for one-shot close threads
    ///
    /// 一次性关闭线程的命名计数
    close_sequence: AtomicU64,
}

impl<C: AppendCounters> RollingCoordinator<C> {
    /// Create a coordinator and map the first file
    ///
    /// 创建协调器并映射第一个文件
    pub fn new(
        provider: FileProvider<C>,
        async_close: bool,
        yield_on_allocate_contention: bool,
        listeners: Arc<RollListeners>,
    ) -> Result<Self> {
        let first = provider.next_file()?;
        listeners.notify_mapped(first.path());

        Ok(Self {
            current: ArcSwap::from(first),
            allocating: AtomicBool::new(false),
            provider,
            async_close,
            yield_on_allocate_contention,
            listeners,
            close_sequence: AtomicU64::new(0),
        })
    }

    /// The current append target
    ///
    /// 当前追加目标
    #[inline]
    pub fn current(&self) -> Arc<Appender<C>> {
        self.current.load_full()
    }

    /// Return an appender with available capacity, rolling if necessary
    ///
    /// 返回仍有容量的追加器，必要时滚动
    ///
    /// The fast path is a single pointer load. On exhaustion, exactly one
    /// caller maps the successor; every other caller observes the published
    /// swap and returns the new current.
    ///
    /// 快路径只是一次指针加载。文件耗尽时，恰好一个调用者映射后继文件；
    /// 其余调用者观察到已发布的换入并返回新的当前文件。
    pub fn file_for_write(&self) -> Result<Arc<Appender<C>>> {
        let current = self.current.load_full();
        if current.has_available_capacity() {
            return Ok(current);
        }

        let _lock = self.allocate_lock();

        let observed = self.current.load_full();
        if !Arc::ptr_eq(&observed, &current) {
            // Another thread already rolled while we contended for the flag
            // 争抢标志期间其他线程已完成滚动
            return Ok(observed);
        }

        let next = self.provider.next_file()?;
        self.current.store(Arc::clone(&next));
        self.listeners.notify_mapped(next.path());

        self.close_exhausted(current);

        Ok(next)
    }

    /// Drain and close the current file synchronously
    ///
    /// 同步排空并关闭当前文件
    ///
    /// Shutdown path; the coordinator must not be handed new writes afterward.
    ///
    /// 停机路径；此后不得再向协调器提交写入。
    pub fn close(&self) {
        let current = self.current.load_full();
        Self::drain_and_close(current, &self.listeners, self.yield_on_allocate_contention);
    }

    fn allocate_lock(&self) -> AllocateGuard<'_> {
        while self
            .allocating
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            if self.yield_on_allocate_contention {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }
        AllocateGuard { flag: &self.allocating }
    }

    fn close_exhausted(&self, exhausted: Arc<Appender<C>>) {
        let yield_hint = self.yield_on_allocate_contention;

        if self.async_close {
            let appender = Arc::clone(&exhausted);
            let listeners = Arc::clone(&self.listeners);
            let name = format!(
                "mmap-append-close-{}",
                self.close_sequence.fetch_add(1, Ordering::Relaxed)
            );
            let spawned = thread::Builder::new()
                .name(name)
                .spawn(move || Self::drain_and_close(appender, &listeners, yield_hint));

            if let Err(err) = spawned {
                error!("failed to spawn close thread, closing synchronously: {err}");
                Self::drain_and_close(exhausted, &self.listeners, yield_hint);
            }
        } else {
            Self::drain_and_close(exhausted, &self.listeners, yield_hint);
        }
    }

    /// Wait for pending writes to drain, then complete and close the file
    ///
    /// 等待未完成写入排空，然后完成并关闭文件
    ///
    /// Pending writers only hold their slot for the duration of a memcpy, so
    /// the wait is a short spin rather than a condition variable.
    ///
    /// 未完成的写入者只在一次 memcpy 的时间里占据槽位，
    /// 因此等待用短自旋而不是条件变量。
    fn drain_and_close(appender: Arc<Appender<C>>, listeners: &RollListeners, yield_hint: bool) {
        while appender.is_pending() {
            if yield_hint {
                thread::yield_now();
            } else {
                hint::spin_loop();
            }
        }

        listeners.notify_complete(appender.path());

        if let Err(err) = appender.close() {
            error!(path = %appender.path().display(), "failed to close exhausted file: {err}");
        }

        listeners.notify_closed(appender.path());
    }
}

/// Releases the allocating flag on drop
///
/// 在 drop 时释放分配标志
///
/// The flag must come loose even when the provider fails mid-roll.
///
/// 即使提供者在滚动途中失败，标志也必须被释放。
struct AllocateGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for AllocateGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Implement Debug for RollingCoordinator
///
/// 为 RollingCoordinator 实现 Debug
impl<C: AppendCounters> std::fmt::Debug for RollingCoordinator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingCoordinator")
            .field("provider", &self.provider)
            .field("async_close", &self.async_close)
            .field("yield_on_allocate_contention", &self.yield_on_allocate_contention)
            .finish()
    }
}
