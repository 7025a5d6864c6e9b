//! Fluent configuration and the uniform append surface
//!
//! 流式配置与统一追加接口

use byteorder::ByteOrder;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use super::appender::{LocalAppender, SharedAppender};
use super::counters::{local, shared};
use super::error::{Error, Result};
use super::provider::FileProvider;
use super::roll::{RollListeners, RollingCoordinator};
use super::rolling::RollingAppender;

/// Roll sub-configuration of [`OpenOptions`]
///
/// [`OpenOptions`] 的滚动子配置
///
/// Disabled by default. When enabled, the mapped location is treated as a
/// directory and writes roll transparently across a sequence of files named
/// `{prefix}{timestamp}-{sequence}{suffix}`.
///
/// 默认关闭。开启后，映射位置被当作目录，
/// 写入在名为 `{prefix}{timestamp}-{sequence}{suffix}` 的一串文件间透明滚动。
pub struct RollOptions {
    pub(crate) enabled: bool,
    pub(crate) file_name_prefix: String,
    pub(crate) file_name_suffix: String,
    pub(crate) async_close: bool,
    pub(crate) yield_on_allocate_contention: bool,
    pub(crate) listeners: RollListeners,
}

impl Default for RollOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            file_name_prefix: String::new(),
            file_name_suffix: String::new(),
            async_close: false,
            yield_on_allocate_contention: true,
            listeners: RollListeners::default(),
        }
    }
}

impl RollOptions {
    /// Enable or disable rolling
    ///
    /// 开启或关闭滚动
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Prefix of generated file names
    ///
    /// 生成文件名的前缀
    pub fn file_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_name_prefix = prefix.into();
        self
    }

    /// Suffix of generated file names
    ///
    /// 生成文件名的后缀
    pub fn file_name_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.file_name_suffix = suffix.into();
        self
    }

    /// Close exhausted files on a background one-shot thread
    ///
    /// 在后台一次性线程上关闭写满的文件
    pub fn async_close(mut self, async_close: bool) -> Self {
        self.async_close = async_close;
        self
    }

    /// Yield the thread while spinning on the allocation flag or on pending
    /// writes, instead of busy-spinning
    ///
    /// 在分配标志或未完成写入上自旋时让出线程，而不是忙等
    pub fn yield_on_allocate_contention(mut self, yield_on_contention: bool) -> Self {
        self.yield_on_allocate_contention = yield_on_contention;
        self
    }

    /// Invoked after a fresh file is created on disk
    ///
    /// 新文件在磁盘上创建后调用
    pub fn file_created_listener(mut self, listener: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.listeners.file_created = Some(Box::new(listener));
        self
    }

    /// Invoked after a fresh file is published as the current append target
    ///
    /// 新文件发布为当前追加目标后调用
    pub fn file_mapped_listener(mut self, listener: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.listeners.file_mapped = Some(Box::new(listener));
        self
    }

    /// Invoked once an exhausted file has drained all pending writes
    ///
    /// 写满的文件排空所有未完成写入后调用
    pub fn file_complete_listener(mut self, listener: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.listeners.file_complete = Some(Box::new(listener));
        self
    }

    /// Invoked after an exhausted file was closed
    ///
    /// 写满的文件关闭后调用
    pub fn file_closed_listener(mut self, listener: impl Fn(&Path) + Send + Sync + 'static) -> Self {
        self.listeners.file_closed = Some(Box::new(listener));
        self
    }
}

/// Fluent builder for every appender configuration
///
/// 覆盖所有追加器配置的流式构建器
///
/// Selects between the four concrete forms (bounded or rolling, crossed with
/// single-process or multi-process counters) and returns them behind the
/// uniform [`AppendFile`] surface.
///
/// 在四种具体形态（有界或滚动，乘以单进程或多进程计数器）之间选择，
/// 并以统一的 [`AppendFile`] 接口返回。
///
/// # Examples
///
/// A bounded single-process file:
///
/// 有界的单进程文件：
///
/// ```
/// # use mmap_append::{OpenOptions, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// use std::num::NonZeroU64;
///
/// let file = OpenOptions::new()
///     .location(dir.path().join("bounded.log"))
///     .capacity(NonZeroU64::new(128).unwrap())
///     .map()?;
///
/// assert_eq!(file.write(b"hello")?, Some(0));
/// file.close()?;
/// # Ok(())
/// # }
/// ```
///
/// A rolling stream of files in a directory:
///
/// 目录中滚动的文件流：
///
/// ```
/// # use mmap_append::{OpenOptions, Result};
/// # use tempfile::tempdir;
/// # fn main() -> Result<()> {
/// # let dir = tempdir()?;
/// use std::num::NonZeroU64;
///
/// let log = OpenOptions::new()
///     .location(dir.path())
///     .capacity(NonZeroU64::new(1024).unwrap())
///     .roll(|roll| roll
///         .enabled(true)
///         .file_name_prefix("events-")
///         .file_name_suffix(".log"))
///     .map()?;
///
/// log.write(b"first record")?;
/// log.close()?;
/// # Ok(())
/// # }
/// ```
pub struct OpenOptions {
    location: Option<PathBuf>,
    capacity: Option<NonZeroU64>,
    fill_with_zeros: bool,
    multi_process: bool,
    roll: RollOptions,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenOptions {
    /// Create options with rolling disabled and single-process counters
    ///
    /// 创建默认配置：关闭滚动，使用单进程计数器
    pub fn new() -> Self {
        Self {
            location: None,
            capacity: None,
            fill_with_zeros: false,
            multi_process: false,
            roll: RollOptions::default(),
        }
    }

    /// Target location: a file path, or a directory when rolling is enabled
    ///
    /// 目标位置：文件路径；开启滚动时为目录
    pub fn location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Usable payload capacity of each file in bytes
    ///
    /// 每个文件的可用负载容量（字节）
    pub fn capacity(mut self, capacity: NonZeroU64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Pre-touch every page of fresh files by filling them with zeros
    ///
    /// 通过零填充预触碰新文件的每个页面
    pub fn fill_with_zeros(mut self, fill_with_zeros: bool) -> Self {
        self.fill_with_zeros = fill_with_zeros;
        self
    }

    /// Keep the counters in a file header so multiple processes can append
    ///
    /// 将计数器放入文件头部，使多个进程可以共同追加
    pub fn multi_process(mut self, multi_process: bool) -> Self {
        self.multi_process = multi_process;
        self
    }

    /// Configure rolling through a closure over [`RollOptions`]
    ///
    /// 通过针对 [`RollOptions`] 的闭包配置滚动
    pub fn roll(mut self, configure: impl FnOnce(RollOptions) -> RollOptions) -> Self {
        self.roll = configure(self.roll);
        self
    }

    /// Map the configured appender
    ///
    /// 映射所配置的追加器
    ///
    /// # Errors
    /// - [`Error::MissingLocation`] / [`Error::MissingCapacity`] on incomplete
    ///   configuration
    /// - Everything the selected variant's constructor can fail with
    ///
    /// # Errors
    /// - 配置不完整时返回 [`Error::MissingLocation`] / [`Error::MissingCapacity`]
    /// - 以及所选形态构造函数可能返回的全部错误
    pub fn map(self) -> Result<AppendFile> {
        let location = self.location.ok_or(Error::MissingLocation)?;
        let capacity = self.capacity.ok_or(Error::MissingCapacity)?;

        if self.roll.enabled {
            let RollOptions {
                file_name_prefix,
                file_name_suffix,
                async_close,
                yield_on_allocate_contention,
                listeners,
                ..
            } = self.roll;
            let listeners = Arc::new(listeners);

            if self.multi_process {
                let provider = FileProvider::<shared::Counters>::new(
                    location,
                    file_name_prefix,
                    file_name_suffix,
                    capacity,
                    self.fill_with_zeros,
                    Arc::clone(&listeners),
                )?;
                let coordinator = RollingCoordinator::new(
                    provider,
                    async_close,
                    yield_on_allocate_contention,
                    listeners,
                )?;
                Ok(AppendFile::RollingShared(RollingAppender::new(coordinator)))
            } else {
                let provider = FileProvider::<local::Counters>::new(
                    location,
                    file_name_prefix,
                    file_name_suffix,
                    capacity,
                    self.fill_with_zeros,
                    Arc::clone(&listeners),
                )?;
                let coordinator = RollingCoordinator::new(
                    provider,
                    async_close,
                    yield_on_allocate_contention,
                    listeners,
                )?;
                Ok(AppendFile::RollingLocal(RollingAppender::new(coordinator)))
            }
        } else if self.multi_process {
            Ok(AppendFile::Shared(SharedAppender::map_new(
                &location,
                capacity,
                self.fill_with_zeros,
            )?))
        } else {
            Ok(AppendFile::Local(LocalAppender::map_new(
                &location,
                capacity,
                self.fill_with_zeros,
            )?))
        }
    }
}

/// The uniform appender surface the builder returns
///
/// 构建器返回的统一追加接口
///
/// Bounded forms report does-not-fit as `Ok(None)`, the caller's signal to
/// stop or switch. Rolling forms never report `Ok(None)`: a record either
/// lands (possibly after a roll) or fails with a real error.
///
/// 有界形态以 `Ok(None)` 报告放不下，这是调用者停止或切换的信号。
/// 滚动形态从不返回 `Ok(None)`：一条记录要么落盘（可能在滚动之后），
/// 要么因真实错误失败。
#[derive(Debug)]
pub enum AppendFile {
    /// Bounded single-process file
    ///
    /// 有界单进程文件
    Local(LocalAppender),

    /// Bounded multi-process file
    ///
    /// 有界多进程文件
    Shared(SharedAppender),

    /// Rolling stream of single-process files
    ///
    /// 单进程文件的滚动流
    RollingLocal(RollingAppender<local::Counters>),

    /// Rolling stream of multi-process files
    ///
    /// 多进程文件的滚动流
    RollingShared(RollingAppender<shared::Counters>),
}

impl AppendFile {
    /// Append the given bytes
    ///
    /// 追加给定的字节
    pub fn write(&self, src: &[u8]) -> Result<Option<u64>> {
        match self {
            AppendFile::Local(file) => Ok(file.write(src)),
            AppendFile::Shared(file) => Ok(file.write(src)),
            AppendFile::RollingLocal(file) => file.write(src).map(Some),
            AppendFile::RollingShared(file) => file.write(src).map(Some),
        }
    }

    /// Append a string as one byte per character, non-ASCII replaced by `'?'`
    ///
    /// 以每字符一个字节追加字符串，非 ASCII 字符替换为 `'?'`
    pub fn write_ascii(&self, src: &str) -> Result<Option<u64>> {
        match self {
            AppendFile::Local(file) => Ok(file.write_ascii(src)),
            AppendFile::Shared(file) => Ok(file.write_ascii(src)),
            AppendFile::RollingLocal(file) => file.write_ascii(src).map(Some),
            AppendFile::RollingShared(file) => file.write_ascii(src).map(Some),
        }
    }

    /// Append a string as two-byte UTF-16 code units in the byte order `E`
    ///
    /// 以字节序 `E` 按双字节 UTF-16 编码单元追加字符串
    pub fn write_chars<E: ByteOrder>(&self, src: &str) -> Result<Option<u64>> {
        match self {
            AppendFile::Local(file) => Ok(file.write_chars::<E>(src)),
            AppendFile::Shared(file) => Ok(file.write_chars::<E>(src)),
            AppendFile::RollingLocal(file) => file.write_chars::<E>(src).map(Some),
            AppendFile::RollingShared(file) => file.write_chars::<E>(src).map(Some),
        }
    }

    /// Append one 64-bit integer in the byte order `E`
    ///
    /// 以字节序 `E` 追加一个 64 位整数
    pub fn write_u64<E: ByteOrder>(&self, value: u64) -> Result<Option<u64>> {
        match self {
            AppendFile::Local(file) => Ok(file.write_u64::<E>(value)),
            AppendFile::Shared(file) => Ok(file.write_u64::<E>(value)),
            AppendFile::RollingLocal(file) => file.write_u64::<E>(value).map(Some),
            AppendFile::RollingShared(file) => file.write_u64::<E>(value).map(Some),
        }
    }

    /// Append several 64-bit integers as one contiguous record
    ///
    /// 将若干 64 位整数作为一条连续记录追加
    pub fn write_u64s<E: ByteOrder>(&self, values: &[u64]) -> Result<Option<u64>> {
        match self {
            AppendFile::Local(file) => Ok(file.write_u64s::<E>(values)),
            AppendFile::Shared(file) => Ok(file.write_u64s::<E>(values)),
            AppendFile::RollingLocal(file) => file.write_u64s::<E>(values).map(Some),
            AppendFile::RollingShared(file) => file.write_u64s::<E>(values).map(Some),
        }
    }

    /// Append `length` bytes composed in place by a callback
    ///
    /// 追加由回调原地组装的 `length` 字节
    ///
    /// `FnMut` because the rolling forms may retry the write on a fresh file.
    ///
    /// 要求 `FnMut`，因为滚动形态可能在新文件上重试写入。
    pub fn write_with<F>(&self, length: u64, mut f: F) -> Result<Option<u64>>
    where
        F: FnMut(&mut [u8]),
    {
        match self {
            AppendFile::Local(file) => Ok(file.write_with(length, &mut f)),
            AppendFile::Shared(file) => Ok(file.write_with(length, &mut f)),
            AppendFile::RollingLocal(file) => file.write_with(length, f).map(Some),
            AppendFile::RollingShared(file) => file.write_with(length, f).map(Some),
        }
    }

    /// Check if there are reserved writes that have not completed yet
    ///
    /// 检查是否存在尚未完成的预留写入
    pub fn is_pending(&self) -> bool {
        match self {
            AppendFile::Local(file) => file.is_pending(),
            AppendFile::Shared(file) => file.is_pending(),
            AppendFile::RollingLocal(file) => file.is_pending(),
            AppendFile::RollingShared(file) => file.is_pending(),
        }
    }

    /// Check if no write can ever succeed again
    ///
    /// 检查是否不可能再有写入成功
    ///
    /// Always false for the rolling forms.
    ///
    /// 对滚动形态恒为 false。
    pub fn is_finished(&self) -> bool {
        match self {
            AppendFile::Local(file) => file.is_finished(),
            AppendFile::Shared(file) => file.is_finished(),
            AppendFile::RollingLocal(file) => file.is_finished(),
            AppendFile::RollingShared(file) => file.is_finished(),
        }
    }

    /// Seal the current file
    ///
    /// 封存当前文件
    ///
    /// On the rolling forms this forces the next write to roll.
    ///
    /// 对滚动形态而言，这会迫使下一次写入滚动。
    pub fn finish(&self) {
        match self {
            AppendFile::Local(file) => file.finish(),
            AppendFile::Shared(file) => file.finish(),
            AppendFile::RollingLocal(file) => file.finish(),
            AppendFile::RollingShared(file) => file.finish(),
        }
    }

    /// Path of the file currently being appended to
    ///
    /// 当前正被追加的文件的路径
    pub fn path(&self) -> PathBuf {
        match self {
            AppendFile::Local(file) => file.path().to_path_buf(),
            AppendFile::Shared(file) => file.path().to_path_buf(),
            AppendFile::RollingLocal(file) => file.path(),
            AppendFile::RollingShared(file) => file.path(),
        }
    }

    /// Close the appender
    ///
    /// 关闭追加器
    pub fn close(&self) -> Result<()> {
        match self {
            AppendFile::Local(file) => file.close(),
            AppendFile::Shared(file) => file.close(),
            AppendFile::RollingLocal(file) => {
                file.close();
                Ok(())
            }
            AppendFile::RollingShared(file) => {
                file.close();
                Ok(())
            }
        }
    }
}
