//! Provider of freshly mapped append files
//!
//! 新映射追加文件的提供者

use std::fs;
use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use super::appender::Appender;
use super::counters::AppendCounters;
use super::error::{Error, Result};
use super::roll::RollListeners;

/// Produces a stream of freshly created appenders on demand
///
/// 按需产出一串全新创建的追加器
///
/// Each file name combines the configured prefix and suffix with the current
/// wall-clock time in milliseconds and a monotonic sequence number, so rolls
/// in quick succession still land on distinct names. A name collision on disk
/// simply retries with the next sequence value.
///
/// 每个文件名由配置的前后缀、当前毫秒级墙钟时间和单调序号组成，
/// 因此快速连续的滚动也会落在不同的名字上。
/// 磁盘上的名字冲突只需用下一个序号重试。
pub struct FileProvider<C: AppendCounters> {
    /// Directory the files are created in
    ///
    /// 文件创建所在的目录
    directory: PathBuf,

    /// File name prefix
    ///
    /// 文件名前缀
    file_name_prefix: String,

    /// File name suffix
    ///
    /// 文件名后缀
    file_name_suffix: String,

    /// Usable payload capacity of each file
    ///
    /// 每个文件的可用负载容量
    capacity: NonZeroU64,

    /// Pre-touch pages of fresh files
    ///
    /// 预触碰新文件的页面
    fill_with_zeros: bool,

    /// Monotonic tiebreaker for file names
    ///
    /// 文件名的单调序号
    sequence: AtomicU64,

    /// Listener hooks shared with the rolling coordinator
    ///
    /// 与滚动协调器共享的监听器钩子
    listeners: Arc<RollListeners>,

    _variant: PhantomData<C>,
}

impl<C: AppendCounters> FileProvider<C> {
    /// Create a provider, creating the target directory if needed
    ///
    /// 创建提供者，必要时创建目标目录
    pub fn new(
        directory: impl Into<PathBuf>,
        file_name_prefix: impl Into<String>,
        file_name_suffix: impl Into<String>,
        capacity: NonZeroU64,
        fill_with_zeros: bool,
        listeners: Arc<RollListeners>,
    ) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        Ok(Self {
            directory,
            file_name_prefix: file_name_prefix.into(),
            file_name_suffix: file_name_suffix.into(),
            capacity,
            fill_with_zeros,
            sequence: AtomicU64::new(0),
            listeners,
            _variant: PhantomData,
        })
    }

    /// Create and map the next fresh append file
    ///
    /// 创建并映射下一个全新追加文件
    ///
    /// Fires the file-created listener once the file exists on disk.
    ///
    /// 文件在磁盘上创建完成后触发 file-created 监听器。
    pub fn next_file(&self) -> Result<Arc<Appender<C>>> {
        loop {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis())
                .unwrap_or(0);
            let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

            let name = format!(
                "{}{}-{}{}",
                self.file_name_prefix, millis, sequence, self.file_name_suffix
            );
            let path = self.directory.join(name);

            match Appender::<C>::create_new_file(&path, self.capacity, self.fill_with_zeros) {
                Ok(appender) => {
                    self.listeners.notify_created(appender.path());
                    return Ok(Arc::new(appender));
                }
                // Collision with an existing file: retry with the next sequence value
                // 与已有文件冲突：用下一个序号重试
                Err(Error::FileExists { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Usable payload capacity of the files this provider creates
    ///
    /// 该提供者创建的文件的可用负载容量
    #[inline]
    pub fn capacity(&self) -> NonZeroU64 {
        self.capacity
    }

    /// Directory the files are created in
    ///
    /// 文件创建所在的目录
    #[inline]
    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }
}

/// Implement Debug for FileProvider
///
/// 为 FileProvider 实现 Debug
impl<C: AppendCounters> std::fmt::Debug for FileProvider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProvider")
            .field("directory", &self.directory)
            .field("file_name_prefix", &self.file_name_prefix)
            .field("file_name_suffix", &self.file_name_suffix)
            .field("capacity", &self.capacity)
            .finish()
    }
}
