//! Rolling append facade
//!
//! 滚动追加门面

use byteorder::ByteOrder;
use std::path::PathBuf;
use std::sync::Arc;
use super::appender::Appender;
use super::counters::AppendCounters;
use super::error::{Error, Result};
use super::roll::RollingCoordinator;

/// Appender over an unbounded logical stream of rolled files
///
/// 基于滚动文件的无界逻辑流追加器
///
/// Presents the write surface of a single [`Appender`] while transparently
/// rolling to a fresh file whenever the current one fills. A write that finds
/// the current file sealed simply retries: the next
/// [`file_for_write`](RollingCoordinator::file_for_write) either observes
/// capacity in the successor or performs the roll itself, so the retry loop
/// always terminates.
///
/// 呈现与单个 [`Appender`] 相同的写入接口，并在当前文件写满时
/// 透明地滚动到新文件。发现当前文件已封存的写入只需重试：
/// 下一次 [`file_for_write`](RollingCoordinator::file_for_write)
/// 要么观察到后继文件的容量，要么亲自执行滚动，因此重试循环必然结束。
///
/// The one hard failure is a record longer than a whole file: no record ever
/// spans two files, so such a write fails fast with
/// [`Error::RecordTooLarge`] instead of rolling forever.
///
/// 唯一的硬失败是单条记录超过整个文件：记录永远不会跨越两个文件，
/// 这样的写入会以 [`Error::RecordTooLarge`] 立即失败，而不是无限滚动。
pub struct RollingAppender<C: AppendCounters> {
    coordinator: RollingCoordinator<C>,

    /// Usable payload capacity of each rolled file
    ///
    /// 每个滚动文件的可用负载容量
    capacity: u64,
}

impl<C: AppendCounters> RollingAppender<C> {
    /// Wrap a coordinator into the uniform append surface
    ///
    /// 将协调器包装为统一的追加接口
    pub fn new(coordinator: RollingCoordinator<C>) -> Self {
        let capacity = coordinator.current().capacity();
        Self { coordinator, capacity }
    }

    #[inline]
    fn check_length(&self, length: u64) -> Result<()> {
        if length > self.capacity {
            return Err(Error::RecordTooLarge { length, capacity: self.capacity });
        }
        Ok(())
    }

    /// Append the given bytes, rolling to a new file if needed
    ///
    /// 追加给定的字节，必要时滚动到新文件
    ///
    /// Returns the offset within whichever file the record landed in.
    ///
    /// 返回记录落入的那个文件内的偏移。
    pub fn write(&self, src: &[u8]) -> Result<u64> {
        self.check_length(src.len() as u64)?;
        loop {
            if let Some(offset) = self.coordinator.file_for_write()?.write(src) {
                return Ok(offset);
            }
        }
    }

    /// Append a string as one byte per character, rolling if needed
    ///
    /// 以每字符一个字节追加字符串，必要时滚动
    ///
    /// Characters outside the ASCII range are replaced by `'?'`.
    ///
    /// ASCII 范围之外的字符被替换为 `'?'`。
    pub fn write_ascii(&self, src: &str) -> Result<u64> {
        self.check_length(src.chars().count() as u64)?;
        loop {
            if let Some(offset) = self.coordinator.file_for_write()?.write_ascii(src) {
                return Ok(offset);
            }
        }
    }

    /// Append a string as two-byte UTF-16 code units, rolling if needed
    ///
    /// 按双字节 UTF-16 编码单元追加字符串，必要时滚动
    pub fn write_chars<E: ByteOrder>(&self, src: &str) -> Result<u64> {
        self.check_length(src.encode_utf16().count() as u64 * 2)?;
        loop {
            if let Some(offset) = self.coordinator.file_for_write()?.write_chars::<E>(src) {
                return Ok(offset);
            }
        }
    }

    /// Append one 64-bit integer, rolling if needed
    ///
    /// 追加一个 64 位整数，必要时滚动
    pub fn write_u64<E: ByteOrder>(&self, value: u64) -> Result<u64> {
        self.check_length(8)?;
        loop {
            if let Some(offset) = self.coordinator.file_for_write()?.write_u64::<E>(value) {
                return Ok(offset);
            }
        }
    }

    /// Append several 64-bit integers as one record, rolling if needed
    ///
    /// 将若干 64 位整数作为一条记录追加，必要时滚动
    pub fn write_u64s<E: ByteOrder>(&self, values: &[u64]) -> Result<u64> {
        self.check_length(values.len() as u64 * 8)?;
        loop {
            if let Some(offset) = self.coordinator.file_for_write()?.write_u64s::<E>(values) {
                return Ok(offset);
            }
        }
    }

    /// Append `length` callback-composed bytes, rolling if needed
    ///
    /// 追加 `length` 个由回调组装的字节，必要时滚动
    ///
    /// The callback only runs once a reservation succeeds, but a roll may
    /// retry the write, so it takes `FnMut` here.
    ///
    /// 回调只在预留成功后执行，但滚动可能重试写入，因此这里要求 `FnMut`。
    pub fn write_with<F>(&self, length: u64, mut f: F) -> Result<u64>
    where
        F: FnMut(&mut [u8]),
    {
        self.check_length(length)?;
        loop {
            if let Some(offset) = self.coordinator.file_for_write()?.write_with(length, &mut f) {
                return Ok(offset);
            }
        }
    }

    /// Check if the current file has reserved writes not completed yet
    ///
    /// 检查当前文件是否有尚未完成的预留写入
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.coordinator.current().is_pending()
    }

    /// Always false: the stream rolls to a new file instead of finishing
    ///
    /// 恒为 false：流会滚动到新文件而不会结束
    #[inline]
    pub fn is_finished(&self) -> bool {
        false
    }

    /// Seal the current file, forcing the next write to roll
    ///
    /// 封存当前文件，迫使下一次写入滚动
    pub fn finish(&self) {
        self.coordinator.current().finish();
    }

    /// Path of the file currently being appended to
    ///
    /// 当前正被追加的文件的路径
    pub fn path(&self) -> PathBuf {
        self.coordinator.current().path().to_path_buf()
    }

    /// The appender currently being written to
    ///
    /// 当前正被写入的追加器
    #[inline]
    pub fn current(&self) -> Arc<Appender<C>> {
        self.coordinator.current()
    }

    /// Usable payload capacity of each rolled file
    ///
    /// 每个滚动文件的可用负载容量
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Drain and close the current file
    ///
    /// 排空并关闭当前文件
    pub fn close(&self) {
        self.coordinator.close();
    }
}

/// Implement Debug for RollingAppender
///
/// 为 RollingAppender 实现 Debug
impl<C: AppendCounters> std::fmt::Debug for RollingAppender<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingAppender")
            .field("coordinator", &self.coordinator)
            .field("capacity", &self.capacity)
            .finish()
    }
}
