//! Concurrent append files over memory mappings
//!
//! 基于内存映射的并发追加文件
//!
//! Provides the full appender stack, leaves first:
//!
//! - [`MappedRegion`]: raw mapped byte region with bulk and byte-order-aware puts
//! - [`counters`]: the `(N, W, F)` counter triple, process-private or resident
//!   in a shared file header
//! - [`Appender`]: reservation and completion protocol over one bounded file
//! - [`FileProvider`] + [`RollingCoordinator`]: fresh-file supply and the
//!   single-roller contention protocol
//! - [`RollingAppender`]: unbounded logical stream over rolled files
//! - [`OpenOptions`] / [`AppendFile`]: fluent configuration and the uniform
//!   caller-visible surface
//!
//! 自底向上提供完整的追加器栈：
//!
//! - [`MappedRegion`]: 原始映射字节区域，支持批量与按字节序写入
//! - [`counters`]: `(N, W, F)` 计数器三元组，进程私有或驻留在共享文件头部
//! - [`Appender`]: 单个有界文件上的预留与完成协议
//! - [`FileProvider`] + [`RollingCoordinator`]: 新文件供给与单滚动者竞争协议
//! - [`RollingAppender`]: 基于滚动文件的无界逻辑流
//! - [`OpenOptions`] / [`AppendFile`]: 流式配置与统一的调用者接口
//!
//! # Reading back
//!
//! Writes to different ranges complete in no particular physical order.
//! Readers must trust bytes only up to the write-complete mark, never up to
//! the reservation mark.
//!
//! # 读取
//!
//! 不同范围的写入没有固定的物理完成顺序。
//! 读取者只能信任写入完成标记之前的字节，而不是预留标记之前的。

mod appender;
pub mod counters;
mod error;
mod options;
mod provider;
mod region;
mod roll;
mod rolling;

#[cfg(test)]
mod tests;

// Re-export public API
// 重新导出公共 API
pub use appender::{Appender, LocalAppender, SharedAppender};
pub use counters::AppendCounters;
pub use error::{Error, Result};
pub use options::{AppendFile, OpenOptions, RollOptions};
pub use provider::FileProvider;
pub use region::MappedRegion;
pub use roll::{FileEventListener, RollListeners, RollingCoordinator};
pub use rolling::RollingAppender;
