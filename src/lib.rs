//! Lock-free multi-writer append logging into memory-mapped files
//!
//! 面向内存映射文件的无锁多写入者追加日志库
//!
//! This library lets many producer threads (and optionally many OS processes)
//! append variable-length records into pre-sized, memory-mapped files. Each
//! writer receives a distinct byte offset through an atomic reservation, so
//! the payload copies never contend. When a file fills, writes can roll
//! transparently to a fresh file so producers see an unbounded logical stream.
//!
//! 本库允许多个生产者线程（以及可选的多个操作系统进程）向预分配大小的
//! 内存映射文件追加变长记录。每个写入者通过一次原子预留获得互不重叠的
//! 字节偏移，负载拷贝之间从不竞争。文件写满后，写入可以透明地滚动到
//! 新文件，生产者看到的是一条无界的逻辑流。
//!
//! # Features
//!
//! - **Lock-free appends**: reservation is a single CAS; copies run on disjoint ranges
//! - **Completion tracking**: a second counter tells observers which bytes are safe to read
//! - **Transparent rolling**: exactly one thread maps the successor file, the rest retry
//! - **Multi-process option**: counters live in a 64-byte file header shared by every mapper
//! - **Runtime agnostic**: plain threads and atomics, no async runtime required
//!
//! # 特性
//!
//! - **无锁追加**：预留只是一次 CAS；拷贝发生在互不重叠的范围上
//! - **完成追踪**：第二个计数器告诉观察者哪些字节可以安全读取
//! - **透明滚动**：恰好一个线程映射后继文件，其余线程重试
//! - **多进程选项**：计数器位于每个映射者共享的 64 字节文件头部
//! - **运行时无关**：仅使用普通线程与原子操作，无需异步运行时
//!
//! # Quick Start
//!
//! ## Bounded file
//!
//! Append into one pre-sized file until it fills:
//!
//! ## 有界文件
//!
//! 向单个预分配文件追加，直到写满：
//!
//! ```
//! use mmap_append::{LocalAppender, Result};
//! # use tempfile::tempdir;
//! # fn main() -> Result<()> {
//! # let dir = tempdir()?;
//! # let path = dir.path().join("records.log");
//! use std::num::NonZeroU64;
//!
//! let file = LocalAppender::map_new(&path, NonZeroU64::new(1024).unwrap(), false)?;
//!
//! // Concurrent writers each land on a distinct offset
//! // 并发写入者各自落在不同的偏移上
//! std::thread::scope(|s| {
//!     let f1 = &file;
//!     let f2 = &file;
//!     s.spawn(move || f1.write(b"from writer one"));
//!     s.spawn(move || f2.write(b"from writer two"));
//! });
//!
//! assert!(!file.is_pending());
//! file.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Rolling stream
//!
//! Roll to a fresh file whenever the current one fills:
//!
//! ## 滚动流
//!
//! 当前文件写满时滚动到新文件：
//!
//! ```
//! use mmap_append::{OpenOptions, Result};
//! # use tempfile::tempdir;
//! # fn main() -> Result<()> {
//! # let dir = tempdir()?;
//! use std::num::NonZeroU64;
//!
//! let log = OpenOptions::new()
//!     .location(dir.path())
//!     .capacity(NonZeroU64::new(4096).unwrap())
//!     .roll(|roll| roll
//!         .enabled(true)
//!         .file_name_prefix("events-")
//!         .file_name_suffix(".log"))
//!     .map()?;
//!
//! log.write(b"first record")?;
//! log.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Main Types
//!
//! - [`Appender`]: reservation/completion protocol over one bounded file
//!   ([`LocalAppender`] / [`SharedAppender`] pick where the counters live)
//! - [`RollingAppender`]: unbounded stream over transparently rolled files
//! - [`OpenOptions`]: fluent configuration returning the uniform [`AppendFile`]
//! - [`FileProvider`] / [`RollingCoordinator`]: the rolling machinery
//! - [`MappedRegion`]: the raw mapped byte region underneath
//!
//! # 主要类型
//!
//! - [`Appender`][]: 单个有界文件上的预留/完成协议
//!   （[`LocalAppender`] / [`SharedAppender`] 决定计数器的存放位置）
//! - [`RollingAppender`]: 基于透明滚动文件的无界流
//! - [`OpenOptions`]: 流式配置，返回统一的 [`AppendFile`]
//! - [`FileProvider`] / [`RollingCoordinator`]: 滚动机制
//! - [`MappedRegion`][]: 底层的原始映射字节区域

mod file;

pub use file::counters;
pub use file::{
    AppendCounters, AppendFile, Appender, Error, FileEventListener, FileProvider, LocalAppender,
    MappedRegion, OpenOptions, Result, RollListeners, RollOptions, RollingAppender,
    RollingCoordinator, SharedAppender,
};
