//! Error types for mmap-append
//!
//! mmap-append 的错误类型

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Error type for mmap-append operations
///
/// mmap-append 操作的错误类型
#[derive(Debug)]
pub enum Error {
    /// I/O error
    ///
    /// I/O 错误
    Io(io::Error),

    /// File already exists and the single-process variant will not modify it
    ///
    /// 文件已存在，单进程变体不会修改已有文件
    FileExists {
        path: PathBuf,
    },

    /// Close was requested while reserved writes have not completed yet
    ///
    /// 关闭时仍有未完成的预留写入
    PendingWrites,

    /// A single record is larger than one file can ever hold
    ///
    /// 单条记录超过了单个文件所能容纳的大小
    RecordTooLarge {
        length: u64,
        capacity: u64,
    },

    /// Capacity plus header does not fit the 31-bit offset space
    ///
    /// 容量加上头部超出了 31 位偏移空间
    InvalidCapacity {
        capacity: u64,
    },

    /// Existing file is smaller than the shared counter header
    ///
    /// 已有文件小于共享计数器头部
    FileTooSmall {
        actual: u64,
    },

    /// Builder was finalized without a location
    ///
    /// 构建器缺少 location 配置
    MissingLocation,

    /// Builder was finalized without a capacity
    ///
    /// 构建器缺少 capacity 配置
    MissingCapacity,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::FileExists { path } => {
                write!(f, "File exists, cannot map a new file over {} / 文件已存在", path.display())
            }
            Error::PendingWrites => write!(f, "There are pending writes / 仍有未完成的写入"),
            Error::RecordTooLarge { length, capacity } => {
                write!(f, "Record length {} exceeds file capacity {} / 记录长度 {} 超过文件容量 {}",
                    length, capacity, length, capacity)
            }
            Error::InvalidCapacity { capacity } => {
                write!(f, "Capacity {} exceeds the maximum mappable size / 容量 {} 超出可映射上限",
                    capacity, capacity)
            }
            Error::FileTooSmall { actual } => {
                write!(f, "File of {} bytes is smaller than the counter header / 文件小于计数器头部", actual)
            }
            Error::MissingLocation => write!(f, "No location configured / 未配置 location"),
            Error::MissingCapacity => write!(f, "No capacity configured / 未配置 capacity"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Convert from io::Error to Error
///
/// 从 io::Error 转换到 Error
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Convert from Error to io::Error for compatibility
///
/// 从 Error 转换到 io::Error 以保持兼容性
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(io_err) => io_err,
            Error::FileExists { .. } => io::Error::new(io::ErrorKind::AlreadyExists, err.to_string()),
            _ => io::Error::new(io::ErrorKind::InvalidInput, err.to_string()),
        }
    }
}

/// Result type alias using our custom Error type
///
/// 使用自定义 Error 类型的 Result 类型别名
pub type Result<T> = std::result::Result<T, Error>;
