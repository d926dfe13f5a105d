use std::io;
use std::num::TryFromIntError;
use std::string::FromUtf8Error;
use std::sync::Arc;

use thiserror::Error;

/// 帧编解码过程中产生的错误。
#[derive(Error, Debug, Clone)]
pub enum MiniRedisParseError {
    /// 缓冲区中的数据还不足以组成一个完整的帧，需要继续读取。
    #[error("not enough data is available to parse a message")]
    Incomplete,

    /// 帧格式错误，对连接来说是致命的。
    #[error("protocol error; {0}")]
    Parse(String),

    /// 数组帧中已经没有更多的元素。
    #[error("protocol error; unexpected end of stream")]
    EndOfStream,

    #[error("protocol error; invalid frame format")]
    TryFromInt(#[from] TryFromIntError),

    #[error("protocol error; invalid string")]
    FromUtf8(#[from] FromUtf8Error),
}

/// 命令执行过程中可能出现的所有错误。
///
/// 实现了 `Clone`，这样一个导致连接关闭的原因可以同时传递给所有等待中的命令。
#[derive(Error, Debug, Clone)]
pub enum MiniRedisConnectionError {
    #[error("io error: {0}")]
    Io(Arc<io::Error>),

    #[error(transparent)]
    Parse(#[from] MiniRedisParseError),

    #[error("connection reset by peer")]
    Disconnect,

    /// 服务端返回的错误回复，只影响当前这一条命令。
    #[error("server error: {0}")]
    CommandExecute(String),

    #[error("unexpected reply frame type")]
    InvalidFrameType,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("command timed out")]
    Timeout,

    #[error("{0}")]
    Closed(&'static str),

    #[error("operation not supported: {0}")]
    Unsupported(String),
}

impl MiniRedisConnectionError {
    /// 连接或连接池已经关闭时返回的错误。
    pub fn already_closed() -> Self {
        MiniRedisConnectionError::Closed("already closed")
    }
}

impl From<io::Error> for MiniRedisConnectionError {
    fn from(err: io::Error) -> Self {
        MiniRedisConnectionError::Io(Arc::new(err))
    }
}

/// 命令行客户端使用的顶层错误。
#[derive(Error, Debug)]
pub enum MiniRedisClientError {
    #[error(transparent)]
    Connect(#[from] MiniRedisConnectionError),

    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),
}
