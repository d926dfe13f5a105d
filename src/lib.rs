//! 基于 tokio 的 Redis 客户端。
//!
//! - [`client::Client`]：一条连接，命令按 FIFO 顺序在连接上复用，每条命令有独立的超时。
//! - [`pool::ConnectionPool`]：共享或独占模式的连接池。
//! - [`pool::PooledClient`]：每条命令自动从连接池借出、归还连接。
//!
//! 常用命令通过 [`client::Commands`] trait 提供，`Client` 和 `PooledClient` 都实现了它。

pub mod client;
pub mod config;
pub mod connection;
pub mod consts;
pub mod error;
pub mod logger;
pub mod pool;

pub use crate::client::{Client, Commands};
pub use crate::config::ClientConfig;
pub use crate::connection::frame::Frame;
pub use crate::pool::{ConnectionPool, PooledClient};
