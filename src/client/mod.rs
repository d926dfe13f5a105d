use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time;

use crate::config::ClientConfig;
use crate::consts::DEFAULT_TIMEOUT;
use crate::error::MiniRedisConnectionError;

pub use crate::client::cli::Client;
pub use crate::client::commands::Commands;
pub use crate::client::reply::{HashEntry, ScanResult, SortedSetEntry};

pub mod cli;
pub mod cmd;
pub mod commands;
pub(crate) mod handshake;
pub mod reply;
pub mod scan;

/// 建立一条不做任何握手的连接，命令超时为默认值。
///
/// `addr` 直接交给 `TcpStream::connect`，其中包括异步的 DNS 解析。
pub async fn connect<T: ToSocketAddrs>(addr: T) -> Result<Client, MiniRedisConnectionError> {
    let socket = TcpStream::connect(addr).await?;
    socket.set_nodelay(true)?;

    Ok(Client::new(socket, DEFAULT_TIMEOUT))
}

/// 按配置建立连接并完成 AUTH / SELECT / CLIENT SETNAME 握手。
pub async fn connect_with(config: &ClientConfig) -> Result<Client, MiniRedisConnectionError> {
    let connect = TcpStream::connect(config.addr.as_str());
    let socket = if config.connect_timeout.is_zero() {
        connect.await?
    } else {
        time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| MiniRedisConnectionError::Timeout)??
    };
    socket.set_nodelay(true)?;

    let client = Client::new(socket, config.timeout);
    handshake::run(&client, config).await?;

    Ok(client)
}
