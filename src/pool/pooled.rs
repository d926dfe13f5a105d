use std::future::Future;

use crate::client::{Client, Commands};
use crate::config::ClientConfig;
use crate::connection::frame::Frame;
use crate::error::MiniRedisConnectionError;
use crate::pool::ConnectionPool;

/// 连接管理和事务命令依赖连接自身的状态，在池中的匿名连接上没有意义
const UNSUPPORTED_COMMANDS: &[&[u8]] = &[
    b"AUTH", b"SELECT", b"QUIT", b"CLIENT", b"MULTI", b"EXEC", b"DISCARD", b"WATCH", b"UNWATCH",
];

/// 通过连接池执行命令的客户端。
///
/// 每条命令都会从池中借出一条连接，执行后立即归还，调用方不需要自己管理连接。
#[derive(Debug, Clone)]
pub struct PooledClient {
    pool: ConnectionPool,
}

impl PooledClient {
    pub fn new(pool: ConnectionPool) -> PooledClient {
        PooledClient { pool }
    }

    /// 按配置创建一个新的连接池，并在其上构造客户端。
    pub fn with_config(config: ClientConfig) -> PooledClient {
        PooledClient::new(ConnectionPool::new(config))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// 关闭底层的连接池，见 [`ConnectionPool::close`]。
    pub fn close(&self) -> impl Future<Output = ()> + Send + 'static {
        self.pool.close()
    }

    pub fn close_future(&self) -> impl Future<Output = ()> + Send + 'static {
        self.pool.close_future()
    }
}

impl Commands for PooledClient {
    async fn execute(&self, cmd: &[u8], args: &[&[u8]]) -> Result<Frame, MiniRedisConnectionError> {
        check_supported(cmd)?;

        let client = self.pool.acquire().await?;
        let res = client.execute(cmd, args).await;
        self.pool.release(&client);
        res
    }

    /// 阻塞命令执行期间关闭连接的超时，完成后恢复原值再归还连接。
    ///
    /// 调用被取消（future 被 drop）时同样会恢复超时并归还连接；
    /// 已经写出的命令无法撤回，它的回复到达后会被丢弃。
    async fn execute_blocking(&self, cmd: &[u8], args: &[&[u8]]) -> Result<Frame, MiniRedisConnectionError> {
        check_supported(cmd)?;

        let client = self.pool.acquire().await?;
        if let Err(e) = client.enter_blocking() {
            self.pool.release(&client);
            return Err(e);
        }

        let call = BlockingCall {
            pool: &self.pool,
            client,
        };
        let res = call.client.execute(cmd, args).await;
        drop(call);
        res
    }
}

/// 借出后正在执行阻塞命令的连接，drop 时恢复超时并归还
struct BlockingCall<'a> {
    pool: &'a ConnectionPool,
    client: Client,
}

impl Drop for BlockingCall<'_> {
    fn drop(&mut self) {
        self.client.exit_blocking();
        self.pool.release(&self.client);
    }
}

fn check_supported(cmd: &[u8]) -> Result<(), MiniRedisConnectionError> {
    if UNSUPPORTED_COMMANDS
        .iter()
        .any(|unsupported| unsupported.eq_ignore_ascii_case(cmd))
    {
        return Err(MiniRedisConnectionError::Unsupported(format!(
            "{} on a pooled client",
            String::from_utf8_lossy(cmd).to_uppercase()
        )));
    }
    Ok(())
}
