use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};

use crate::client::commands::Commands;
use crate::client::reply;
use crate::connection::connect::{Connection, Message};
use crate::connection::frame::Frame;
use crate::error::MiniRedisConnectionError;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// 一条已经建立的连接。
///
/// `Client` 可以廉价地 clone，所有 clone 共享同一条连接，并且可以并发地发出命令：
/// 命令按发出顺序写入 socket，回复按同样的顺序交还给各自的调用者。
/// 最后一个句柄被 drop 时连接随之关闭。
#[derive(Debug, Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    id: u64,
    requests: mpsc::UnboundedSender<Message>,
    /// 当前的命令超时时间（纳秒），0 表示不设超时
    timeout_nanos: AtomicU64,
    closed: watch::Receiver<bool>,
    blocking: Mutex<Blocking>,
}

/// 正在执行的阻塞命令个数，以及第一条阻塞命令开始之前的超时时间
#[derive(Debug, Default)]
struct Blocking {
    active: usize,
    saved: Duration,
}

impl Client {
    pub(crate) fn new(socket: TcpStream, timeout: Duration) -> Client {
        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        let (requests, closed) = Connection::spawn(id, socket);

        Client {
            shared: Arc::new(Shared {
                id,
                requests,
                timeout_nanos: AtomicU64::new(as_nanos(timeout)),
                closed,
                blocking: Mutex::new(Blocking::default()),
            }),
        }
    }

    /// 连接在进程内的唯一编号
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// 执行任意命令并返回原始回复。
    ///
    /// 服务端的错误回复以 `Frame::Error` 的形式返回，由调用方（或回复转换函数）决定如何处理；
    /// 超时、协议错误以及连接断开则以 `Err` 返回。
    pub async fn execute(&self, cmd: &[u8], args: &[&[u8]]) -> Result<Frame, MiniRedisConnectionError> {
        let frame = Frame::command(cmd, args);
        debug!("client #{} request: {:?}", self.id(), frame);

        let mut request = BytesMut::new();
        frame.encode(&mut request);

        let (tx, rx) = oneshot::channel();
        self.shared
            .requests
            .send(Message::Command {
                request: request.freeze(),
                timeout: self.timeout(),
                reply: tx,
            })
            .map_err(|_| MiniRedisConnectionError::already_closed())?;

        // 连接任务在回复之前退出时 sender 会被 drop
        rx.await
            .map_err(|_| MiniRedisConnectionError::already_closed())?
    }

    /// 当前的命令超时时间，`Duration::ZERO` 表示不设超时。
    pub fn timeout(&self) -> Duration {
        Duration::from_nanos(self.shared.timeout_nanos.load(Ordering::SeqCst))
    }

    /// 原子地替换命令超时时间并返回旧值，方便调用方稍后恢复。
    ///
    /// 新值只影响之后发出的命令。连接已经关闭时返回错误。
    pub fn set_timeout(&self, timeout: Duration) -> Result<Duration, MiniRedisConnectionError> {
        if !self.is_open() {
            return Err(MiniRedisConnectionError::already_closed());
        }
        let previous = self
            .shared
            .timeout_nanos
            .swap(as_nanos(timeout), Ordering::SeqCst);
        Ok(Duration::from_nanos(previous))
    }

    /// 开始一条阻塞命令：第一条阻塞命令把超时设为 0 并记住原值。
    ///
    /// 与 [`Client::exit_blocking`] 成对调用。同一连接上的阻塞命令可以重叠，
    /// 只有最后一条结束时才恢复原来的超时。
    pub(crate) fn enter_blocking(&self) -> Result<(), MiniRedisConnectionError> {
        let mut blocking = self.shared.blocking.lock().unwrap();
        if blocking.active == 0 {
            blocking.saved = self.set_timeout(Duration::ZERO)?;
        }
        blocking.active += 1;
        Ok(())
    }

    pub(crate) fn exit_blocking(&self) {
        let mut blocking = self.shared.blocking.lock().unwrap();
        blocking.active = blocking.active.saturating_sub(1);
        if blocking.active > 0 {
            return;
        }
        // 恢复失败说明连接已经关闭
        if let Err(e) = self.set_timeout(blocking.saved) {
            debug!("connection #{} closed during blocking command: {}", self.id(), e);
        }
    }

    pub fn is_open(&self) -> bool {
        !*self.shared.closed.borrow() && !self.shared.requests.is_closed()
    }

    /// 请求关闭连接，可以重复调用。
    ///
    /// 仍在等待回复的命令会以 "already closed" 失败；用 [`Client::closed`] 等待关闭完成。
    pub fn close(&self) {
        let _ = self.shared.requests.send(Message::Close);
    }

    /// 连接关闭后完成的 future。
    ///
    /// 返回的 future 不持有连接本身，等待它不会让连接保持打开。
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut closed = self.shared.closed.clone();
        async move {
            // sender 被 drop 同样意味着连接任务已经结束
            let _ = closed.wait_for(|closed| *closed).await;
        }
    }

    /// AUTH password
    pub async fn auth(&self, password: &[u8]) -> Result<(), MiniRedisConnectionError> {
        reply::to_void(self.execute(b"AUTH", &[password]).await?)
    }

    /// SELECT index
    pub async fn select(&self, index: i64) -> Result<(), MiniRedisConnectionError> {
        let index = index.to_string();
        reply::to_void(self.execute(b"SELECT", &[index.as_bytes()]).await?)
    }

    /// CLIENT SETNAME name
    pub async fn client_setname(&self, name: &[u8]) -> Result<(), MiniRedisConnectionError> {
        reply::to_void(self.execute(b"CLIENT", &[b"SETNAME", name]).await?)
    }

    /// CLIENT GETNAME
    pub async fn client_getname(&self) -> Result<Option<Bytes>, MiniRedisConnectionError> {
        reply::to_bytes(self.execute(b"CLIENT", &[b"GETNAME"]).await?)
    }

    /// QUIT，服务端回复后会断开连接
    pub async fn quit(&self) -> Result<(), MiniRedisConnectionError> {
        let res = reply::to_void(self.execute(b"QUIT", &[]).await?);
        self.close();
        res
    }
}

impl Commands for Client {
    async fn execute(&self, cmd: &[u8], args: &[&[u8]]) -> Result<Frame, MiniRedisConnectionError> {
        Client::execute(self, cmd, args).await
    }
}

fn as_nanos(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}
