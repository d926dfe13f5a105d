use std::io;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use log::{debug, error, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

use crate::connection::frame::Frame;
use crate::connection::pending::{PendingQueue, ReplySender};
use crate::consts::READ_BUFFER_CAPACITY;
use crate::error::MiniRedisConnectionError;

/// 发给连接任务的消息。
#[derive(Debug)]
pub(crate) enum Message {
    /// 已经编码好的请求，以及发送时刻该连接的超时设置
    Command {
        request: Bytes,
        timeout: Duration,
        reply: ReplySender,
    },
    Close,
}

/// 一条 TCP 连接对应的后台任务。
///
/// 任务独占 socket、读写缓冲区和待回复队列，所有读、写和超时检查都在这一个任务里
/// 串行执行，因此同一连接内部不存在竞争。
///
/// 写出请求时把命令追加到 `pending` 队尾；每从读缓冲区解析出一个完整的帧，
/// 就交给队首的命令。任何一条命令超时、解析失败、socket 出错或对端关闭，
/// 都会让队列中所有命令以同一个原因失败并关闭连接：字节流读到一半时无法安全地继续。
#[derive(Debug)]
pub(crate) struct Connection {
    id: u64,
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    /// 读取帧的缓冲区
    read_buf: BytesMut,
    /// 等待写入 socket 的请求
    write_buf: BytesMut,
    pending: PendingQueue,
    requests: mpsc::UnboundedReceiver<Message>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// 为已经建立的 socket 启动连接任务。
    ///
    /// 返回发送请求的通道，以及连接关闭时会变为 `true` 的 watch 通道。
    pub(crate) fn spawn(
        id: u64,
        socket: TcpStream,
    ) -> (mpsc::UnboundedSender<Message>, watch::Receiver<bool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let (reader, writer) = socket.into_split();

        let conn = Connection {
            id,
            reader,
            writer,
            read_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            write_buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            pending: PendingQueue::new(),
            requests: rx,
            closed: closed_tx,
        };
        tokio::spawn(conn.run());

        (tx, closed_rx)
    }

    async fn run(mut self) {
        let cause = match self.process().await {
            Ok(()) => {
                debug!("connection #{} closed", self.id);
                MiniRedisConnectionError::already_closed()
            }
            Err(MiniRedisConnectionError::Parse(e)) => {
                error!("connection #{} protocol error: {}", self.id, e);
                MiniRedisConnectionError::Parse(e)
            }
            Err(e) => {
                warn!(
                    "connection #{} torn down with {} pending command(s): {}",
                    self.id,
                    self.pending.len(),
                    e
                );
                e
            }
        };

        self.pending.fail_all(&cause);

        // 之后再到达的请求一律以 "already closed" 失败
        self.requests.close();
        while let Ok(msg) = self.requests.try_recv() {
            if let Message::Command { reply, .. } = msg {
                let _ = reply.send(Err(MiniRedisConnectionError::already_closed()));
            }
        }

        let _ = self.writer.shutdown().await;
        self.closed.send_replace(true);
    }

    /// 连接的主循环，正常关闭时返回 `Ok(())`。
    async fn process(&mut self) -> Result<(), MiniRedisConnectionError> {
        loop {
            let deadline = self.pending.next_deadline();

            tokio::select! {
                msg = self.requests.recv() => match msg {
                    Some(Message::Command { request, timeout, reply }) => {
                        self.enqueue(request, timeout, reply);
                    }
                    // 显式关闭，或者所有 Client 句柄都已经被 drop
                    Some(Message::Close) | None => return Ok(()),
                },

                res = self.writer.write_buf(&mut self.write_buf), if !self.write_buf.is_empty() => {
                    if 0 == res? {
                        return Err(io::Error::from(io::ErrorKind::WriteZero).into());
                    }
                }

                res = self.reader.read_buf(&mut self.read_buf) => {
                    if 0 == res? {
                        // 对端关闭了连接
                        return Err(MiniRedisConnectionError::Disconnect);
                    }
                    while let Some(frame) = Frame::decode(&mut self.read_buf)? {
                        self.pending.complete(frame)?;
                    }
                }

                _ = wait_until(deadline) => {
                    if self.pending.has_expired(Instant::now()) {
                        return Err(MiniRedisConnectionError::Timeout);
                    }
                }
            }
        }
    }

    fn enqueue(&mut self, request: Bytes, timeout: Duration, reply: ReplySender) {
        // 超时为 0 表示不设截止时间，用于会在服务端阻塞的命令
        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };

        let seq = self.pending.push(reply, deadline);
        debug!(
            "connection #{} send command #{}: {} bytes",
            self.id,
            seq,
            request.len()
        );
        self.write_buf.extend_from_slice(&request);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(when) => time::sleep_until(when).await,
        None => std::future::pending().await,
    }
}
