//! 连接池。
//!
//! 共享模式下，一条连接可以同时借给多个调用者：连接本身按 FIFO 复用请求，
//! 所以空闲集合中的连接在借出后仍然留在集合里。独占模式下每个调用者独占一条连接，
//! 归还时连接被关闭，不会再次借出。

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use log::{debug, info, warn};
use tokio::sync::watch;

use crate::client::{self, Client};
use crate::config::ClientConfig;
use crate::error::MiniRedisConnectionError;

pub use crate::pool::pooled::PooledClient;

pub mod pooled;

/// 按 [`ClientConfig`] 建立并复用连接。
///
/// `ConnectionPool` 可以廉价地 clone，所有 clone 共享同一个池。
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: ClientConfig,
    /// 池的所有状态都在这一把锁下修改，锁从不跨越 `.await` 持有
    state: Mutex<State>,
    /// 池已关闭并且所有连接都已关闭时变为 `true`
    drained: watch::Sender<bool>,
}

#[derive(Debug, Default)]
struct State {
    /// 可以直接借出的连接，按 id 去重
    idle: VecDeque<Client>,
    /// 已建立或正在建立的连接数
    live: usize,
    closed: bool,
}

/// `acquire` 在锁内做出的决定
enum Slot {
    /// 已经占用了一个连接名额，需要新建连接
    Reserved,
    Idle(Client),
}

impl ConnectionPool {
    /// 创建一个空的连接池，连接在第一次 `acquire` 时才建立。
    pub fn new(config: ClientConfig) -> ConnectionPool {
        let (drained, _) = watch::channel(false);

        ConnectionPool {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State::default()),
                drained,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// 借出一条连接。
    ///
    /// 连接数未达到上限时总是新建连接（连接并完成握手）；达到上限后从空闲集合中借出，
    /// 不产生网络往返。空闲集合也为空时仍然新建连接，允许短暂地超过上限而不是让调用者排队。
    pub async fn acquire(&self) -> Result<Client, MiniRedisConnectionError> {
        let slot = {
            let mut state = self.shared.state.lock().unwrap();
            if state.closed {
                return Err(MiniRedisConnectionError::already_closed());
            }

            if state.live < self.shared.config.max_pooled_conns {
                state.live += 1;
                Slot::Reserved
            } else if let Some(client) = self.take_idle(&mut state) {
                Slot::Idle(client)
            } else {
                state.live += 1;
                debug!("pool exhausted, over-subscribing to {} connections", state.live);
                Slot::Reserved
            }
        };

        match slot {
            Slot::Idle(client) => Ok(client),
            Slot::Reserved => self.create().await,
        }
    }

    /// 把借出的连接还给池。
    ///
    /// 已关闭的连接直接忽略。共享模式下，空闲集合还有空间时放回集合，否则关闭连接；
    /// 独占模式下连接总是被关闭。
    pub fn release(&self, client: &Client) {
        if self.shared.config.exclusive {
            if client.is_open() {
                debug!("closing exclusive connection #{}", client.id());
                client.close();
            }
            return;
        }

        // 在锁内判断：关闭回调持有同一把锁，已经关闭的连接不会被重新放回
        let mut state = self.shared.state.lock().unwrap();
        if !client.is_open() || state.idle.iter().any(|c| c.id() == client.id()) {
            return;
        }
        if !state.closed && state.idle.len() < self.shared.config.max_pooled_conns {
            state.idle.push_back(client.clone());
            return;
        }
        drop(state);

        debug!("idle set full, closing connection #{}", client.id());
        client.close();
    }

    /// 关闭连接池，可以重复调用。
    ///
    /// 立即关闭所有空闲连接，之后的 `acquire` 都会失败；返回的 future 在所有连接
    /// （包括仍被借出的连接）都关闭之后才完成。
    pub fn close(&self) -> impl Future<Output = ()> + Send + 'static {
        let (idle, drained) = {
            let mut state = self.shared.state.lock().unwrap();
            if !state.closed {
                info!("closing connection pool, {} live connection(s)", state.live);
                state.closed = true;
            }
            (std::mem::take(&mut state.idle), state.live == 0)
        };

        if drained {
            self.shared.drained.send_replace(true);
        }
        for client in idle {
            client.close();
        }

        self.close_future()
    }

    /// 池关闭完成后完成的 future，可以被多次获取、多次等待。
    pub fn close_future(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut drained = self.shared.drained.subscribe();
        async move {
            let _ = drained.wait_for(|drained| *drained).await;
        }
    }

    pub fn exclusive(&self) -> bool {
        self.shared.config.exclusive
    }

    /// 已建立或正在建立的连接数
    pub fn num_conns(&self) -> usize {
        self.shared.state.lock().unwrap().live
    }

    /// 空闲集合中的连接数
    pub fn num_pooled_conns(&self) -> usize {
        self.shared.state.lock().unwrap().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().unwrap().closed
    }

    // 共享模式下借出队首并轮转到队尾，连接仍留在集合中；独占模式下直接取出。
    // 顺带丢掉已经关闭、但关闭回调还没来得及移除的连接。
    fn take_idle(&self, state: &mut State) -> Option<Client> {
        while let Some(client) = state.idle.pop_front() {
            if !client.is_open() {
                continue;
            }
            if !self.shared.config.exclusive {
                state.idle.push_back(client.clone());
            }
            return Some(client);
        }
        None
    }

    async fn create(&self) -> Result<Client, MiniRedisConnectionError> {
        let reservation = Reservation {
            shared: &self.shared,
            armed: true,
        };

        let client = match client::connect_with(&self.shared.config).await {
            Ok(client) => client,
            Err(e) => {
                warn!("failed to connect to {}: {}", self.shared.config.addr, e);
                return Err(e);
            }
        };

        // 名额从此由关闭回调负责归还
        reservation.disarm();

        // 关闭回调要在放入空闲集合之后启动，才能保证把连接移出
        let mut state = self.shared.state.lock().unwrap();
        let pool_closed = state.closed;
        if !pool_closed
            && !self.shared.config.exclusive
            && client.is_open()
            && state.idle.len() < self.shared.config.max_pooled_conns
        {
            state.idle.push_back(client.clone());
        }
        drop(state);

        tokio::spawn(watch_closed(
            Arc::downgrade(&self.shared),
            client.id(),
            client.closed(),
        ));

        if pool_closed {
            client.close();
            return Err(MiniRedisConnectionError::already_closed());
        }

        debug!("connection #{} established", client.id());
        Ok(client)
    }
}

impl Shared {
    fn release_slot(&self) {
        let mut state = self.state.lock().unwrap();
        state.live = state.live.saturating_sub(1);
        let drained = state.closed && state.live == 0;
        drop(state);

        if drained {
            info!("connection pool closed");
            self.drained.send_replace(true);
        }
    }
}

/// 连接关闭后把它移出空闲集合并归还名额。
///
/// 只持有池的弱引用：池被 drop 之后空闲连接随之关闭，这个任务也就随之结束。
async fn watch_closed(shared: Weak<Shared>, id: u64, closed: impl Future<Output = ()>) {
    closed.await;

    if let Some(shared) = shared.upgrade() {
        debug!("connection #{} closed", id);
        shared.state.lock().unwrap().idle.retain(|c| c.id() != id);
        shared.release_slot();
    }
}

/// 建立连接期间占用的名额。
///
/// 连接失败，或者 `acquire` 的 future 在连接建立之前被 drop，名额都会被归还。
struct Reservation<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Reservation<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.release_slot();
        }
    }
}
