use std::collections::VecDeque;

use log::debug;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::connection::frame::Frame;
use crate::error::MiniRedisConnectionError;

pub(crate) type ReplySender = oneshot::Sender<Result<Frame, MiniRedisConnectionError>>;

/// 已经发出、还在等待回复的命令。
///
/// `slot` 只能被使用一次：无论是收到回复、超时还是连接关闭，
/// 先到的那个结果生效，之后就不可能再被赋值。
#[derive(Debug)]
pub(crate) struct PendingCommand {
    pub(crate) seq: u64,
    slot: ReplySender,
    pub(crate) deadline: Option<Instant>,
}

impl PendingCommand {
    fn resolve(self, result: Result<Frame, MiniRedisConnectionError>) {
        // 调用方已经放弃等待（future 被 drop）时发送会失败，直接忽略即可
        let _ = self.slot.send(result);
    }
}

/// 每个连接唯一的待回复队列，严格先进先出。
///
/// 服务端按请求顺序回复，所以不需要在协议里携带序号，
/// 每收到一个回复就交给最早发出的那条命令。
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    queue: VecDeque<PendingCommand>,
    next_seq: u64,
}

impl PendingQueue {
    pub(crate) fn new() -> PendingQueue {
        PendingQueue::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// 追加一条刚刚写出的命令，返回它在本连接上的序号。
    pub(crate) fn push(&mut self, slot: ReplySender, deadline: Option<Instant>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(PendingCommand { seq, slot, deadline });
        seq
    }

    /// 用收到的回复完成最早的命令。
    ///
    /// 队列为空时说明收到了一个没有对应请求的回复，连接已经不同步了。
    pub(crate) fn complete(&mut self, frame: Frame) -> Result<(), MiniRedisConnectionError> {
        match self.queue.pop_front() {
            Some(pending) => {
                debug!("reply for command #{}: {:?}", pending.seq, frame);
                pending.resolve(Ok(frame));
                Ok(())
            }
            None => Err(MiniRedisConnectionError::Parse(
                crate::error::MiniRedisParseError::Parse(format!(
                    "unexpected reply without pending command: {:?}",
                    frame
                )),
            )),
        }
    }

    /// 所有命令中最早到期的时间点。
    ///
    /// 超时时间在发送时确定，可能在两次发送之间被修改，所以到期时间并不一定单调。
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.queue.iter().filter_map(|pending| pending.deadline).min()
    }

    /// 是否有命令在 `now` 之前已经到期
    pub(crate) fn has_expired(&self, now: Instant) -> bool {
        self.next_deadline().map_or(false, |deadline| deadline <= now)
    }

    /// 用同一个错误结束所有等待中的命令。
    pub(crate) fn fail_all(&mut self, err: &MiniRedisConnectionError) {
        for pending in self.queue.drain(..) {
            pending.resolve(Err(err.clone()));
        }
    }
}
