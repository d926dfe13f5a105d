use async_stream::try_stream;
use bytes::Bytes;
use tokio_stream::Stream;

use crate::client::commands::Commands;
use crate::client::reply::{HashEntry, SortedSetEntry};
use crate::error::MiniRedisConnectionError;

const CURSOR_START: &[u8] = b"0";

/// SCAN 系列命令的 MATCH / COUNT 选项。
#[derive(Debug, Clone, Default)]
pub struct ScanParams {
    pattern: Option<Bytes>,
    count: Option<Bytes>,
}

impl ScanParams {
    pub fn new() -> ScanParams {
        ScanParams::default()
    }

    /// MATCH pattern
    pub fn pattern(mut self, pattern: impl Into<Bytes>) -> ScanParams {
        self.pattern = Some(pattern.into());
        self
    }

    /// COUNT count
    pub fn count(mut self, count: usize) -> ScanParams {
        self.count = Some(Bytes::from(count.to_string()));
        self
    }

    /// 在 `head`（key、cursor）之后追加选项参数
    pub(crate) fn to_args<'a>(&'a self, head: &[&'a [u8]]) -> Vec<&'a [u8]> {
        let mut args = head.to_vec();
        if let Some(pattern) = &self.pattern {
            args.push(b"MATCH");
            args.push(pattern);
        }
        if let Some(count) = &self.count {
            args.push(b"COUNT");
            args.push(count);
        }
        args
    }
}

/// 从游标 0 开始不断执行 SCAN，直到服务端返回的游标回到 0，逐个产出 key。
///
/// SCAN 本身的语义决定了遍历期间被修改的 key 可能出现多次或者不出现。
pub fn scan_stream<'a, C>(
    client: &'a C,
    params: ScanParams,
) -> impl Stream<Item = Result<Bytes, MiniRedisConnectionError>> + 'a
where
    C: Commands + ?Sized,
{
    try_stream! {
        let mut cursor = Bytes::from_static(CURSOR_START);
        loop {
            let page = client.scan(&cursor, &params).await?;
            let finished = page.is_finished();
            for key in page.values {
                yield key;
            }
            if finished {
                break;
            }
            cursor = page.cursor;
        }
    }
}

/// HSCAN 版本的 [`scan_stream`]
pub fn hscan_stream<'a, C>(
    client: &'a C,
    key: Bytes,
    params: ScanParams,
) -> impl Stream<Item = Result<HashEntry, MiniRedisConnectionError>> + 'a
where
    C: Commands + ?Sized,
{
    try_stream! {
        let mut cursor = Bytes::from_static(CURSOR_START);
        loop {
            let page = client.hscan(&key, &cursor, &params).await?;
            let finished = page.is_finished();
            for entry in page.values {
                yield entry;
            }
            if finished {
                break;
            }
            cursor = page.cursor;
        }
    }
}

/// SSCAN 版本的 [`scan_stream`]
pub fn sscan_stream<'a, C>(
    client: &'a C,
    key: Bytes,
    params: ScanParams,
) -> impl Stream<Item = Result<Bytes, MiniRedisConnectionError>> + 'a
where
    C: Commands + ?Sized,
{
    try_stream! {
        let mut cursor = Bytes::from_static(CURSOR_START);
        loop {
            let page = client.sscan(&key, &cursor, &params).await?;
            let finished = page.is_finished();
            for member in page.values {
                yield member;
            }
            if finished {
                break;
            }
            cursor = page.cursor;
        }
    }
}

/// ZSCAN 版本的 [`scan_stream`]
pub fn zscan_stream<'a, C>(
    client: &'a C,
    key: Bytes,
    params: ScanParams,
) -> impl Stream<Item = Result<SortedSetEntry, MiniRedisConnectionError>> + 'a
where
    C: Commands + ?Sized,
{
    try_stream! {
        let mut cursor = Bytes::from_static(CURSOR_START);
        loop {
            let page = client.zscan(&key, &cursor, &params).await?;
            let finished = page.is_finished();
            for entry in page.values {
                yield entry;
            }
            if finished {
                break;
            }
            cursor = page.cursor;
        }
    }
}
