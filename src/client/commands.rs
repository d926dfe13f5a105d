//! 常用命令的类型化接口。
//!
//! 所有命令都建立在 [`Commands::execute`] 之上：组装参数、执行、再用 [`reply`] 中的
//! 函数把原始回复转换为结果类型。[`Client`](crate::client::Client) 直接在自己的连接上执行，
//! [`PooledClient`](crate::pool::PooledClient) 则每次从连接池借出一个连接。
//!
//! 连接管理命令（AUTH、SELECT、CLIENT SETNAME、QUIT）只在 `Client` 上提供，
//! 它们对连接池中匿名、共享的连接没有意义。

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;

use crate::client::reply::{self, HashEntry, ScanResult, SortedSetEntry};
use crate::client::scan::ScanParams;
use crate::connection::frame::Frame;
use crate::error::MiniRedisConnectionError;

type Result<T> = std::result::Result<T, MiniRedisConnectionError>;

#[allow(async_fn_in_trait)]
pub trait Commands {
    /// 执行任意命令并返回原始回复。
    async fn execute(&self, cmd: &[u8], args: &[&[u8]]) -> Result<Frame>;

    /// 执行会在服务端阻塞等待数据的命令（BLPOP 等）。
    ///
    /// 默认与 `execute` 相同，超时由调用方通过 `set_timeout` 自行控制。
    async fn execute_blocking(&self, cmd: &[u8], args: &[&[u8]]) -> Result<Frame> {
        self.execute(cmd, args).await
    }

    // ===== connection =====

    async fn ping(&self) -> Result<Option<String>> {
        reply::to_string(self.execute(b"PING", &[]).await?)
    }

    async fn echo(&self, msg: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"ECHO", &[msg]).await?)
    }

    // ===== keys =====

    async fn del(&self, keys: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"DEL", keys).await?)
    }

    async fn exists(&self, key: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"EXISTS", &[key]).await?)
    }

    async fn expire(&self, key: &[u8], seconds: i64) -> Result<bool> {
        let seconds = seconds.to_string();
        reply::to_boolean(self.execute(b"EXPIRE", &[key, seconds.as_bytes()]).await?)
    }

    async fn pexpire(&self, key: &[u8], millis: i64) -> Result<bool> {
        let millis = millis.to_string();
        reply::to_boolean(self.execute(b"PEXPIRE", &[key, millis.as_bytes()]).await?)
    }

    async fn ttl(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"TTL", &[key]).await?)
    }

    async fn pttl(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"PTTL", &[key]).await?)
    }

    async fn persist(&self, key: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"PERSIST", &[key]).await?)
    }

    async fn keys(&self, pattern: &[u8]) -> Result<Option<Vec<Bytes>>> {
        reply::to_list(self.execute(b"KEYS", &[pattern]).await?)
    }

    async fn rename(&self, key: &[u8], new_key: &[u8]) -> Result<()> {
        reply::to_void(self.execute(b"RENAME", &[key, new_key]).await?)
    }

    /// TYPE key
    async fn type_of(&self, key: &[u8]) -> Result<Option<String>> {
        reply::to_string(self.execute(b"TYPE", &[key]).await?)
    }

    async fn scan(&self, cursor: &[u8], params: &ScanParams) -> Result<ScanResult<Bytes>> {
        let args = params.to_args(&[cursor]);
        reply::to_array_scan_result(self.execute(b"SCAN", &args).await?)
    }

    // ===== strings =====

    async fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"GET", &[key]).await?)
    }

    /// SET key value，带 NX/XX 条件未满足时服务端回复 nil，此时返回 `false`。
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"SET", &[key, value]).await?)
    }

    async fn set_ex(&self, key: &[u8], value: &[u8], seconds: i64) -> Result<bool> {
        let seconds = seconds.to_string();
        reply::to_boolean(self.execute(b"SET", &[key, value, b"EX", seconds.as_bytes()]).await?)
    }

    async fn set_nx(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"SET", &[key, value, b"NX"]).await?)
    }

    async fn getset(&self, key: &[u8], value: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"GETSET", &[key, value]).await?)
    }

    async fn mget(&self, keys: &[&[u8]]) -> Result<Option<Vec<Option<Bytes>>>> {
        reply::to_nullable_list(self.execute(b"MGET", keys).await?)
    }

    /// MSET key value [key value ...]
    async fn mset(&self, pairs: &[(&[u8], &[u8])]) -> Result<()> {
        let args: Vec<&[u8]> = pairs.iter().flat_map(|(k, v)| [*k, *v]).collect();
        reply::to_void(self.execute(b"MSET", &args).await?)
    }

    async fn incr(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"INCR", &[key]).await?)
    }

    async fn incr_by(&self, key: &[u8], delta: i64) -> Result<i64> {
        let delta = delta.to_string();
        integer(self.execute(b"INCRBY", &[key, delta.as_bytes()]).await?)
    }

    async fn incr_by_float(&self, key: &[u8], delta: f64) -> Result<Option<f64>> {
        let delta = delta.to_string();
        reply::to_double(self.execute(b"INCRBYFLOAT", &[key, delta.as_bytes()]).await?)
    }

    async fn decr(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"DECR", &[key]).await?)
    }

    async fn append(&self, key: &[u8], value: &[u8]) -> Result<i64> {
        integer(self.execute(b"APPEND", &[key, value]).await?)
    }

    async fn strlen(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"STRLEN", &[key]).await?)
    }

    // ===== hashes =====

    async fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"HSET", &[key, field, value]).await?)
    }

    async fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"HGET", &[key, field]).await?)
    }

    async fn hmget(&self, key: &[u8], fields: &[&[u8]]) -> Result<Option<Vec<Option<Bytes>>>> {
        reply::to_nullable_list(self.execute(b"HMGET", &with_head(&[key], fields)).await?)
    }

    async fn hgetall(&self, key: &[u8]) -> Result<Option<BTreeMap<Bytes, Bytes>>> {
        reply::to_map(self.execute(b"HGETALL", &[key]).await?)
    }

    async fn hdel(&self, key: &[u8], fields: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"HDEL", &with_head(&[key], fields)).await?)
    }

    async fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"HEXISTS", &[key, field]).await?)
    }

    async fn hincr_by(&self, key: &[u8], field: &[u8], delta: i64) -> Result<i64> {
        let delta = delta.to_string();
        integer(self.execute(b"HINCRBY", &[key, field, delta.as_bytes()]).await?)
    }

    async fn hkeys(&self, key: &[u8]) -> Result<Option<Vec<Bytes>>> {
        reply::to_list(self.execute(b"HKEYS", &[key]).await?)
    }

    async fn hlen(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"HLEN", &[key]).await?)
    }

    async fn hscan(&self, key: &[u8], cursor: &[u8], params: &ScanParams) -> Result<ScanResult<HashEntry>> {
        let args = params.to_args(&[key, cursor]);
        reply::to_hash_scan_result(self.execute(b"HSCAN", &args).await?)
    }

    // ===== lists =====

    async fn lpush(&self, key: &[u8], values: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"LPUSH", &with_head(&[key], values)).await?)
    }

    async fn rpush(&self, key: &[u8], values: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"RPUSH", &with_head(&[key], values)).await?)
    }

    async fn lpop(&self, key: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"LPOP", &[key]).await?)
    }

    async fn rpop(&self, key: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"RPOP", &[key]).await?)
    }

    async fn llen(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"LLEN", &[key]).await?)
    }

    async fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Option<Vec<Bytes>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        reply::to_list(self.execute(b"LRANGE", &[key, start.as_bytes(), stop.as_bytes()]).await?)
    }

    /// BLPOP key [key ...] timeout，超时未取到数据时返回 `None`。
    async fn blpop(&self, timeout_secs: i64, keys: &[&[u8]]) -> Result<Option<Vec<Bytes>>> {
        let timeout = timeout_secs.to_string();
        let args = with_head(keys, &[timeout.as_bytes()]);
        reply::to_list(self.execute_blocking(b"BLPOP", &args).await?)
    }

    async fn brpop(&self, timeout_secs: i64, keys: &[&[u8]]) -> Result<Option<Vec<Bytes>>> {
        let timeout = timeout_secs.to_string();
        let args = with_head(keys, &[timeout.as_bytes()]);
        reply::to_list(self.execute_blocking(b"BRPOP", &args).await?)
    }

    async fn brpoplpush(&self, src: &[u8], dst: &[u8], timeout_secs: i64) -> Result<Option<Bytes>> {
        let timeout = timeout_secs.to_string();
        reply::to_bytes(
            self.execute_blocking(b"BRPOPLPUSH", &[src, dst, timeout.as_bytes()])
                .await?,
        )
    }

    // ===== sets =====

    async fn sadd(&self, key: &[u8], members: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"SADD", &with_head(&[key], members)).await?)
    }

    async fn scard(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"SCARD", &[key]).await?)
    }

    async fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        reply::to_boolean(self.execute(b"SISMEMBER", &[key, member]).await?)
    }

    async fn smembers(&self, key: &[u8]) -> Result<Option<BTreeSet<Bytes>>> {
        reply::to_set(self.execute(b"SMEMBERS", &[key]).await?)
    }

    async fn srem(&self, key: &[u8], members: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"SREM", &with_head(&[key], members)).await?)
    }

    async fn spop(&self, key: &[u8]) -> Result<Option<Bytes>> {
        reply::to_bytes(self.execute(b"SPOP", &[key]).await?)
    }

    async fn sinter(&self, keys: &[&[u8]]) -> Result<Option<BTreeSet<Bytes>>> {
        reply::to_set(self.execute(b"SINTER", keys).await?)
    }

    async fn sunion(&self, keys: &[&[u8]]) -> Result<Option<BTreeSet<Bytes>>> {
        reply::to_set(self.execute(b"SUNION", keys).await?)
    }

    async fn sdiff(&self, keys: &[&[u8]]) -> Result<Option<BTreeSet<Bytes>>> {
        reply::to_set(self.execute(b"SDIFF", keys).await?)
    }

    async fn sscan(&self, key: &[u8], cursor: &[u8], params: &ScanParams) -> Result<ScanResult<Bytes>> {
        let args = params.to_args(&[key, cursor]);
        reply::to_array_scan_result(self.execute(b"SSCAN", &args).await?)
    }

    // ===== sorted sets =====

    async fn zadd(&self, key: &[u8], score: f64, member: &[u8]) -> Result<i64> {
        let score = score.to_string();
        integer(self.execute(b"ZADD", &[key, score.as_bytes(), member]).await?)
    }

    async fn zcard(&self, key: &[u8]) -> Result<i64> {
        integer(self.execute(b"ZCARD", &[key]).await?)
    }

    async fn zscore(&self, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
        reply::to_double(self.execute(b"ZSCORE", &[key, member]).await?)
    }

    async fn zincr_by(&self, key: &[u8], delta: f64, member: &[u8]) -> Result<Option<f64>> {
        let delta = delta.to_string();
        reply::to_double(self.execute(b"ZINCRBY", &[key, delta.as_bytes(), member]).await?)
    }

    async fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Result<Option<Vec<Bytes>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        reply::to_list(self.execute(b"ZRANGE", &[key, start.as_bytes(), stop.as_bytes()]).await?)
    }

    async fn zrange_with_scores(&self, key: &[u8], start: i64, stop: i64) -> Result<Option<Vec<SortedSetEntry>>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        reply::to_sorted_set_entry_list(
            self.execute(b"ZRANGE", &[key, start.as_bytes(), stop.as_bytes(), b"WITHSCORES"])
                .await?,
        )
    }

    async fn zrem(&self, key: &[u8], members: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"ZREM", &with_head(&[key], members)).await?)
    }

    async fn zscan(&self, key: &[u8], cursor: &[u8], params: &ScanParams) -> Result<ScanResult<SortedSetEntry>> {
        let args = params.to_args(&[key, cursor]);
        reply::to_sorted_set_scan_result(self.execute(b"ZSCAN", &args).await?)
    }

    // ===== scripting =====

    /// EVAL script numkeys key [key ...] arg [arg ...]
    async fn eval(&self, script: &[u8], keys: &[&[u8]], args: &[&[u8]]) -> Result<Option<Frame>> {
        let numkeys = keys.len().to_string();
        let mut params: Vec<&[u8]> = Vec::with_capacity(keys.len() + args.len() + 2);
        params.push(script);
        params.push(numkeys.as_bytes());
        params.extend_from_slice(keys);
        params.extend_from_slice(args);
        reply::to_object(self.execute(b"EVAL", &params).await?)
    }

    async fn script_exists(&self, sha1s: &[&[u8]]) -> Result<Option<Vec<bool>>> {
        reply::to_boolean_list(self.execute(b"SCRIPT", &with_head(&[&b"EXISTS"[..]], sha1s)).await?)
    }

    // ===== server =====

    async fn dbsize(&self) -> Result<i64> {
        integer(self.execute(b"DBSIZE", &[]).await?)
    }

    async fn flushdb(&self) -> Result<()> {
        reply::to_void(self.execute(b"FLUSHDB", &[]).await?)
    }

    async fn info(&self, section: Option<&[u8]>) -> Result<Option<String>> {
        let frame = match section {
            Some(section) => self.execute(b"INFO", &[section]).await?,
            None => self.execute(b"INFO", &[]).await?,
        };
        reply::to_string(frame)
    }

    /// ROLE，例如 `["master", offset, [[ip, port, offset], ...]]`，各元素原样返回
    async fn role(&self) -> Result<Option<Vec<Frame>>> {
        reply::to_object_list(self.execute(b"ROLE", &[]).await?)
    }

    // ===== hyperloglog =====

    async fn pfadd(&self, key: &[u8], elements: &[&[u8]]) -> Result<bool> {
        reply::to_boolean(self.execute(b"PFADD", &with_head(&[key], elements)).await?)
    }

    async fn pfcount(&self, keys: &[&[u8]]) -> Result<i64> {
        integer(self.execute(b"PFCOUNT", keys).await?)
    }
}

// 整数回复不会是 nil，出现 nil 时视为回复类型不符
fn integer(frame: Frame) -> Result<i64> {
    reply::to_long(frame)?.ok_or(MiniRedisConnectionError::InvalidFrameType)
}

fn with_head<'a>(head: &[&'a [u8]], tail: &[&'a [u8]]) -> Vec<&'a [u8]> {
    let mut params = Vec::with_capacity(head.len() + tail.len());
    params.extend_from_slice(head);
    params.extend_from_slice(tail);
    params
}
