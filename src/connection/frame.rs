//! Provides a type representing a Redis protocol frame as well as utilities for
//! decoding replies from a streaming buffer and encoding commands into bytes.
//!
//! Redis serialization protocol (RESP) specification:
//!  https://redis.io/docs/reference/protocol-spec/

use std::convert::TryInto;
use std::fmt;
use std::io::Cursor;
use std::str;

use atoi::FromRadix10SignedChecked;
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::consts::MAX_NESTING_DEPTH;
use crate::error::MiniRedisParseError;

/// 一个完整的 RESP 帧，也就是服务端返回的原始回复。
///
/// `$-1` 与 `*-1` 都解析为 `Null`，它与空数组、错误回复都不相同。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

// 方便在测试以及回复匹配中直接和字符串比较
impl PartialEq<&str> for Frame {
    fn eq(&self, other: &&str) -> bool {
        match self {
            Frame::Simple(s) => s.eq(other),
            Frame::Bulk(s) => s.eq(other),
            _ => false,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frame::Simple(response) => response.fmt(fmt),
            Frame::Error(msg) => write!(fmt, "error: {}", msg),
            Frame::Integer(num) => num.fmt(fmt),
            // 非 UTF-8 的内容按字节输出
            Frame::Bulk(msg) => match str::from_utf8(msg) {
                Ok(string) => string.fmt(fmt),
                Err(_) => write!(fmt, "{:?}", msg),
            },
            Frame::Null => "(nil)".fmt(fmt),
            Frame::Array(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, " ")?;
                    }
                    part.fmt(fmt)?;
                }
                Ok(())
            }
        }
    }
}

impl Frame {
    /// 创建一个空的 Array 帧
    pub fn array() -> Frame {
        Frame::Array(vec![])
    }

    /// 把命令名和参数组装成由 N+1 个 bulk string 组成的请求帧。
    pub fn command(cmd: &[u8], args: &[&[u8]]) -> Frame {
        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(Frame::Bulk(Bytes::copy_from_slice(cmd)));
        parts.extend(args.iter().map(|arg| Frame::Bulk(Bytes::copy_from_slice(arg))));
        Frame::Array(parts)
    }

    /// 按照 RESP 格式把帧写入 `dst`，数组会递归编码。
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(val) => {
                dst.put_u8(b'+');
                dst.put_slice(val.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(val) => {
                dst.put_u8(b'-');
                dst.put_slice(val.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(val) => {
                dst.put_u8(b':');
                put_decimal(dst, *val);
            }
            Frame::Bulk(val) => {
                dst.put_u8(b'$');
                put_decimal(dst, val.len() as i64);
                dst.put_slice(val);
                dst.put_slice(b"\r\n");
            }
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(parts) => {
                dst.put_u8(b'*');
                put_decimal(dst, parts.len() as i64);
                for part in parts {
                    part.encode(dst);
                }
            }
        }
    }

    /// 从流式缓冲区的头部取出一个完整的帧。
    ///
    /// 数据不足时返回 `Ok(None)`，并且不消耗缓冲区中的任何字节，
    /// 剩余的部分数据会留给下一次调用。
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Frame>, MiniRedisParseError> {
        let mut cursor = Cursor::new(&buf[..]);

        match Frame::check(&mut cursor) {
            Ok(()) => {
                // check 之后 cursor 的位置就是整个帧的长度
                let len = cursor.position() as usize;
                cursor.set_position(0);
                let frame = Frame::parse(&mut cursor)?;

                buf.advance(len);
                Ok(Some(frame))
            }
            Err(MiniRedisParseError::Incomplete) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 检查 `src` 中是否有一个完整且合法的帧，不做内存分配。
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<(), MiniRedisParseError> {
        check_nested(src, 0)
    }

    /// 解析 `src` 中的帧，调用之前必须先通过 [`Frame::check`]。
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, MiniRedisParseError> {
        parse_nested(src, 0)
    }
}

// depth 为当前帧外层数组的层数
fn check_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<(), MiniRedisParseError> {
    match get_u8(src)? {
        b'+' | b'-' => {
            get_line(src)?;
            Ok(())
        }
        b':' => {
            let _ = get_decimal(src)?;
            Ok(())
        }
        b'$' => {
            match get_length(src)? {
                None => Ok(()),
                Some(len) => {
                    // 数据本身加上结尾的 \r\n
                    if src.remaining() < len + 2 {
                        return Err(MiniRedisParseError::Incomplete);
                    }
                    if &src.chunk()[len..len + 2] != b"\r\n" {
                        return Err(MiniRedisParseError::Parse(
                            "bulk string is not terminated by CRLF".into(),
                        ));
                    }
                    skip(src, len + 2)
                }
            }
        }
        b'*' => {
            if let Some(len) = get_length(src)? {
                ensure_depth(depth)?;
                for _ in 0..len {
                    check_nested(src, depth + 1)?;
                }
            }
            Ok(())
        }
        actual => Err(MiniRedisParseError::Parse(format!(
            "invalid frame type byte `{}`",
            actual
        ))),
    }
}

fn parse_nested(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, MiniRedisParseError> {
    match get_u8(src)? {
        b'+' => {
            let line = get_line(src)?.to_vec();
            Ok(Frame::Simple(String::from_utf8(line)?))
        }
        b'-' => {
            let line = get_line(src)?.to_vec();
            Ok(Frame::Error(String::from_utf8(line)?))
        }
        b':' => Ok(Frame::Integer(get_decimal(src)?)),
        b'$' => match get_length(src)? {
            None => Ok(Frame::Null),
            Some(len) => {
                if src.remaining() < len + 2 {
                    return Err(MiniRedisParseError::Incomplete);
                }
                let data = Bytes::copy_from_slice(&src.chunk()[..len]);
                skip(src, len + 2)?;
                Ok(Frame::Bulk(data))
            }
        },
        b'*' => match get_length(src)? {
            None => Ok(Frame::Null),
            Some(len) => {
                ensure_depth(depth)?;
                let mut out = Vec::with_capacity(len);
                for _ in 0..len {
                    out.push(parse_nested(src, depth + 1)?);
                }
                Ok(Frame::Array(out))
            }
        },
        actual => Err(MiniRedisParseError::Parse(format!(
            "invalid frame type byte `{}`",
            actual
        ))),
    }
}

fn ensure_depth(depth: usize) -> Result<(), MiniRedisParseError> {
    if depth >= MAX_NESTING_DEPTH {
        return Err(MiniRedisParseError::Parse(format!(
            "arrays nested deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

fn put_decimal(dst: &mut BytesMut, val: i64) {
    dst.put_slice(val.to_string().as_bytes());
    dst.put_slice(b"\r\n");
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), MiniRedisParseError> {
    if src.remaining() < n {
        return Err(MiniRedisParseError::Incomplete);
    }
    src.advance(n);
    Ok(())
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, MiniRedisParseError> {
    if !src.has_remaining() {
        return Err(MiniRedisParseError::Incomplete);
    }
    Ok(src.get_u8())
}

// 读取一行并解析为有符号整数，整行都必须是数字
fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, MiniRedisParseError> {
    let line = get_line(src)?;
    match i64::from_radix_10_signed_checked(line) {
        (Some(n), used) if used == line.len() && !line.is_empty() => Ok(n),
        _ => Err(MiniRedisParseError::Parse(format!(
            "invalid decimal `{}`",
            String::from_utf8_lossy(line)
        ))),
    }
}

// bulk string 和 array 的长度，`-1` 表示不存在，其他负数都是非法的
fn get_length(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, MiniRedisParseError> {
    match get_decimal(src)? {
        -1 => Ok(None),
        n if n < 0 => Err(MiniRedisParseError::Parse(format!("invalid length {}", n))),
        n => Ok(Some(n.try_into()?)),
    }
}

// 获取一行数据，以 \r\n 结尾
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], MiniRedisParseError> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    if let Some(offset) = buf[start..].windows(2).position(|w| w == b"\r\n") {
        let end = start + offset;
        src.set_position((end + 2) as u64);
        return Ok(&buf[start..end]);
    }

    Err(MiniRedisParseError::Incomplete)
}
