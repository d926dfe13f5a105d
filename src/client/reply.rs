//! 把原始回复 [`Frame`] 转换为具体的结果类型。
//!
//! 每个函数都遵循同样的三步判断：
//!
//! 1. `Frame::Error` 转换为 `CommandExecute` 错误；
//! 2. `Frame::Null` 转换为该类型的“不存在”：布尔值为 `false`，其他类型为 `None`；
//! 3. 其余情况按具体的形状转换，形状不符时返回 `InvalidFrameType`。
//!
//! 这些函数都是纯函数，不依赖也不修改任何共享状态。

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use log::debug;

use crate::connection::frame::Frame;
use crate::connection::parse::{parse_double, Parse};
use crate::error::{MiniRedisConnectionError, MiniRedisParseError};

type Result<T> = std::result::Result<T, MiniRedisConnectionError>;

/// HGETALL / HSCAN 中的一个字段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashEntry {
    pub field: Bytes,
    pub value: Bytes,
}

/// 有序集合中的成员及其分数。
#[derive(Debug, Clone, PartialEq)]
pub struct SortedSetEntry {
    pub member: Bytes,
    pub score: f64,
}

/// SCAN 系列命令的一页结果。
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult<T> {
    /// 下一次调用使用的游标，为 "0" 时表示遍历结束
    pub cursor: Bytes,
    pub values: Vec<T>,
}

impl<T> ScanResult<T> {
    pub fn is_finished(&self) -> bool {
        self.cursor.as_ref() == b"0"
    }
}

/// 只关心命令是否成功的回复，例如 `+OK`。
pub fn to_void(frame: Frame) -> Result<()> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        _ => Ok(()),
    }
}

pub fn to_boolean(frame: Frame) -> Result<bool> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(false),
        Frame::Simple(_) => Ok(true),
        Frame::Integer(n) => Ok(n != 0),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

pub fn to_long(frame: Frame) -> Result<Option<i64>> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        Frame::Integer(n) => Ok(Some(n)),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

/// 浮点数以 ASCII 字符串的形式放在 bulk 中返回，例如 ZSCORE、INCRBYFLOAT。
pub fn to_double(frame: Frame) -> Result<Option<f64>> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        Frame::Bulk(data) => Ok(Some(parse_double(&data)?)),
        Frame::Simple(data) => Ok(Some(parse_double(data.as_bytes())?)),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

/// 不存在的值返回 `None`，与空字节串区分开。
pub fn to_bytes(frame: Frame) -> Result<Option<Bytes>> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        Frame::Bulk(data) => Ok(Some(data)),
        Frame::Simple(data) => Ok(Some(Bytes::from(data))),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

pub fn to_string(frame: Frame) -> Result<Option<String>> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        Frame::Simple(data) => Ok(Some(data)),
        Frame::Bulk(data) => String::from_utf8(data.to_vec())
            .map(Some)
            .map_err(|e| MiniRedisParseError::from(e).into()),
        Frame::Integer(n) => Ok(Some(n.to_string())),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

/// 不做任何转换，只处理错误和不存在两种情况（EVAL 等返回任意形状的命令）。
pub fn to_object(frame: Frame) -> Result<Option<Frame>> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        frame => Ok(Some(frame)),
    }
}

pub fn to_list(frame: Frame) -> Result<Option<Vec<Bytes>>> {
    with_array(frame, |mut parse| {
        let mut values = Vec::with_capacity(parse.remaining());
        while parse.remaining() > 0 {
            values.push(parse.next_bytes()?);
        }
        Ok(values)
    })
}

/// 数组中允许出现不存在的元素，例如 MGET、HMGET。
pub fn to_nullable_list(frame: Frame) -> Result<Option<Vec<Option<Bytes>>>> {
    with_array(frame, |mut parse| {
        let mut values = Vec::with_capacity(parse.remaining());
        while parse.remaining() > 0 {
            values.push(parse.next_optional_bytes()?);
        }
        Ok(values)
    })
}

pub fn to_object_list(frame: Frame) -> Result<Option<Vec<Frame>>> {
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        Frame::Array(values) => Ok(Some(values)),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

/// 整数数组，非 0 为 `true`（SCRIPT EXISTS）。
pub fn to_boolean_list(frame: Frame) -> Result<Option<Vec<bool>>> {
    with_array(frame, |mut parse| {
        let mut values = Vec::with_capacity(parse.remaining());
        while parse.remaining() > 0 {
            values.push(parse.next_int()? != 0);
        }
        Ok(values)
    })
}

/// 按字节序排列的集合
pub fn to_set(frame: Frame) -> Result<Option<BTreeSet<Bytes>>> {
    Ok(to_list(frame)?.map(|values| values.into_iter().collect()))
}

/// `key value key value ...` 形式的扁平数组，按 key 的字节序排列。
pub fn to_map(frame: Frame) -> Result<Option<BTreeMap<Bytes, Bytes>>> {
    Ok(to_hash_entry_list(frame)?.map(|entries| {
        entries
            .into_iter()
            .map(|entry| (entry.field, entry.value))
            .collect()
    }))
}

/// 与 [`to_map`] 相同，但保留服务端返回的顺序。
pub fn to_hash_entry_list(frame: Frame) -> Result<Option<Vec<HashEntry>>> {
    with_array(frame, hash_entries)
}

/// `member score member score ...` 形式的扁平数组（ZRANGE ... WITHSCORES）。
pub fn to_sorted_set_entry_list(frame: Frame) -> Result<Option<Vec<SortedSetEntry>>> {
    with_array(frame, sorted_set_entries)
}

/// `[cursor, [element, ...]]`，SCAN / SSCAN 的回复。
pub fn to_array_scan_result(frame: Frame) -> Result<ScanResult<Bytes>> {
    scan_result(frame, |mut parse| {
        let mut values = Vec::with_capacity(parse.remaining());
        while parse.remaining() > 0 {
            values.push(parse.next_bytes()?);
        }
        Ok(values)
    })
}

/// `[cursor, [field, value, ...]]`，HSCAN 的回复。
pub fn to_hash_scan_result(frame: Frame) -> Result<ScanResult<HashEntry>> {
    scan_result(frame, hash_entries)
}

/// `[cursor, [member, score, ...]]`，ZSCAN 的回复。
pub fn to_sorted_set_scan_result(frame: Frame) -> Result<ScanResult<SortedSetEntry>> {
    scan_result(frame, sorted_set_entries)
}

// 错误 / 不存在 / 数组 三种情况的公共部分
fn with_array<T, F>(frame: Frame, convert: F) -> Result<Option<T>>
where
    F: FnOnce(Parse) -> std::result::Result<T, MiniRedisParseError>,
{
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        Frame::Null => Ok(None),
        frame @ Frame::Array(_) => Parse::new(frame)
            .and_then(convert)
            .map(Some)
            .map_err(shape_mismatch),
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

fn scan_result<T, F>(frame: Frame, convert: F) -> Result<ScanResult<T>>
where
    F: FnOnce(Parse) -> std::result::Result<Vec<T>, MiniRedisParseError>,
{
    match frame {
        Frame::Error(msg) => Err(MiniRedisConnectionError::CommandExecute(msg)),
        frame @ Frame::Array(_) => {
            let page = || -> std::result::Result<ScanResult<T>, MiniRedisParseError> {
                let mut parse = Parse::new(frame)?;
                let cursor = parse.next_bytes()?;
                let values = convert(parse.next_array()?)?;
                parse.finish()?;
                Ok(ScanResult { cursor, values })
            };
            page().map_err(shape_mismatch)
        }
        _ => Err(MiniRedisConnectionError::InvalidFrameType),
    }
}

// 数组内部的元素与期望的形状不符
fn shape_mismatch(e: MiniRedisParseError) -> MiniRedisConnectionError {
    debug!("unexpected reply shape: {}", e);
    MiniRedisConnectionError::InvalidFrameType
}

fn hash_entries(mut parse: Parse) -> std::result::Result<Vec<HashEntry>, MiniRedisParseError> {
    ensure_pairs(&parse)?;
    let mut entries = Vec::with_capacity(parse.remaining() / 2);
    while parse.remaining() > 0 {
        entries.push(HashEntry {
            field: parse.next_bytes()?,
            value: parse.next_bytes()?,
        });
    }
    Ok(entries)
}

fn sorted_set_entries(mut parse: Parse) -> std::result::Result<Vec<SortedSetEntry>, MiniRedisParseError> {
    ensure_pairs(&parse)?;
    let mut entries = Vec::with_capacity(parse.remaining() / 2);
    while parse.remaining() > 0 {
        entries.push(SortedSetEntry {
            member: parse.next_bytes()?,
            score: parse.next_double()?,
        });
    }
    Ok(entries)
}

fn ensure_pairs(parse: &Parse) -> std::result::Result<(), MiniRedisParseError> {
    if parse.remaining() % 2 != 0 {
        return Err(MiniRedisParseError::Parse(format!(
            "expected key/value pairs, got {} elements",
            parse.remaining()
        )));
    }
    Ok(())
}
