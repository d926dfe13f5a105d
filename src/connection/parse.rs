use std::vec;

use bytes::Bytes;

use crate::connection::frame::Frame;
use crate::error::MiniRedisParseError;

/// 按顺序读取数组回复中各个元素的游标。
///
/// 回复转换层用它来拆解 `[cursor, [elements...]]`、`key value key value ...`
/// 这类扁平或嵌套的数组。
#[derive(Debug)]
pub(crate) struct Parse {
    /// Array frame iterator.
    parts: vec::IntoIter<Frame>,
}

impl Parse {
    /// 如果 `frame` 不是数组帧，返回错误。
    pub(crate) fn new(frame: Frame) -> Result<Parse, MiniRedisParseError> {
        let array = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(MiniRedisParseError::Parse(format!(
                    "expected array, got {:?}",
                    frame
                )))
            }
        };

        Ok(Parse {
            parts: array.into_iter(),
        })
    }

    /// 剩余未读取的元素个数
    pub(crate) fn remaining(&self) -> usize {
        self.parts.len()
    }

    pub(crate) fn next(&mut self) -> Result<Frame, MiniRedisParseError> {
        self.parts.next().ok_or(MiniRedisParseError::EndOfStream)
    }

    /// 返回下一个元素的原始字节，只接受 `Simple` 和 `Bulk`。
    pub(crate) fn next_bytes(&mut self) -> Result<Bytes, MiniRedisParseError> {
        match self.next()? {
            Frame::Simple(s) => Ok(Bytes::from(s.into_bytes())),
            Frame::Bulk(data) => Ok(data),
            frame => Err(MiniRedisParseError::Parse(format!(
                "expected simple frame or bulk frame, got {:?}",
                frame
            ))),
        }
    }

    /// 与 [`Parse::next_bytes`] 相同，但 `Null` 元素返回 `None`（MGET 的缺失值）。
    pub(crate) fn next_optional_bytes(&mut self) -> Result<Option<Bytes>, MiniRedisParseError> {
        match self.next()? {
            Frame::Null => Ok(None),
            Frame::Simple(s) => Ok(Some(Bytes::from(s.into_bytes()))),
            Frame::Bulk(data) => Ok(Some(data)),
            frame => Err(MiniRedisParseError::Parse(format!(
                "expected bulk frame or null, got {:?}",
                frame
            ))),
        }
    }

    /// `Integer`、`Simple` 和 `Bulk` 都可以表示整数，后两者需要解析。
    pub(crate) fn next_int(&mut self) -> Result<i64, MiniRedisParseError> {
        use atoi::atoi;

        match self.next()? {
            Frame::Integer(v) => Ok(v),
            Frame::Simple(data) => atoi::<i64>(data.as_bytes())
                .ok_or_else(|| MiniRedisParseError::Parse("invalid number".into())),
            Frame::Bulk(data) => {
                atoi::<i64>(&data).ok_or_else(|| MiniRedisParseError::Parse("invalid number".into()))
            }
            frame => Err(MiniRedisParseError::Parse(format!(
                "expected int frame but got {:?}",
                frame
            ))),
        }
    }

    /// 分数等浮点数以 ASCII 字符串的形式出现在 bulk 中
    pub(crate) fn next_double(&mut self) -> Result<f64, MiniRedisParseError> {
        let data = self.next_bytes()?;
        parse_double(&data)
    }

    /// 下一个元素本身也必须是数组，返回它的游标。
    pub(crate) fn next_array(&mut self) -> Result<Parse, MiniRedisParseError> {
        Parse::new(self.next()?)
    }

    /// 确保数组中没有更多元素
    pub(crate) fn finish(&mut self) -> Result<(), MiniRedisParseError> {
        if self.parts.next().is_none() {
            Ok(())
        } else {
            Err(MiniRedisParseError::Parse(
                "expected end of frame, but there was more".into(),
            ))
        }
    }
}

/// 以 ASCII 解析浮点数，兼容服务端返回的 `inf`、`-inf`、`+inf`。
pub(crate) fn parse_double(data: &[u8]) -> Result<f64, MiniRedisParseError> {
    let text = std::str::from_utf8(data)
        .map_err(|_| MiniRedisParseError::Parse("invalid double".into()))?;

    match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|_| MiniRedisParseError::Parse(format!("invalid double `{}`", text))),
    }
}
