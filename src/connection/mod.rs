//! 连接层：RESP 帧的编解码，以及每条连接上请求与回复的先进先出匹配。

pub(crate) mod connect;
pub mod frame;
pub(crate) mod parse;
pub(crate) mod pending;
