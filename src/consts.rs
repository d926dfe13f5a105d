use std::time::Duration;

/// redis 服务默认端口
pub const DEFAULT_PORT: u16 = 6379;

pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";

/// 建立 TCP 连接的默认超时时间
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 单条命令的默认超时时间，0 表示不设超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// 连接池默认的最大连接数
pub const DEFAULT_MAX_POOLED_CONNS: usize = 8;

/// 回复中数组允许嵌套的最大层数，超过时按协议错误处理
pub const MAX_NESTING_DEPTH: usize = 128;

/// 读缓冲区初始容量
pub(crate) const READ_BUFFER_CAPACITY: usize = 4 * 1024;
