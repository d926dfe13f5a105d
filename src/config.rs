//! 客户端与连接池的配置。
//!
//! 配置可以通过 [`ClientConfigBuilder`] 构造，也可以从环境变量中读取
//! （命令行程序会先用 `dotenv` 把 `.env` 文件加载进环境变量）。

use std::env;
use std::time::Duration;

use bytes::Bytes;

use crate::consts::{DEFAULT_ADDR, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_POOLED_CONNS, DEFAULT_TIMEOUT};
use crate::error::MiniRedisConnectionError;

/// 日志级别对应的环境变量
pub const LOG_LEVEL: &str = "LOG_LEVEL";

pub const REDIS_ADDR: &str = "REDIS_ADDR";
pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
pub const REDIS_DATABASE: &str = "REDIS_DATABASE";
pub const REDIS_CLIENT_NAME: &str = "REDIS_CLIENT_NAME";
pub const REDIS_TIMEOUT_MS: &str = "REDIS_TIMEOUT_MS";
pub const REDIS_CONNECT_TIMEOUT_MS: &str = "REDIS_CONNECT_TIMEOUT_MS";
pub const REDIS_MAX_POOLED_CONNS: &str = "REDIS_MAX_POOLED_CONNS";
pub const REDIS_EXCLUSIVE: &str = "REDIS_EXCLUSIVE";

/// 单个连接以及连接池共用的配置。
///
/// 超时时间为 0 表示不设超时。
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 服务端地址，例如 "127.0.0.1:6379"
    pub addr: String,
    /// 握手时发送 AUTH 使用的密码
    pub password: Option<Bytes>,
    /// 握手时 SELECT 的数据库，0 表示跳过
    pub database: i64,
    /// 握手时 CLIENT SETNAME 使用的名字
    pub client_name: Option<Bytes>,
    pub connect_timeout: Duration,
    /// 每条命令的默认超时时间
    pub timeout: Duration,
    pub max_pooled_conns: usize,
    /// 独占模式下，取出的连接不会再被其他调用者共享
    pub exclusive: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: DEFAULT_ADDR.to_string(),
            password: None,
            database: 0,
            client_name: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
            max_pooled_conns: DEFAULT_MAX_POOLED_CONNS,
            exclusive: false,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// 在默认配置的基础上读取 `REDIS_*` 环境变量。
    ///
    /// 环境变量的值无法解析时返回 `InvalidArgument`。
    pub fn from_env() -> Result<ClientConfig, MiniRedisConnectionError> {
        let mut builder = ClientConfig::builder();

        if let Ok(addr) = env::var(REDIS_ADDR) {
            builder = builder.addr(addr);
        }
        if let Ok(password) = env::var(REDIS_PASSWORD) {
            builder = builder.password(password);
        }
        if let Ok(name) = env::var(REDIS_CLIENT_NAME) {
            builder = builder.client_name(name);
        }
        if let Some(db) = env_number::<i64>(REDIS_DATABASE)? {
            builder = builder.database(db);
        }
        if let Some(ms) = env_number::<u64>(REDIS_TIMEOUT_MS)? {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = env_number::<u64>(REDIS_CONNECT_TIMEOUT_MS)? {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(n) = env_number::<usize>(REDIS_MAX_POOLED_CONNS)? {
            builder = builder.max_pooled_conns(n);
        }
        if let Ok(exclusive) = env::var(REDIS_EXCLUSIVE) {
            builder = builder.exclusive(matches!(
                exclusive.to_lowercase().as_str(),
                "1" | "true" | "yes"
            ));
        }

        builder.build()
    }
}

fn env_number<T: std::str::FromStr>(key: &str) -> Result<Option<T>, MiniRedisConnectionError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| MiniRedisConnectionError::InvalidArgument(format!("{}={}", key, value))),
        Err(_) => Ok(None),
    }
}

/// [`ClientConfig`] 的构造器。
#[derive(Debug, Default, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    pub fn password(mut self, password: impl Into<Bytes>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: i64) -> Self {
        self.config.database = database;
        self
    }

    pub fn client_name(mut self, name: impl Into<Bytes>) -> Self {
        self.config.client_name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_pooled_conns(mut self, max: usize) -> Self {
        self.config.max_pooled_conns = max;
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.config.exclusive = exclusive;
        self
    }

    pub fn build(self) -> Result<ClientConfig, MiniRedisConnectionError> {
        if self.config.max_pooled_conns == 0 {
            return Err(MiniRedisConnectionError::InvalidArgument(
                "max_pooled_conns must be greater than 0".into(),
            ));
        }
        if self.config.database < 0 {
            return Err(MiniRedisConnectionError::InvalidArgument(format!(
                "invalid database index {}",
                self.config.database
            )));
        }
        Ok(self.config)
    }
}
