use std::num::ParseIntError;
use std::time::Duration;

use bytes::Bytes;
use clap::Subcommand;

// 命令行工具支持的子命令
#[derive(Subcommand, Debug)]
pub enum Command {
    Ping,
    Get {
        key: String,
    },
    // 可选的过期时间以秒为单位
    Set {
        key: String,

        #[clap(parse(from_str = bytes_from_str))]
        value: Bytes,

        #[clap(parse(try_from_str = duration_from_secs_str))]
        expire: Option<Duration>,
    },
    Del {
        keys: Vec<String>,
    },
    Incr {
        key: String,
    },
    // 在服务端阻塞等待，timeout 为 0 时一直等下去
    Blpop {
        #[clap(long, default_value_t = 0)]
        timeout: i64,

        #[clap(required = true)]
        keys: Vec<String>,
    },
    Scan {
        #[clap(long = "match")]
        pattern: Option<String>,

        #[clap(long)]
        count: Option<usize>,
    },
}

fn duration_from_secs_str(src: &str) -> Result<Duration, ParseIntError> {
    let secs = src.parse::<u64>()?;
    Ok(Duration::from_secs(secs))
}

fn bytes_from_str(src: &str) -> Bytes {
    Bytes::from(src.to_string())
}
