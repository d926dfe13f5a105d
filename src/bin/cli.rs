use bytes::Bytes;
use clap::Parser;
use dotenv::dotenv;
use log::debug;

use mini_redis_pool::client::cmd::Command;
use mini_redis_pool::client::scan::{scan_stream, ScanParams};
use mini_redis_pool::config::ClientConfig;
use mini_redis_pool::consts::DEFAULT_PORT;
use mini_redis_pool::error::MiniRedisClientError;
use mini_redis_pool::{logger, Commands, PooledClient};
use tokio_stream::StreamExt;

#[derive(Parser, Debug)]
#[clap(
    name = "mini-redis-pool-cli",
    version,
    author,
    about = "Issue Redis commands through a connection pool"
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(name = "hostname", long, default_value = "127.0.0.1")]
    host: String,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[clap(long)]
    password: Option<String>,

    #[clap(long, default_value_t = 0)]
    db: i64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), MiniRedisClientError> {
    dotenv().ok();
    logger::init()?;

    let cli = Cli::parse();
    debug!("client started: {:?}", cli);

    // 命令行参数覆盖环境变量中的配置
    let mut config = ClientConfig::from_env()?;
    config.addr = format!("{}:{}", cli.host, cli.port);
    if let Some(password) = cli.password {
        config.password = Some(Bytes::from(password));
    }
    if cli.db != 0 {
        config.database = cli.db;
    }

    let client = PooledClient::with_config(config);
    let res = run(&client, cli.command).await;
    client.close().await;

    res
}

async fn run(client: &PooledClient, command: Command) -> Result<(), MiniRedisClientError> {
    match command {
        Command::Ping => {
            let pong = client.ping().await?;
            println!("\"{}\"", pong.unwrap_or_default());
        }

        Command::Get { key } => match client.get(key.as_bytes()).await? {
            Some(value) => print_bytes(&value),
            None => println!("(nil)"),
        },

        Command::Set {
            key,
            value,
            expire: None,
        } => {
            client.set(key.as_bytes(), &value).await?;
            println!("OK");
        }

        Command::Set {
            key,
            value,
            expire: Some(expire),
        } => {
            let seconds = i64::try_from(expire.as_secs()).unwrap_or(i64::MAX);
            client.set_ex(key.as_bytes(), &value, seconds).await?;
            println!("OK");
        }

        Command::Del { keys } => {
            let keys: Vec<&[u8]> = keys.iter().map(|key| key.as_bytes()).collect();
            println!("(integer) {}", client.del(&keys).await?);
        }

        Command::Incr { key } => {
            println!("(integer) {}", client.incr(key.as_bytes()).await?);
        }

        Command::Blpop { timeout, keys } => {
            let keys: Vec<&[u8]> = keys.iter().map(|key| key.as_bytes()).collect();
            match client.blpop(timeout, &keys).await? {
                Some(values) => values.iter().for_each(|value| print_bytes(value)),
                None => println!("(nil)"),
            }
        }

        Command::Scan { pattern, count } => {
            let mut params = ScanParams::new();
            if let Some(pattern) = pattern {
                params = params.pattern(pattern);
            }
            if let Some(count) = count {
                params = params.count(count);
            }

            let keys = scan_stream(client, params);
            tokio::pin!(keys);
            while let Some(key) = keys.next().await {
                print_bytes(&key?);
            }
        }
    }
    Ok(())
}

fn print_bytes(value: &Bytes) {
    if let Ok(s) = std::str::from_utf8(value) {
        println!("\"{}\"", s);
    } else {
        println!("{:?}", value);
    }
}
