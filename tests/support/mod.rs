//! 测试用的 RESP 服务端。
//!
//! 只实现测试需要的命令，数据保存在内存中。每条收到的命令都会被记录下来，
//! 测试可以据此检查客户端实际发出了哪些命令、建立了多少条连接。

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use mini_redis_pool::config::{ClientConfig, ClientConfigBuilder};
use mini_redis_pool::Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant};

pub struct MockServer {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

struct Shared {
    password: Option<Bytes>,
    commands: Mutex<Vec<Vec<Bytes>>>,
    connections: AtomicUsize,
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    strings: BTreeMap<Bytes, Bytes>,
    hashes: HashMap<Bytes, BTreeMap<Bytes, Bytes>>,
    sets: HashMap<Bytes, BTreeSet<Bytes>>,
    zsets: HashMap<Bytes, Vec<(Bytes, f64)>>,
    lists: HashMap<Bytes, VecDeque<Bytes>>,
}

impl MockServer {
    pub async fn start() -> MockServer {
        MockServer::start_with_password(None).await
    }

    pub async fn start_with_password(password: Option<&str>) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shared = Arc::new(Shared {
            password: password.map(|p| Bytes::copy_from_slice(p.as_bytes())),
            commands: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
            store: Mutex::new(Store::default()),
        });

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_shared.connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle(accept_shared.clone(), socket));
            }
        });

        MockServer { addr, shared }
    }

    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    /// 指向这个服务端的配置
    pub fn config(&self) -> ClientConfigBuilder {
        ClientConfig::builder().addr(self.addr_string())
    }

    /// 收到的所有命令，命令名统一为大写
    pub fn commands(&self) -> Vec<Vec<Bytes>> {
        self.shared.commands.lock().unwrap().clone()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands()
            .iter()
            .map(|cmd| String::from_utf8_lossy(&cmd[0]).into_owned())
            .collect()
    }

    /// 接受过的连接数
    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }
}

async fn handle(shared: Arc<Shared>, mut socket: TcpStream) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut client_name: Option<Bytes> = None;

    loop {
        while let Ok(Some(frame)) = Frame::decode(&mut buf) {
            let args = match to_args(frame) {
                Some(args) => args,
                None => return,
            };
            shared.commands.lock().unwrap().push(args.clone());

            let reply = match &args[0][..] {
                // 永远不回复，用来触发客户端超时
                b"HANG" => std::future::pending::<Frame>().await,
                b"BLPOP" => blpop(&shared, &args[1..]).await,
                b"CLIENT" => client(&args[1..], &mut client_name),
                _ => execute(&shared, &args),
            };

            let mut out = BytesMut::new();
            reply.encode(&mut out);
            if socket.write_all(&out).await.is_err() {
                return;
            }
        }

        match socket.read_buf(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

fn to_args(frame: Frame) -> Option<Vec<Bytes>> {
    let Frame::Array(parts) = frame else {
        return None;
    };
    let mut args = Vec::with_capacity(parts.len());
    for (i, part) in parts.into_iter().enumerate() {
        let Frame::Bulk(data) = part else {
            return None;
        };
        if i == 0 {
            args.push(Bytes::from(data.to_ascii_uppercase()));
        } else {
            args.push(data);
        }
    }
    if args.is_empty() {
        None
    } else {
        Some(args)
    }
}

fn ok() -> Frame {
    Frame::Simple("OK".to_string())
}

fn err(msg: &str) -> Frame {
    Frame::Error(msg.to_string())
}

fn bulk_array(values: impl IntoIterator<Item = Bytes>) -> Frame {
    Frame::Array(values.into_iter().map(Frame::Bulk).collect())
}

fn number<T: std::str::FromStr>(data: &[u8]) -> Option<T> {
    std::str::from_utf8(data).ok()?.parse().ok()
}

fn client(args: &[Bytes], name: &mut Option<Bytes>) -> Frame {
    match args.first().map(|sub| sub.to_ascii_uppercase()).as_deref() {
        Some(b"SETNAME") if args.len() == 2 => {
            *name = Some(args[1].clone());
            ok()
        }
        Some(b"GETNAME") => name.clone().map(Frame::Bulk).unwrap_or(Frame::Null),
        _ => err("ERR unknown subcommand"),
    }
}

async fn blpop(shared: &Shared, args: &[Bytes]) -> Frame {
    let Some((timeout, keys)) = args.split_last() else {
        return err("ERR wrong number of arguments for 'blpop' command");
    };
    let Some(timeout) = number::<u64>(timeout) else {
        return err("ERR timeout is not an integer or out of range");
    };
    let deadline = (timeout > 0).then(|| Instant::now() + Duration::from_secs(timeout));

    loop {
        {
            let mut store = shared.store.lock().unwrap();
            for key in keys {
                if let Some(value) = store.lists.get_mut(key).and_then(|list| list.pop_front()) {
                    return bulk_array([key.clone(), value]);
                }
            }
        }
        if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
            return Frame::Null;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
}

fn execute(shared: &Shared, args: &[Bytes]) -> Frame {
    let mut store = shared.store.lock().unwrap();
    let cmd = &args[0][..];
    let args = &args[1..];

    match (cmd, args.len()) {
        (b"PING", 0) => Frame::Simple("PONG".to_string()),
        (b"ROLE", 0) => Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"master")),
            Frame::Integer(0),
            Frame::array(),
        ]),
        (b"PING", 1) | (b"ECHO", 1) => Frame::Bulk(args[0].clone()),
        (b"AUTH", 1) => match &shared.password {
            Some(password) if password == &args[0] => ok(),
            Some(_) => err("WRONGPASS invalid username-password pair"),
            None => err("ERR AUTH called without any password configured"),
        },
        (b"SELECT", 1) => match number::<i64>(&args[0]) {
            Some(db) if (0..16).contains(&db) => ok(),
            _ => err("ERR DB index is out of range"),
        },
        (b"GET", 1) => store
            .strings
            .get(&args[0])
            .cloned()
            .map(Frame::Bulk)
            .unwrap_or(Frame::Null),
        (b"SET", n) if n >= 2 => {
            let nx = args[2..].iter().any(|opt| opt.eq_ignore_ascii_case(b"NX"));
            if nx && store.strings.contains_key(&args[0]) {
                return Frame::Null;
            }
            store.strings.insert(args[0].clone(), args[1].clone());
            ok()
        }
        (b"DEL", n) if n >= 1 => {
            let mut removed = 0;
            for key in args {
                if store.remove(key) {
                    removed += 1;
                }
            }
            Frame::Integer(removed)
        }
        (b"EXISTS", 1) => Frame::Integer(store.contains(&args[0]) as i64),
        (b"INCR", 1) => {
            let current = match store.strings.get(&args[0]) {
                Some(value) => match number::<i64>(value) {
                    Some(n) => n,
                    None => return err("ERR value is not an integer or out of range"),
                },
                None => 0,
            };
            let next = current + 1;
            store
                .strings
                .insert(args[0].clone(), Bytes::from(next.to_string()));
            Frame::Integer(next)
        }
        (b"HSET", 3) => {
            let hash = store.hashes.entry(args[0].clone()).or_default();
            let added = hash.insert(args[1].clone(), args[2].clone()).is_none();
            Frame::Integer(added as i64)
        }
        (b"HGETALL", 1) => match store.hashes.get(&args[0]) {
            Some(hash) => bulk_array(
                hash.iter()
                    .flat_map(|(field, value)| [field.clone(), value.clone()]),
            ),
            None => Frame::array(),
        },
        (b"SADD", n) if n >= 2 => {
            let set = store.sets.entry(args[0].clone()).or_default();
            let added = args[1..]
                .iter()
                .filter(|member| set.insert((*member).clone()))
                .count();
            Frame::Integer(added as i64)
        }
        (b"SMEMBERS", 1) => match store.sets.get(&args[0]) {
            Some(set) => bulk_array(set.iter().cloned()),
            None => Frame::array(),
        },
        (b"ZADD", 3) => {
            let Some(score) = number::<f64>(&args[1]) else {
                return err("ERR value is not a valid float");
            };
            let zset = store.zsets.entry(args[0].clone()).or_default();
            let added = match zset.iter_mut().find(|(member, _)| member == &args[2]) {
                Some(entry) => {
                    entry.1 = score;
                    0
                }
                None => {
                    zset.push((args[2].clone(), score));
                    1
                }
            };
            zset.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
            Frame::Integer(added)
        }
        (b"ZRANGE", 3) | (b"ZRANGE", 4) => {
            let with_scores = args.len() == 4;
            let (Some(start), Some(stop)) = (number::<i64>(&args[1]), number::<i64>(&args[2])) else {
                return err("ERR value is not an integer or out of range");
            };
            let zset = store.zsets.get(&args[0]).cloned().unwrap_or_default();
            let mut out = Vec::new();
            for (member, score) in range(&zset, start, stop) {
                out.push(member.clone());
                if with_scores {
                    out.push(Bytes::from(score.to_string()));
                }
            }
            bulk_array(out)
        }
        (b"RPUSH", n) if n >= 2 => {
            let list = store.lists.entry(args[0].clone()).or_default();
            list.extend(args[1..].iter().cloned());
            Frame::Integer(list.len() as i64)
        }
        (b"SCAN", _) => scan(&store, args),
        _ => err(&format!(
            "ERR unknown command '{}'",
            String::from_utf8_lossy(cmd)
        )),
    }
}

fn range<T>(items: &[T], start: i64, stop: i64) -> &[T] {
    let len = items.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return &[];
    }
    &items[start as usize..=stop as usize]
}

// 游标就是字符串 key 的下标，只支持 `prefix*` 形式的 MATCH
fn scan(store: &Store, args: &[Bytes]) -> Frame {
    let Some(cursor) = args.first().and_then(|c| number::<usize>(c)) else {
        return err("ERR invalid cursor");
    };
    let mut pattern: Option<Bytes> = None;
    let mut count = 10;
    for opt in args[1..].chunks(2) {
        match (opt[0].to_ascii_uppercase().as_slice(), opt.get(1)) {
            (b"MATCH", Some(p)) => pattern = Some(p.clone()),
            (b"COUNT", Some(n)) => count = number::<usize>(n).unwrap_or(10).max(1),
            _ => return err("ERR syntax error"),
        }
    }

    let keys: Vec<&Bytes> = store.strings.keys().collect();
    let end = (cursor + count).min(keys.len());
    let page = keys
        .get(cursor..end)
        .unwrap_or_default()
        .iter()
        .filter(|key| matches(pattern.as_deref(), key))
        .map(|key| (*key).clone());
    let next = if end >= keys.len() { 0 } else { end };

    Frame::Array(vec![
        Frame::Bulk(Bytes::from(next.to_string())),
        bulk_array(page),
    ])
}

fn matches(pattern: Option<&[u8]>, key: &[u8]) -> bool {
    match pattern {
        None => true,
        Some(pattern) => match pattern.strip_suffix(b"*") {
            Some(prefix) => key.starts_with(prefix),
            None => pattern == key,
        },
    }
}

impl Store {
    fn contains(&self, key: &Bytes) -> bool {
        self.strings.contains_key(key)
            || self.hashes.contains_key(key)
            || self.sets.contains_key(key)
            || self.zsets.contains_key(key)
            || self.lists.contains_key(key)
    }

    fn remove(&mut self, key: &Bytes) -> bool {
        self.strings.remove(key).is_some()
            | self.hashes.remove(key).is_some()
            | self.sets.remove(key).is_some()
            | self.zsets.remove(key).is_some()
            | self.lists.remove(key).is_some()
    }
}
