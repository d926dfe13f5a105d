use std::time::Duration;

use bytes::Bytes;
use mini_redis_pool::client;
use mini_redis_pool::error::MiniRedisConnectionError;
use mini_redis_pool::{Commands, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time;

mod support;

use support::MockServer;

/// 一个基本的 set / get 测试
#[tokio::test]
async fn key_value_get_set() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    assert_eq!(client.ping().await.unwrap().as_deref(), Some("PONG"));
    assert!(client.set(b"hello", b"world").await.unwrap());

    let value = client.get(b"hello").await.unwrap().unwrap();
    assert_eq!(b"world", &value[..]);
}

/// 不存在的值：bytes 类型返回 None 而不是空串，boolean 类型返回 false
#[tokio::test]
async fn absent_replies() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    assert_eq!(client.get(b"missing").await.unwrap(), None);
    assert!(!client.exists(b"missing").await.unwrap());

    assert!(client.set(b"empty", b"").await.unwrap());
    assert_eq!(client.get(b"empty").await.unwrap(), Some(Bytes::new()));

    assert!(client.set_nx(b"once", b"1").await.unwrap());
    assert!(!client.set_nx(b"once", b"2").await.unwrap());
    assert_eq!(client.get(b"once").await.unwrap(), Some(Bytes::from_static(b"1")));
}

/// ROLE 回复中的元素类型各不相同，原样交给调用方
#[tokio::test]
async fn role_keeps_mixed_elements() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    let role = client.role().await.unwrap().unwrap();
    assert_eq!(
        role,
        vec![
            Frame::Bulk(Bytes::from_static(b"master")),
            Frame::Integer(0),
            Frame::Array(vec![]),
        ]
    );
}

/// 同一连接上连续发出的命令按发出顺序得到回复
#[tokio::test]
async fn replies_follow_issue_order() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    let big = vec![b'x'; 256 * 1024];
    let (first, echoed, second, third) = tokio::join!(
        client.incr(b"counter"),
        client.echo(&big),
        client.incr(b"counter"),
        client.incr(b"counter"),
    );

    assert_eq!(first.unwrap(), 1);
    assert_eq!(echoed.unwrap().unwrap().len(), big.len());
    assert_eq!(second.unwrap(), 2);
    assert_eq!(third.unwrap(), 3);

    // 只用了一条连接
    assert_eq!(server.connections(), 1);
}

/// 多个任务共享同一个 Client，每个任务都拿到自己命令的回复
#[tokio::test]
async fn concurrent_callers_get_their_own_replies() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    let mut handles = vec![];
    for i in 0..100 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let msg = format!("message-{}", i);
            let reply = client.execute(b"ECHO", &[msg.as_bytes()]).await.unwrap();
            assert_eq!(reply, Frame::Bulk(Bytes::from(msg)));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

/// 服务端的错误回复只影响当前命令，连接仍然可用
#[tokio::test]
async fn server_error_keeps_connection_usable() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    client.set(b"text", b"not a number").await.unwrap();
    let err = client.incr(b"text").await.unwrap_err();
    assert!(matches!(err, MiniRedisConnectionError::CommandExecute(msg) if msg.starts_with("ERR")));

    assert!(client.is_open());
    assert_eq!(client.incr(b"number").await.unwrap(), 1);
}

/// 一条命令超时后，排在它前后的所有未完成命令都以同一个原因失败，连接被关闭
#[tokio::test]
async fn timeout_fails_every_pending_command() {
    let server = MockServer::start().await;
    let config = server
        .config()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let client = client::connect_with(&config).await.unwrap();

    let (before, hang, after) = tokio::join!(
        client.execute(b"PING", &[]),
        client.execute(b"HANG", &[]),
        client.execute(b"PING", &[]),
    );

    assert_eq!(before.unwrap(), "PONG");
    assert!(matches!(hang, Err(MiniRedisConnectionError::Timeout)));
    assert!(matches!(after, Err(MiniRedisConnectionError::Timeout)));

    client.closed().await;
    assert!(!client.is_open());
    assert!(matches!(
        client.ping().await,
        Err(MiniRedisConnectionError::Closed(_))
    ));
}

/// 超时为 0 时命令可以一直等待
#[tokio::test]
async fn zero_timeout_disables_deadline() {
    let server = MockServer::start().await;
    let config = server
        .config()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let client = client::connect_with(&config).await.unwrap();

    let previous = client.set_timeout(Duration::ZERO).unwrap();
    assert_eq!(previous, Duration::from_millis(50));

    // 服务端等待 1 秒后回复 nil
    let popped = client.blpop(1, &[b"queue"]).await.unwrap();
    assert_eq!(popped, None);

    assert_eq!(client.set_timeout(previous).unwrap(), Duration::ZERO);
    assert_eq!(client.timeout(), Duration::from_millis(50));
}

#[tokio::test]
async fn set_timeout_fails_after_close() {
    let server = MockServer::start().await;
    let client = client::connect(server.addr).await.unwrap();

    client.close();
    client.closed().await;

    assert!(matches!(
        client.set_timeout(Duration::from_secs(3)),
        Err(MiniRedisConnectionError::Closed(_))
    ));
}

/// 没有密码、数据库为 0、没有名字时，握手不产生任何命令
#[tokio::test]
async fn handshake_skips_unconfigured_steps() {
    let server = MockServer::start().await;
    let config = server.config().build().unwrap();
    let client = client::connect_with(&config).await.unwrap();

    assert!(client.is_open());
    assert!(server.commands().is_empty());

    client.ping().await.unwrap();
    assert_eq!(server.command_names(), vec!["PING"]);
}

/// 握手依次执行 AUTH、SELECT、CLIENT SETNAME
#[tokio::test]
async fn handshake_runs_in_order() {
    let server = MockServer::start_with_password(Some("secret")).await;
    let config = server
        .config()
        .password("secret")
        .database(3)
        .client_name("worker-1")
        .build()
        .unwrap();
    let client = client::connect_with(&config).await.unwrap();

    let commands = server.commands();
    assert_eq!(server.command_names(), vec!["AUTH", "SELECT", "CLIENT"]);
    assert_eq!(&commands[0][1][..], b"secret");
    assert_eq!(&commands[1][1][..], b"3");
    assert_eq!(&commands[2][1..], &[Bytes::from_static(b"SETNAME"), Bytes::from_static(b"worker-1")]);

    let name = client.client_getname().await.unwrap();
    assert_eq!(name, Some(Bytes::from_static(b"worker-1")));
}

/// 握手失败时停在失败的那一步，连接不会交给调用方
#[tokio::test]
async fn handshake_stops_at_first_failure() {
    let server = MockServer::start_with_password(Some("secret")).await;
    let config = server
        .config()
        .password("wrong")
        .database(3)
        .build()
        .unwrap();

    let err = client::connect_with(&config).await.unwrap_err();
    assert!(matches!(err, MiniRedisConnectionError::CommandExecute(msg) if msg.starts_with("WRONGPASS")));
    assert_eq!(server.command_names(), vec!["AUTH"]);
}

#[tokio::test]
async fn connect_failure_is_reported() {
    // 先占用一个端口再释放，得到一个没有人监听的地址
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client::connect(addr).await.unwrap_err();
    assert!(matches!(err, MiniRedisConnectionError::Io(_)));
}

/// 收到无法解析的数据时，所有未完成的命令都以协议错误失败
#[tokio::test]
async fn protocol_error_fails_every_pending_command() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0; 1024];
        socket.read(&mut buf).await.unwrap();
        // 等两条命令都写出之后再回复
        time::sleep(Duration::from_millis(50)).await;
        socket.write_all(b"?garbage\r\n").await.unwrap();
        let _ = socket.read(&mut buf).await;
    });

    let client = client::connect(addr).await.unwrap();
    let (first, second) = tokio::join!(client.ping(), client.get(b"key"));

    assert!(matches!(first, Err(MiniRedisConnectionError::Parse(_))));
    assert!(matches!(second, Err(MiniRedisConnectionError::Parse(_))));

    client.closed().await;
    assert!(!client.is_open());
}

/// 回复被拆成很小的片段到达时仍然能正确组装
#[tokio::test]
async fn fragmented_replies() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0; 1024];
        socket.read(&mut buf).await.unwrap();
        time::sleep(Duration::from_millis(20)).await;

        for chunk in b"$5\r\nhello\r\n*2\r\n$1\r\na\r\n$-1\r\n".chunks(3) {
            socket.write_all(chunk).await.unwrap();
            socket.flush().await.unwrap();
            time::sleep(Duration::from_millis(5)).await;
        }
        let _ = socket.read(&mut buf).await;
    });

    let client = client::connect(addr).await.unwrap();
    let (first, second) = tokio::join!(
        client.get(b"greeting"),
        client.mget(&[b"a", b"b"]),
    );

    assert_eq!(first.unwrap(), Some(Bytes::from_static(b"hello")));
    assert_eq!(
        second.unwrap(),
        Some(vec![Some(Bytes::from_static(b"a")), None])
    );
}
