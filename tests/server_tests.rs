//! End-to-end tests over real TCP connections.
//!
//! Each test binds its own server on an ephemeral port.

use bytes::Bytes;
use keyline::server::{CommandSerializer, SerializerHandle, Server, ServerError};
use keyline::storage::Store;
use keyline::{RespValue, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn spawn_server() -> (SocketAddr, SerializerHandle, Arc<Store>) {
    let config = ServerConfig::new().listen_addr("127.0.0.1:0");
    let store = Arc::new(Store::new());
    let serializer = CommandSerializer::start(Arc::clone(&store), &config);
    let server = Server::bind(&config, serializer.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, serializer, store)
}

fn command(args: &[&str]) -> Vec<u8> {
    RespValue::array(
        args.iter()
            .map(|a| RespValue::bulk_string(Bytes::copy_from_slice(a.as_bytes())))
            .collect(),
    )
    .serialize()
}

async fn read_reply(client: &mut TcpStream, expected: &[u8]) {
    let mut buf = vec![0u8; expected.len()];
    timeout(Duration::from_secs(2), client.read_exact(&mut buf))
        .await
        .expect("timed out waiting for reply")
        .unwrap();
    assert_eq!(
        buf,
        expected,
        "got {:?}",
        String::from_utf8_lossy(&buf)
    );
}

async fn assert_silent(client: &mut TcpStream) {
    let mut buf = [0u8; 16];
    let result = timeout(Duration::from_millis(150), client.read(&mut buf)).await;
    assert!(result.is_err(), "expected no reply, got {:?}", result);
}

#[tokio::test]
async fn test_set_get_and_silent_miss() {
    let (addr, _, _) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&command(&["SET", "foo", "bar"])).await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;

    client.write_all(&command(&["GET", "foo"])).await.unwrap();
    read_reply(&mut client, b"$3\r\nbar\r\n").await;

    client.write_all(&command(&["GET", "missing"])).await.unwrap();
    assert_silent(&mut client).await;

    // The next reply on the wire belongs to the next command.
    client.write_all(&command(&["CLIENT", "SETNAME", "x"])).await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;
}

#[tokio::test]
async fn test_hello_handshake() {
    let (addr, _, _) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&command(&["HELLO", "3"])).await.unwrap();
    read_reply(&mut client, b"%1\r\n+server\r\n+redis\r\n").await;
    assert_silent(&mut client).await;
}

#[tokio::test]
async fn test_unknown_verb_is_ignored() {
    let (addr, serializer, store) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&command(&["DEL", "foo"])).await.unwrap();
    client.write_all(&command(&["set", "foo", "lower"])).await.unwrap();
    client.write_all(b"+not-a-request\r\n").await.unwrap();
    assert_silent(&mut client).await;
    assert!(store.is_empty());
    assert_eq!(serializer.stats().commands_processed, 0);

    client.write_all(&command(&["SET", "foo", "upper"])).await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;
    assert_eq!(store.get(b"foo"), Some(Bytes::from("upper")));
}

#[tokio::test]
async fn test_missing_argument_keeps_connection() {
    let (addr, _, store) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&command(&["SET", "lonely"])).await.unwrap();
    assert_silent(&mut client).await;
    assert!(store.is_empty());

    client.write_all(&command(&["SET", "k", "v"])).await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;
}

#[tokio::test]
async fn test_inline_commands() {
    let (addr, _, _) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(b"SET greeting hello\r\n").await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;

    client.write_all(b"GET greeting\r\n").await.unwrap();
    read_reply(&mut client, b"$5\r\nhello\r\n").await;
}

#[tokio::test]
async fn test_pipelined_commands_apply_in_order() {
    let (addr, _, store) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let mut batch = Vec::new();
    let mut expected = Vec::new();
    for i in 0..100 {
        let value = i.to_string();
        batch.extend(command(&["SET", "counter", &value]));
        batch.extend(command(&["GET", "counter"]));
        expected.extend_from_slice(b"+OK\r\n");
        expected.extend(RespValue::bulk_string(Bytes::from(value)).serialize());
    }
    client.write_all(&batch).await.unwrap();

    read_reply(&mut client, &expected).await;
    assert_eq!(store.get(b"counter"), Some(Bytes::from("99")));
}

#[tokio::test]
async fn test_many_connections_lose_no_updates() {
    let (addr, _, store) = spawn_server().await;

    let mut tasks = Vec::new();
    for c in 0..8 {
        tasks.push(tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            for i in 0..25 {
                let key = format!("conn-{}-key-{}", c, i);
                let value = format!("value-{}-{}", c, i);
                client.write_all(&command(&["SET", &key, &value])).await.unwrap();
                read_reply(&mut client, b"+OK\r\n").await;

                client.write_all(&command(&["GET", &key])).await.unwrap();
                let expected = RespValue::bulk_string(Bytes::from(value)).serialize();
                read_reply(&mut client, &expected).await;
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.len(), 8 * 25);
    assert_eq!(
        store.get(b"conn-3-key-24"),
        Some(Bytes::from("value-3-24"))
    );
}

#[tokio::test]
async fn test_concurrent_writers_same_key() {
    let (addr, _, store) = spawn_server().await;
    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut second = TcpStream::connect(addr).await.unwrap();

    let first_set = command(&["SET", "contested", "from-first"]);
    let second_set = command(&["SET", "contested", "from-second"]);
    let (a, b) = tokio::join!(first.write_all(&first_set), second.write_all(&second_set));
    a.unwrap();
    b.unwrap();

    read_reply(&mut first, b"+OK\r\n").await;
    read_reply(&mut second, b"+OK\r\n").await;

    let value = store.get(b"contested").unwrap();
    assert!(value == Bytes::from("from-first") || value == Bytes::from("from-second"));
}

#[tokio::test]
async fn test_client_that_never_reads_does_not_stall_others() {
    let (addr, serializer, store) = spawn_server().await;
    store.set(Bytes::from("big"), Bytes::from(vec![b'x'; 1024 * 1024]));

    // Pipeline far more large replies than the reply queue and the socket
    // buffers can hold, and never read any of them.
    let mut stalled = TcpStream::connect(addr).await.unwrap();
    let mut batch = Vec::new();
    for _ in 0..300 {
        batch.extend(command(&["GET", "big"]));
    }
    stalled.write_all(&batch).await.unwrap();

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(&command(&["SET", "small", "v"])).await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;
    client.write_all(&command(&["GET", "small"])).await.unwrap();
    read_reply(&mut client, b"$1\r\nv\r\n").await;

    // The stalled connection stopped being served once its queue filled up.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(serializer.stats().commands_processed < 300);
    drop(stalled);
}

#[tokio::test]
async fn test_registry_tracks_connections() {
    let (addr, serializer, _) = spawn_server().await;
    let mut stats = serializer.subscribe();

    let first = TcpStream::connect(addr).await.unwrap();
    let second = TcpStream::connect(addr).await.unwrap();
    timeout(Duration::from_secs(2), stats.wait_for(|s| s.connected_peers == 2))
        .await
        .unwrap()
        .unwrap();

    drop(first);
    drop(second);
    timeout(Duration::from_secs(2), stats.wait_for(|s| s.connected_peers == 0))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_stops_only_the_serializer() {
    let (addr, serializer, store) = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    client.write_all(&command(&["SET", "before", "1"])).await.unwrap();
    read_reply(&mut client, b"+OK\r\n").await;

    serializer.shutdown();
    timeout(Duration::from_secs(2), serializer.stopped())
        .await
        .unwrap();

    // The listener still accepts, but nothing executes anymore. A new
    // connection cannot register, so it may be closed, but it never gets a reply.
    let mut late = TcpStream::connect(addr).await.unwrap();
    let _ = late.write_all(&command(&["SET", "after", "1"])).await;
    let mut received = Vec::new();
    let _ = timeout(Duration::from_millis(150), late.read_to_end(&mut received)).await;
    assert!(received.is_empty());
    assert_eq!(store.get(b"after"), None);
    assert_eq!(store.get(b"before"), Some(Bytes::from("1")));
}

#[tokio::test]
async fn test_bind_failure() {
    let (addr, serializer, _) = spawn_server().await;
    let config = ServerConfig::new().listen_addr(addr.to_string());

    match Server::bind(&config, serializer).await {
        Err(ServerError::Bind { addr: failed, .. }) => assert_eq!(failed, addr.to_string()),
        Ok(_) => panic!("binding an address in use should fail"),
    }
}
