//! Inbound connections: TLS and plaintext on one port

mod common;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use common::{dual_mode_transport, identity, spawn_echo, spawn_transport_server, tls_client, IO_TIMEOUT};

#[tokio::test]
async fn test_plaintext_client_on_dual_mode_port() {
    let identity = identity();
    let echo = spawn_echo().await;
    let addr = spawn_transport_server(dual_mode_transport(&identity, true), echo).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"hello plaintext\n").await.unwrap();

    let mut reply = [0u8; 16];
    timeout(IO_TIMEOUT, client.read_exact(&mut reply)).await.unwrap().unwrap();
    assert_eq!(&reply, b"hello plaintext\n");
}

#[tokio::test]
async fn test_tls_client_on_dual_mode_port() {
    let identity = identity();
    let echo = spawn_echo().await;
    let addr = spawn_transport_server(dual_mode_transport(&identity, true), echo).await;

    let mut client = tls_client(&identity, addr).await;
    client.write_all(b"hello tls\n").await.unwrap();

    let mut reply = [0u8; 10];
    timeout(IO_TIMEOUT, client.read_exact(&mut reply)).await.unwrap().unwrap();
    assert_eq!(&reply, b"hello tls\n");
}

#[tokio::test]
async fn test_header_split_across_writes() {
    let identity = identity();
    let echo = spawn_echo().await;
    let addr = spawn_transport_server(dual_mode_transport(&identity, true), echo).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.set_nodelay(true).unwrap();
    client.write_all(&[0x01, 0x01]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    client.write_all(&[0x01, 0x01, 0x01]).await.unwrap();

    let mut reply = [0u8; 5];
    timeout(IO_TIMEOUT, client.read_exact(&mut reply)).await.unwrap().unwrap();
    assert_eq!(reply, [0x01; 5]);
}

#[tokio::test]
async fn test_plaintext_refused_without_dual_mode() {
    let identity = identity();
    let echo = spawn_echo().await;
    let addr = spawn_transport_server(dual_mode_transport(&identity, false), echo).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"hello plaintext\n").await.unwrap();

    // Whatever comes back is never the echo
    let mut reply = Vec::new();
    let _ = timeout(IO_TIMEOUT, client.read_to_end(&mut reply)).await.unwrap();
    assert!(!reply.starts_with(b"hello"));
}

#[tokio::test]
async fn test_tls_still_served_without_dual_mode() {
    let identity = identity();
    let echo = spawn_echo().await;
    let addr = spawn_transport_server(dual_mode_transport(&identity, false), echo).await;

    let mut client = tls_client(&identity, addr).await;
    client.write_all(b"ping").await.unwrap();

    let mut reply = [0u8; 4];
    timeout(IO_TIMEOUT, client.read_exact(&mut reply)).await.unwrap().unwrap();
    assert_eq!(&reply, b"ping");
}
