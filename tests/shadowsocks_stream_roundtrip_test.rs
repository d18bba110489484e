use std::sync::Arc;

use rdcross::metadata::Metadata;
use rdcross::proxy::shadowsocks::ShadowsocksProxy;
use rdcross::proxy::{CodecInput, Proxy, ProxyMode};
use tokio::net::{TcpListener, TcpStream};

#[tokio::test]
async fn shadowsocks_stream_round_trip_carries_address_and_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Arc::new(ShadowsocksProxy::new(ProxyMode::Server, "aes-128-gcm", "p").unwrap());
    let server_task = {
        let server = server.clone();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = server
                .shadow_stream(stream, CodecInput::IngressName("test"))
                .await
                .unwrap();
            assert_eq!(conn.metadata.domain.as_deref(), Some("example.com"));
            assert_eq!(conn.metadata.remote_port, 443);
            assert_eq!(conn.metadata.ingress, "test");

            let mut buf = vec![0u8; 64];
            let n = conn.stream.read(&mut buf).await.unwrap();
            buf.truncate(n);
            buf
        })
    };

    let client = ShadowsocksProxy::new(ProxyMode::Client, "aes-128-gcm", "p").unwrap();
    let target = Metadata::new()
        .with_domain("example.com")
        .with_remote_port(443);
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut conn = client
        .shadow_stream(stream, CodecInput::Target(&target))
        .await
        .unwrap();
    conn.stream.write_all(b"hello world").await.unwrap();

    let received = server_task.await.unwrap();
    assert_eq!(received, b"hello world");
}

#[tokio::test]
async fn mismatched_password_fails_to_decode() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = ShadowsocksProxy::new(ProxyMode::Server, "aes-128-gcm", "right").unwrap();
    let server_task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        server
            .shadow_stream(stream, CodecInput::IngressName("test"))
            .await
    });

    let client = ShadowsocksProxy::new(ProxyMode::Client, "aes-128-gcm", "wrong").unwrap();
    let target = Metadata::new().with_remote_ip("1.2.3.4".parse().unwrap()).with_remote_port(80);
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut conn = client
        .shadow_stream(stream, CodecInput::Target(&target))
        .await
        .unwrap();
    let _ = conn.stream.write_all(b"x").await;

    assert!(server_task.await.unwrap().is_err());
}
