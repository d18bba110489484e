use std::sync::Arc;
use std::time::Duration;

use rdcross::egress::direct::DirectEgress;
use rdcross::egress::EgressRegistry;
use rdcross::ingress::general::GeneralIngress;
use rdcross::ingress::Ingress;
use rdcross::proxy::addr::{Address, AddressHeader};
use rdcross::proxy::socks::SocksProxy;
use rdcross::proxy::ProxyMode;
use rdcross::router::rule::default::DefaultRule;
use rdcross::router::rule::Action;
use rdcross::router::{DefaultRouter, Router};
use tokio::net::UdpSocket;

async fn free_udp_port() -> u16 {
    let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    probe.local_addr().unwrap().port()
}

fn socks_udp_datagram(target: std::net::SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8, 0u8, 0u8];
    let header = AddressHeader {
        address: Address::Ip(target.ip()),
        port: target.port(),
    };
    header.encode(&mut out);
    out.extend_from_slice(payload);
    out
}

#[tokio::test]
async fn udp_datagram_is_dispatched_through_direct_egress_and_echoed_back() {
    let echo = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let echo_addr = echo.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        loop {
            let (n, peer) = match echo.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(_) => return,
            };
            let _ = echo.send_to(&buf[..n], peer).await;
        }
    });

    let port = free_udp_port().await;
    let listen = format!("127.0.0.1:{port}");

    let proxy = Arc::new(SocksProxy::new(ProxyMode::Server));
    let router: Arc<dyn Router> = Arc::new(DefaultRouter::new(
        vec![],
        Box::new(DefaultRule::new(Action::new("DIRECT", "none"))),
    ));
    let mut registry = EgressRegistry::new();
    registry.register(Arc::new(DirectEgress::new("DIRECT")));

    let ingress = Arc::new(GeneralIngress::new(
        "udp-test",
        listen.clone(),
        proxy,
        router,
        Arc::new(registry),
    ));
    let serve_ingress = ingress.clone();
    tokio::spawn(async move {
        let _ = serve_ingress.serve().await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let listen_addr: std::net::SocketAddr = listen.parse().unwrap();
    let request = socks_udp_datagram(echo_addr, b"hello via udp");
    client.send_to(&request, listen_addr).await.unwrap();

    let mut buf = vec![0u8; 1500];
    let n = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("reply timed out")
        .unwrap()
        .0;
    buf.truncate(n);

    assert_eq!(buf[2], 0, "FRAG byte must be zero");
    let (header, consumed) = AddressHeader::decode(&buf[3..]).unwrap();
    match header.address {
        Address::Ip(ip) => assert_eq!(ip, echo_addr.ip()),
        Address::Domain(_) => panic!("expected an ip address in the reply header"),
    }
    assert_eq!(header.port, echo_addr.port());
    assert_eq!(&buf[3 + consumed..], b"hello via udp");
}

#[tokio::test]
async fn fragmented_datagram_is_dropped() {
    let port = free_udp_port().await;
    let listen = format!("127.0.0.1:{port}");

    let proxy = Arc::new(SocksProxy::new(ProxyMode::Server));
    let router: Arc<dyn Router> = Arc::new(DefaultRouter::new(
        vec![],
        Box::new(DefaultRule::new(Action::new("DIRECT", "none"))),
    ));
    let mut registry = EgressRegistry::new();
    registry.register(Arc::new(DirectEgress::new("DIRECT")));

    let ingress = Arc::new(GeneralIngress::new(
        "udp-frag-test",
        listen.clone(),
        proxy,
        router,
        Arc::new(registry),
    ));
    let serve_ingress = ingress.clone();
    tokio::spawn(async move {
        let _ = serve_ingress.serve().await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let listen_addr: std::net::SocketAddr = listen.parse().unwrap();
    let mut request = socks_udp_datagram("127.0.0.1:9".parse().unwrap(), b"ignored");
    request[2] = 1; // non-zero FRAG: must be rejected, not dispatched.
    client.send_to(&request, listen_addr).await.unwrap();

    let mut buf = vec![0u8; 64];
    let result = tokio::time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
    assert!(result.is_err(), "a fragmented datagram must not produce any reply");
}
