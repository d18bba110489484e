//! Concurrent upstream fan-out: sends the same raw query to every configured
//! upstream and returns the first valid answer. Grounded on
//! `dns/resolver.go`.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::error::DnsError;

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn resolve(upstreams: &[SocketAddr], query: &[u8]) -> Result<Vec<u8>, DnsError> {
    if upstreams.is_empty() {
        return Err(DnsError::AllUpstreamsFailed("no upstreams configured".into()));
    }

    let mut tasks = JoinSet::new();
    for &upstream in upstreams {
        let query = query.to_vec();
        tasks.spawn(async move { query_one(upstream, &query).await });
    }

    let mut last_err = String::from("no upstream answered");
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(answer)) => return Ok(answer),
            Ok(Err(e)) => last_err = e.to_string(),
            Err(e) => last_err = e.to_string(),
        }
    }
    Err(DnsError::AllUpstreamsFailed(last_err))
}

async fn query_one(upstream: SocketAddr, query: &[u8]) -> std::io::Result<Vec<u8>> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.connect(upstream).await?;
    socket.send(query).await?;
    let mut buf = vec![0u8; 512];
    let n = timeout(UPSTREAM_TIMEOUT, socket.recv(&mut buf))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out"))??;
    buf.truncate(n);
    Ok(buf)
}
