//! Egress: the outbound side of a flow. Grounded on `egress/egress.go`.
//!
//! Three implementations: [`direct::DirectEgress`] dials the metadata's
//! resolved remote address with no codec, [`reject::RejectEgress`] refuses
//! every flow, [`general::GeneralEgress`] dials a configured upstream and
//! wraps it with a client-side [`crate::proxy::Proxy`] codec.

pub mod direct;
pub mod general;
pub mod reject;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::{ShadowedPacket, ShadowedStream};

/// Grace period after one direction of a relay sees EOF before the other
/// direction is forced closed, per SPEC_FULL.md §4.
pub const HALF_CLOSE_TIMEOUT: Duration = Duration::from_secs(4);

#[async_trait]
pub trait Egress: Send + Sync {
    fn name(&self) -> &str;

    async fn dial_stream(&self, target: &Metadata) -> Result<ShadowedStream, CodecError>;

    async fn dial_packet(&self, target: &Metadata) -> Result<ShadowedPacket, CodecError>;
}

#[derive(Default)]
pub struct EgressRegistry {
    entries: HashMap<String, Arc<dyn Egress>>,
}

impl EgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, egress: Arc<dyn Egress>) {
        self.entries.insert(egress.name().to_string(), egress);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Egress>> {
        self.entries.get(name).cloned()
    }
}

/// A named alias over another egress. The only group policy implemented
/// ([`crate::router::policy::NonePolicy`]) always resolves a group to its
/// first member, so bootstrap registers that member's egress again under
/// the group's own name rather than consulting the policy per dispatch.
pub struct GroupEgress {
    name: String,
    inner: Arc<dyn Egress>,
}

impl GroupEgress {
    pub fn new(name: impl Into<String>, inner: Arc<dyn Egress>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

#[async_trait]
impl Egress for GroupEgress {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dial_stream(&self, target: &Metadata) -> Result<ShadowedStream, CodecError> {
        self.inner.dial_stream(target).await
    }

    async fn dial_packet(&self, target: &Metadata) -> Result<ShadowedPacket, CodecError> {
        self.inner.dial_packet(target).await
    }
}

enum Side {
    A(std::io::Result<usize>),
    B(std::io::Result<usize>),
}

/// Bidirectional copy between an ingress-side and an egress-side shadowed
/// stream. Once one side hits EOF, the other side's reads are capped at
/// [`HALF_CLOSE_TIMEOUT`] so a silent peer cannot hold the flow open
/// indefinitely.
pub async fn relay(mut a: ShadowedStream, mut b: ShadowedStream) -> std::io::Result<()> {
    let mut buf_a = vec![0u8; 16 * 1024];
    let mut buf_b = vec![0u8; 16 * 1024];
    let mut a_done = false;
    let mut b_done = false;

    loop {
        if a_done && b_done {
            return Ok(());
        }

        let select = async {
            tokio::select! {
                r = a.read(&mut buf_a), if !a_done => Side::A(r),
                r = b.read(&mut buf_b), if !b_done => Side::B(r),
            }
        };

        let side = if a_done || b_done {
            match timeout(HALF_CLOSE_TIMEOUT, select).await {
                Ok(side) => side,
                Err(_) => return Ok(()),
            }
        } else {
            select.await
        };

        match side {
            Side::A(Ok(0)) => a_done = true,
            Side::A(Ok(n)) => b.write_all(&buf_a[..n]).await?,
            Side::A(Err(e)) => return Err(e),
            Side::B(Ok(0)) => b_done = true,
            Side::B(Ok(n)) => a.write_all(&buf_b[..n]).await?,
            Side::B(Err(e)) => return Err(e),
        }
    }
}
