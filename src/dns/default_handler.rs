//! Pass-through handler: relays every query to the configured upstreams
//! unmodified. Grounded on `dns/handler/default.go`.

use std::net::SocketAddr;

use async_trait::async_trait;

use super::resolve;
use super::Handler;
use crate::error::DnsError;

pub struct DefaultHandler {
    upstreams: Vec<SocketAddr>,
}

impl DefaultHandler {
    pub fn new(upstreams: Vec<SocketAddr>) -> Self {
        Self { upstreams }
    }
}

#[async_trait]
impl Handler for DefaultHandler {
    async fn handle(&self, query: &[u8]) -> Result<Vec<u8>, DnsError> {
        resolve::resolve(&self.upstreams, query).await
    }
}
