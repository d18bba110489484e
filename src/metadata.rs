//! Per-flow metadata carried from ingress through the router to the egress.

use std::net::IpAddr;

/// Everything the rule engine and the egress codecs need to know about a flow.
///
/// Created at ingress, filled in as the remote side becomes known (by the proxy
/// codec or by the TUN NAT), consumed by the router, and otherwise immutable.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub client_ip: Option<IpAddr>,
    pub client_port: u16,
    pub remote_ip: Option<IpAddr>,
    pub remote_port: u16,
    pub domain: Option<String>,
    pub process_name: Option<String>,
    pub process_path: Option<String>,
    pub ingress: String,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = port;
        self
    }

    pub fn with_remote_ip(mut self, ip: IpAddr) -> Self {
        self.remote_ip = Some(ip);
        self
    }

    pub fn with_remote_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    pub fn with_process_path(mut self, path: impl Into<String>) -> Self {
        self.process_path = Some(path.into());
        self
    }

    pub fn with_ingress(mut self, ingress: impl Into<String>) -> Self {
        self.ingress = ingress.into();
        self
    }
}
