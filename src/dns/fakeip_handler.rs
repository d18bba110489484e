//! Fake-IP handler: answers A queries from the fake-IP pool without ever
//! reaching an upstream, and defers everything else to a fallback handler.
//! Grounded on `dns/handler/fakeip.go`.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use trust_dns_proto::op::{Message, MessageType, OpCode, ResponseCode};
use trust_dns_proto::rr::{domain::Name, rdata::A, rdata::PTR, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::{BinDecodable, BinEncodable};

use super::{Handler, SharedFakeIp};
use crate::error::DnsError;

pub struct FakeIpHandler {
    pool: SharedFakeIp,
    fallback: std::sync::Arc<dyn Handler>,
    ttl: Duration,
}

impl FakeIpHandler {
    pub fn new(pool: SharedFakeIp, fallback: std::sync::Arc<dyn Handler>, ttl: Duration) -> Self {
        Self {
            pool,
            fallback,
            ttl,
        }
    }
}

#[async_trait]
impl Handler for FakeIpHandler {
    async fn handle(&self, query: &[u8]) -> Result<Vec<u8>, DnsError> {
        let request = Message::from_bytes(query)
            .map_err(|e| DnsError::AllUpstreamsFailed(e.to_string()))?;

        let Some(question) = request.queries().first() else {
            return Err(DnsError::NoAnswer);
        };

        match question.query_type() {
            RecordType::A => {}
            RecordType::PTR => return self.handle_ptr(&request, question).await,
            _ => return self.fallback.handle(query).await,
        }

        let domain = question.name().to_ascii();
        let ip: Ipv4Addr = {
            let mut pool = self.pool.lock().await;
            pool.put(&domain)
        };

        let mut response = Message::new();
        response.set_id(request.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(OpCode::Query);
        response.set_response_code(ResponseCode::NoError);
        response.set_recursion_desired(request.recursion_desired());
        response.set_recursion_available(true);
        response.add_query(question.clone());

        let name = Name::from_ascii(&domain).map_err(|e| DnsError::AllUpstreamsFailed(e.to_string()))?;
        let record = Record::from_rdata(name, self.ttl.as_secs() as u32, RData::A(A(ip)));
        response.add_answer(record);

        response
            .to_bytes()
            .map_err(|e| DnsError::AllUpstreamsFailed(e.to_string()))
    }
}

impl FakeIpHandler {
    /// Reverse-resolves a PTR query via the pool's `GetDomainByIP`, emitting
    /// a reply with no answer records on miss rather than falling back.
    async fn handle_ptr(
        &self,
        request: &Message,
        question: &trust_dns_proto::op::Query,
    ) -> Result<Vec<u8>, DnsError> {
        let mut response = Message::new();
        response.set_id(request.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(OpCode::Query);
        response.set_response_code(ResponseCode::NoError);
        response.set_recursion_desired(request.recursion_desired());
        response.set_recursion_available(true);
        response.add_query(question.clone());

        if let Some(ip) = parse_ptr_name(question.name()) {
            let domain = self.pool.lock().await.get_domain_by_ip(ip);
            if let Some(domain) = domain {
                if let Ok(target) = Name::from_ascii(&domain) {
                    let record = Record::from_rdata(
                        question.name().clone(),
                        self.ttl.as_secs() as u32,
                        RData::PTR(PTR(target)),
                    );
                    response.add_answer(record);
                }
            }
        }

        response
            .to_bytes()
            .map_err(|e| DnsError::AllUpstreamsFailed(e.to_string()))
    }
}

/// Parses `d.c.b.a.in-addr.arpa.` into `a.b.c.d`, per RFC 1035 §3.5.
fn parse_ptr_name(name: &Name) -> Option<Ipv4Addr> {
    let labels: Vec<&[u8]> = name.iter().collect();
    if labels.len() < 6 {
        return None;
    }
    if !labels[4].eq_ignore_ascii_case(b"arpa") || !labels[5].eq_ignore_ascii_case(b"in-addr") {
        return None;
    }
    let mut octets = [0u8; 4];
    for i in 0..4 {
        octets[3 - i] = std::str::from_utf8(labels[i]).ok()?.parse().ok()?;
    }
    Some(Ipv4Addr::from(octets))
}
