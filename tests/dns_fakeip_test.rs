use std::sync::Arc;
use std::time::Duration;

use rdcross::dns::default_handler::DefaultHandler;
use rdcross::dns::fakeip_handler::FakeIpHandler;
use rdcross::dns::Handler;
use rdcross::fakeip::FakeIp;
use tokio::sync::Mutex;
use trust_dns_proto::op::{Message, MessageType, OpCode, Query};
use trust_dns_proto::rr::domain::Name;
use trust_dns_proto::rr::{RData, RecordType};
use trust_dns_proto::serialize::binary::{BinDecodable, BinEncodable};

fn a_query(name: &str) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(42);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_ascii(name).unwrap(), RecordType::A));
    msg.to_bytes().unwrap()
}

#[tokio::test]
async fn a_query_is_answered_from_fakeip_pool() {
    let cidr: ipnet::Ipv4Net = "198.18.0.1/30".parse().unwrap();
    let pool = Arc::new(Mutex::new(FakeIp::new(cidr)));
    let fallback: Arc<dyn Handler> = Arc::new(DefaultHandler::new(vec![]));
    let handler = FakeIpHandler::new(pool.clone(), fallback, Duration::from_secs(60));

    let query = a_query("x.test.");
    let response_bytes = handler.handle(&query).await.unwrap();
    let response = Message::from_bytes(&response_bytes).unwrap();

    assert_eq!(response.answers().len(), 1);
    let RData::A(ip) = response.answers()[0].data().unwrap() else {
        panic!("expected an A record");
    };
    assert!(cidr.contains(&ip.0));

    let resident_domain = pool.lock().await.get_domain_by_ip(ip.0);
    assert_eq!(resident_domain.as_deref(), Some("x.test."));
}
