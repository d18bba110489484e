//! Library surface for the router binary: metadata, the packet/NAT layer,
//! proxy codecs, the rule engine, ingress/egress, DNS, and configuration.

pub mod config;
pub mod context;
pub mod debug_http;
pub mod dns;
pub mod egress;
pub mod error;
pub mod fakeip;
pub mod geoip;
pub mod ingress;
pub mod lru;
pub mod metadata;
pub mod nat;
pub mod packet;
pub mod process;
pub mod proxy;
pub mod router;
pub mod trie;
