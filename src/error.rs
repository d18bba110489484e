//! Crate-wide error taxonomy. Each subsystem gets its own `thiserror` enum;
//! `Error` composes them for `main`'s `Result` return.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("duplicate {name} in {zone}")]
    Duplicate { zone: &'static str, name: String },
    #[error("invalid rule line: {0}")]
    InvalidRule(String),
    #[error("unknown rule kind: {0}")]
    UnknownRuleKind(String),
    #[error("invalid cidr: {0}")]
    InvalidCidr(#[from] ipnet::AddrParseError),
}

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("packet too short: need at least {need} bytes, got {got}")]
    TooShort { need: usize, got: usize },
    #[error("unsupported ip version")]
    UnsupportedVersion,
    #[error("address family mismatch")]
    AddressFamily,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("codec failure: {0}")]
    Failed(&'static str),
    #[error("aead open failed")]
    AeadOpen,
    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),
    #[error("malformed address header")]
    MalformedAddress,
    #[error("unsupported socks command: {0}")]
    UnsupportedCommand(u8),
    #[error("short read")]
    ShortRead,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TunError {
    #[error("failed to open tun device: {0}")]
    Open(String),
    #[error("control plane command failed: {cmd}: {source}")]
    ControlPlane {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("all upstreams failed; last error: {0}")]
    AllUpstreamsFailed(String),
    #[error("no answer for query")]
    NoAnswer,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tun(#[from] TunError),
    #[error(transparent)]
    Dns(#[from] DnsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
