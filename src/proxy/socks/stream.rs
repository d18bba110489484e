//! SOCKS5 handshake state machines. Grounded on
//! `component/proxy/socks/streamConn.go`: server accepts a greeting then a
//! request, client sends a request and awaits a reply.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::protocol::*;
use crate::error::CodecError;
use crate::proxy::addr::{Address, AddressHeader};

/// What the server-side handshake asked for.
pub enum SocksRequest {
    Connect(AddressHeader),
    UdpAssociate(AddressHeader),
}

/// Reads the method greeting and selects no-auth, the only method this
/// implementation offers.
async fn read_greeting(stream: &mut TcpStream) -> Result<(), CodecError> {
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await?;
    if head[0] != VERSION {
        return Err(CodecError::MalformedAddress);
    }
    let nmethods = head[1] as usize;
    let mut methods = vec![0u8; nmethods];
    stream.read_exact(&mut methods).await?;
    if !methods.contains(&METHOD_NO_AUTH) {
        stream.write_all(&[VERSION, METHOD_NO_ACCEPTABLE]).await?;
        return Err(CodecError::Failed("no acceptable socks auth method"));
    }
    stream.write_all(&[VERSION, METHOD_NO_AUTH]).await?;
    Ok(())
}

async fn read_request_header(stream: &mut TcpStream) -> Result<(u8, AddressHeader), CodecError> {
    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != VERSION {
        return Err(CodecError::MalformedAddress);
    }
    let cmd = head[1];
    let atyp = head[3];
    let rest_len = match atyp {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let mut lenbuf = [0u8; 1];
            stream.read_exact(&mut lenbuf).await?;
            let mut body = vec![atyp, lenbuf[0]];
            let mut domain_and_port = vec![0u8; lenbuf[0] as usize + 2];
            stream.read_exact(&mut domain_and_port).await?;
            body.extend_from_slice(&domain_and_port);
            let (header, _) = AddressHeader::decode(&body)?;
            return Ok((cmd, header));
        }
        _ => return Err(CodecError::MalformedAddress),
    };
    let mut rest = vec![atyp];
    let mut tail = vec![0u8; rest_len];
    stream.read_exact(&mut tail).await?;
    rest.extend_from_slice(&tail);
    let (header, _) = AddressHeader::decode(&rest)?;
    Ok((cmd, header))
}

fn encode_reply(reply: u8, bound: &AddressHeader) -> Vec<u8> {
    let mut out = vec![VERSION, reply, 0x00];
    bound.encode(&mut out);
    out
}

/// Runs the server side of the handshake: greeting, then request. Writes the
/// success reply itself (the caller supplies the address to report as bound,
/// typically the listening socket's local address or a freshly bound UDP
/// relay socket for UDP ASSOCIATE).
pub async fn server_handshake(
    stream: &mut TcpStream,
    local_addr: std::net::SocketAddr,
) -> Result<SocksRequest, CodecError> {
    read_greeting(stream).await?;
    let (cmd, header) = read_request_header(stream).await?;
    let bound = AddressHeader {
        address: Address::Ip(local_addr.ip()),
        port: local_addr.port(),
    };
    match cmd {
        CMD_CONNECT => {
            stream
                .write_all(&encode_reply(REPLY_SUCCEEDED, &bound))
                .await?;
            Ok(SocksRequest::Connect(header))
        }
        CMD_UDP_ASSOCIATE => Ok(SocksRequest::UdpAssociate(header)),
        other => {
            stream
                .write_all(&encode_reply(REPLY_COMMAND_NOT_SUPPORTED, &bound))
                .await?;
            Err(CodecError::UnsupportedCommand(other))
        }
    }
}

/// Runs the client side of a CONNECT handshake against an upstream SOCKS5
/// proxy: greeting, request, reply.
pub async fn client_connect(
    stream: &mut TcpStream,
    target: &AddressHeader,
) -> Result<(), CodecError> {
    stream
        .write_all(&[VERSION, 1, METHOD_NO_AUTH])
        .await?;
    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[0] != VERSION || reply[1] != METHOD_NO_AUTH {
        return Err(CodecError::Failed("upstream socks proxy rejected no-auth method"));
    }

    let mut req = vec![VERSION, CMD_CONNECT, 0x00];
    target.encode(&mut req);
    stream.write_all(&req).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != VERSION {
        return Err(CodecError::MalformedAddress);
    }
    if head[1] != REPLY_SUCCEEDED {
        return Err(CodecError::Failed("upstream socks proxy rejected connect request"));
    }
    let atyp = head[3];
    let skip = match atyp {
        0x01 => 4 + 2,
        0x04 => 16 + 2,
        0x03 => {
            let mut lenbuf = [0u8; 1];
            stream.read_exact(&mut lenbuf).await?;
            lenbuf[0] as usize + 2
        }
        _ => return Err(CodecError::MalformedAddress),
    };
    let mut discard = vec![0u8; skip];
    stream.read_exact(&mut discard).await?;
    Ok(())
}
