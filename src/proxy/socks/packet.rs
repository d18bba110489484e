//! SOCKS5 UDP ASSOCIATE datagram framing: `RSV(2)=0 | FRAG(1)=0 | address
//! header | payload` (RFC 1928 §7). Grounded on
//! `component/proxy/socks/packetConn.go`.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::metadata::Metadata;
use crate::proxy::addr::AddressHeader;
use crate::proxy::Message;

pub struct SocksPacket {
    socket: UdpSocket,
}

impl SocksPacket {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn read_msg_from(&self) -> std::io::Result<(Message, SocketAddr)> {
        let mut buf = vec![0u8; 64 * 1024];
        let (n, peer) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        if buf.len() < 3 || buf[2] != 0 {
            // FRAG must be 0: fragmented UDP datagrams (RFC 1928 §7) are not
            // supported, so any other value is treated as malformed.
            return Ok((
                Message {
                    payload: Vec::new(),
                    metadata: Metadata::new(),
                },
                peer,
            ));
        }
        let mut metadata = Metadata::new();
        let payload = match AddressHeader::decode(&buf[3..]) {
            Ok((header, consumed)) => {
                header.apply_to_metadata(&mut metadata);
                buf[3 + consumed..].to_vec()
            }
            Err(_) => Vec::new(),
        };
        Ok((Message { payload, metadata }, peer))
    }

    pub async fn write_msg_to(&self, msg: &Message, addr: SocketAddr) -> std::io::Result<()> {
        let mut out = vec![0u8, 0u8, 0u8];
        if let Some(header) = AddressHeader::from_metadata(&msg.metadata) {
            header.encode(&mut out);
        }
        out.extend_from_slice(&msg.payload);
        self.socket.send_to(&out, addr).await?;
        Ok(())
    }
}
