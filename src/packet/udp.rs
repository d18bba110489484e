use super::{checksum, ip::IpPacket, require_len, sum16};
use crate::error::PacketError;

/// A mutable view over a UDP datagram (the IP payload).
pub struct UdpDatagram<'a> {
    buf: &'a mut [u8],
}

impl<'a> UdpDatagram<'a> {
    pub fn new(buf: &'a mut [u8]) -> Result<Self, PacketError> {
        require_len(buf, 8)?;
        Ok(Self { buf })
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes([self.buf[0], self.buf[1]])
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes([self.buf[2], self.buf[3]])
    }

    pub fn set_src_port(&mut self, port: u16) {
        self.buf[0..2].copy_from_slice(&port.to_be_bytes());
    }

    pub fn set_dst_port(&mut self, port: u16) {
        self.buf[2..4].copy_from_slice(&port.to_be_bytes());
    }

    pub fn update_checksum(&mut self, ip: &IpPacket) {
        self.buf[6] = 0;
        self.buf[7] = 0;
        let sum = checksum(&[
            ip.pseudo_sum(),
            sum16(self.buf),
            ip.protocol_number(),
            self.buf.len() as u32,
        ]);
        self.buf[6..8].copy_from_slice(&sum.to_be_bytes());
    }
}
