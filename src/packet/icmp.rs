use super::{checksum, require_len, sum16};
use crate::error::PacketError;

/// A mutable view over an ICMP message (the IP payload).
pub struct IcmpPacket<'a> {
    buf: &'a mut [u8],
}

impl<'a> IcmpPacket<'a> {
    pub fn new(buf: &'a mut [u8]) -> Result<Self, PacketError> {
        require_len(buf, 4)?;
        Ok(Self { buf })
    }

    pub fn icmp_type(&self) -> u8 {
        self.buf[0]
    }

    /// Echo Request -> Echo Reply: sets the type byte to 0.
    pub fn set_echo_reply(&mut self) {
        self.buf[0] = 0;
    }

    pub fn update_checksum(&mut self) {
        self.buf[2] = 0;
        self.buf[3] = 0;
        let sum = checksum(&[sum16(self.buf)]);
        self.buf[2..4].copy_from_slice(&sum.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_reply_rewrite() {
        let mut raw = [8u8, 0, 0xf7, 0xff, 0, 0, 0, 0]; // type=8 (echo request), code 0
        let mut icmp = IcmpPacket::new(&mut raw).unwrap();
        icmp.set_echo_reply();
        icmp.update_checksum();
        assert_eq!(icmp.icmp_type(), 0);
        assert_eq!(checksum(&[sum16(&raw)]), 0);
    }
}
