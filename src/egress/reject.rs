//! Refuses every flow. Grounded on `egress/reject/reject.go`.

use async_trait::async_trait;

use super::Egress;
use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::{ShadowedPacket, ShadowedStream};

pub struct RejectEgress {
    name: String,
}

impl RejectEgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Egress for RejectEgress {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dial_stream(&self, _target: &Metadata) -> Result<ShadowedStream, CodecError> {
        Err(CodecError::Failed("rejected by configuration"))
    }

    async fn dial_packet(&self, _target: &Metadata) -> Result<ShadowedPacket, CodecError> {
        Err(CodecError::Failed("rejected by configuration"))
    }
}
