//! Ingress: the inbound side of a flow. Grounded on `ingress/ingress.go`.

pub mod general;
pub mod tun;

use async_trait::async_trait;

use crate::error::Error;

#[async_trait]
pub trait Ingress: Send + Sync {
    fn name(&self) -> &str;

    /// Runs until cancelled or a fatal error occurs. Per-connection errors
    /// are logged and do not terminate the ingress.
    async fn serve(&self) -> Result<(), Error>;
}
