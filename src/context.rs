//! The explicit, constructed-once bundle of shared handles bootstrap wires
//! together and every ingress/egress borrows from — replacing the distilled
//! design's process-wide singletons with one value threaded through `main`.

use std::sync::Arc;

use crate::dns::SharedFakeIp;
use crate::egress::EgressRegistry;
use crate::geoip::GeoIpLookup;
use crate::ingress::Ingress;
use crate::process::ProcessLookup;
use crate::router::Router;

pub struct AppContext {
    pub router: Arc<dyn Router>,
    pub egress_registry: Arc<EgressRegistry>,
    pub ingresses: Vec<Arc<dyn Ingress>>,
    pub geoip: Arc<dyn GeoIpLookup>,
    pub process_lookup: Arc<dyn ProcessLookup>,
    pub dns_fakeip: Option<SharedFakeIp>,
}

impl AppContext {
    pub fn new(
        router: Arc<dyn Router>,
        egress_registry: Arc<EgressRegistry>,
        ingresses: Vec<Arc<dyn Ingress>>,
        geoip: Arc<dyn GeoIpLookup>,
        process_lookup: Arc<dyn ProcessLookup>,
        dns_fakeip: Option<SharedFakeIp>,
    ) -> Self {
        Self {
            router,
            egress_registry,
            ingresses,
            geoip,
            process_lookup,
            dns_fakeip,
        }
    }

    /// Starts every ingress as an independent task and waits for the first
    /// to return — a fatal ingress error brings the process down, matching
    /// §4.12's bootstrap contract.
    pub async fn run(&self) -> Result<(), crate::error::Error> {
        let mut tasks = tokio::task::JoinSet::new();
        for ingress in &self.ingresses {
            let ingress = ingress.clone();
            tasks.spawn(async move { ingress.serve().await });
        }

        match tasks.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(join_err)) => Err(crate::error::Error::Io(std::io::Error::other(join_err.to_string()))),
            None => Ok(()),
        }
    }
}
