//! Looks up `metadata.remote_ip`'s country code via the [`GeoIpLookup`]
//! contract and compares against configured keys. A lookup miss is routing
//! information, not an error. Grounded on `router/rule/geoip.go`.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Action, RuleSet, KIND_GEOIP};
use crate::geoip::GeoIpLookup;
use crate::metadata::Metadata;

pub struct GeoIpRuleSet {
    lookup: Arc<dyn GeoIpLookup>,
    entries: HashMap<String, Action>,
}

impl GeoIpRuleSet {
    pub fn new(lookup: Arc<dyn GeoIpLookup>) -> Self {
        Self {
            lookup,
            entries: HashMap::new(),
        }
    }

    pub fn add(&mut self, country: impl Into<String>, action: Action) {
        self.entries.insert(country.into(), action);
    }
}

impl RuleSet for GeoIpRuleSet {
    fn kind(&self) -> &'static str {
        KIND_GEOIP
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn dispatch(&self, metadata: &Metadata) -> Option<Action> {
        let ip = metadata.remote_ip?;
        let country = self.lookup.lookup(ip)?;
        self.entries.get(&country).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::NoGeoIp;

    #[test]
    fn miss_is_not_an_error() {
        let set = GeoIpRuleSet::new(Arc::new(NoGeoIp));
        let m = Metadata::new().with_remote_ip("1.1.1.1".parse().unwrap());
        assert!(set.dispatch(&m).is_none());
    }
}
