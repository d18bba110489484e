//! Matches `metadata.remote_ip` against configured CIDR blocks. Grounded on
//! `router/rule/route.go`.

use ipnet::IpNet;

use super::{Action, RuleSet, KIND_ROUTE};
use crate::metadata::Metadata;

#[derive(Default)]
pub struct RouteRuleSet {
    entries: Vec<(IpNet, Action)>,
}

impl RouteRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, cidr: IpNet, action: Action) {
        self.entries.push((cidr, action));
    }
}

impl RuleSet for RouteRuleSet {
    fn kind(&self) -> &'static str {
        KIND_ROUTE
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn dispatch(&self, metadata: &Metadata) -> Option<Action> {
        let ip = metadata.remote_ip?;
        self.entries
            .iter()
            .find(|(net, _)| net.contains(&ip))
            .map(|(_, action)| action.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_containing_cidr_wins() {
        let mut set = RouteRuleSet::new();
        set.add("10.0.0.0/8".parse().unwrap(), Action::new("EG1", "none"));
        set.add("10.0.0.0/24".parse().unwrap(), Action::new("EG2", "none"));

        let m = Metadata::new().with_remote_ip("10.0.0.5".parse().unwrap());
        assert_eq!(set.dispatch(&m).unwrap().egress, "EG1");
    }

    #[test]
    fn no_match_outside_any_cidr() {
        let mut set = RouteRuleSet::new();
        set.add("10.0.0.0/8".parse().unwrap(), Action::new("EG1", "none"));
        let m = Metadata::new().with_remote_ip("8.8.8.8".parse().unwrap());
        assert!(set.dispatch(&m).is_none());
    }
}
