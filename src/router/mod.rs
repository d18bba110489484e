//! The rule engine: a priority-ordered sequence of [`rule::RuleSet`]s with a
//! `DEFAULT` fallback. Grounded on `router/router.go`.

pub mod policy;
pub mod rule;

use rule::{Action, RuleSet};

use crate::metadata::Metadata;

pub trait Router: Send + Sync {
    fn dispatch(&self, metadata: &Metadata) -> Action;
}

/// Holds one [`RuleSet`] per kind plus the priority order rules are tried
/// in. Every rule kind not named in `priority` is never consulted — this
/// matches the distilled design's semantics exactly (an omitted kind is not
/// an error, it is simply unused).
pub struct DefaultRouter {
    priority: Vec<Box<dyn RuleSet>>,
    default: Box<dyn RuleSet>,
}

impl DefaultRouter {
    pub fn new(priority: Vec<Box<dyn RuleSet>>, default: Box<dyn RuleSet>) -> Self {
        Self { priority, default }
    }
}

impl Router for DefaultRouter {
    fn dispatch(&self, metadata: &Metadata) -> Action {
        for set in &self.priority {
            if set.is_empty() {
                continue;
            }
            if let Some(action) = set.dispatch(metadata) {
                return action;
            }
        }
        self.default
            .dispatch(metadata)
            .expect("the default rule always matches")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rule::domain::DomainRuleSet;
    use rule::route::RouteRuleSet;
    use rule::{default::DefaultRule, Action};

    #[test]
    fn domain_rule_match_falls_back_to_default() {
        let mut domain = DomainRuleSet::new();
        domain.add("+.example.com", Action::new("EG1", "none"));

        let router = DefaultRouter::new(
            vec![Box::new(RouteRuleSet::new()), Box::new(domain)],
            Box::new(DefaultRule::new(Action::new("DIRECT", "none"))),
        );

        let m = Metadata::new().with_domain("a.example.com.");
        assert_eq!(router.dispatch(&m).egress, "EG1");

        let m = Metadata::new().with_domain("foo.other.com.");
        assert_eq!(router.dispatch(&m).egress, "DIRECT");
    }

    #[test]
    fn empty_rule_sets_are_skipped() {
        let router = DefaultRouter::new(
            vec![
                Box::new(RouteRuleSet::new()),
                Box::new(rule::geoip::GeoIpRuleSet::new(std::sync::Arc::new(
                    crate::geoip::NoGeoIp,
                ))),
            ],
            Box::new(DefaultRule::new(Action::new("DIRECT", "none"))),
        );
        let m = Metadata::new().with_remote_ip("8.8.8.8".parse().unwrap());
        assert_eq!(router.dispatch(&m).egress, "DIRECT");
    }
}
