//! Group-selection policies: how an egress *group* name resolves to one
//! concrete egress. `none` is a pass-through — the action's egress name is
//! used directly, with no group indirection. Grounded on
//! `router/policy/policy.go`; only the `none` strategy is implemented, the
//! trait is the specified extension point for load-balancing/failover
//! strategies this source does not carry.

use crate::metadata::Metadata;

pub trait GroupPolicy: Send + Sync {
    fn select<'a>(&self, members: &'a [String], metadata: &Metadata) -> Option<&'a str>;
}

/// Unknown policy names fall back to this: the egress name in the matching
/// `Action` is used as-is, with no group members to choose among.
#[derive(Debug, Default)]
pub struct NonePolicy;

impl GroupPolicy for NonePolicy {
    fn select<'a>(&self, members: &'a [String], _metadata: &Metadata) -> Option<&'a str> {
        members.first().map(String::as_str)
    }
}

/// Resolves a policy name to an implementation. Every name but `"none"` is
/// currently unknown and falls back to it too.
pub fn resolve(_name: &str) -> Box<dyn GroupPolicy> {
    Box::new(NonePolicy)
}
