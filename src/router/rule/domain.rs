//! Matches `metadata.domain` against a reverse-labelled trie with `+`
//! wildcard support. Grounded on `router/rule/domain.go`.

use super::{Action, RuleSet, KIND_DOMAIN};
use crate::metadata::Metadata;
use crate::trie::Trie;

#[derive(Default)]
pub struct DomainRuleSet {
    trie: Trie<Action>,
}

impl DomainRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pattern: &str, action: Action) {
        self.trie.insert(pattern, action);
    }
}

impl RuleSet for DomainRuleSet {
    fn kind(&self) -> &'static str {
        KIND_DOMAIN
    }

    fn is_empty(&self) -> bool {
        self.trie.empty()
    }

    fn dispatch(&self, metadata: &Metadata) -> Option<Action> {
        let domain = metadata.domain.as_ref()?;
        self.trie.search(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_rule_matches_subdomain() {
        let mut set = DomainRuleSet::new();
        set.add("+.example.com", Action::new("EG1", "none"));

        let m = Metadata::new().with_domain("a.example.com.");
        assert_eq!(set.dispatch(&m).unwrap().egress, "EG1");

        let m = Metadata::new().with_domain("foo.other.com.");
        assert!(set.dispatch(&m).is_none());
    }
}
