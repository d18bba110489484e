//! Exact match on `metadata.process_name`. Grounded on
//! `router/rule/prgname.go` — canonical key `PRGNAME` (see SPEC_FULL.md §9).

use std::collections::HashMap;

use super::{Action, RuleSet, KIND_PRGNAME};
use crate::metadata::Metadata;

#[derive(Default)]
pub struct PrgNameRuleSet {
    entries: HashMap<String, Action>,
}

impl PrgNameRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, action: Action) {
        self.entries.insert(name.into(), action);
    }
}

impl RuleSet for PrgNameRuleSet {
    fn kind(&self) -> &'static str {
        KIND_PRGNAME
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn dispatch(&self, metadata: &Metadata) -> Option<Action> {
        let name = metadata.process_name.as_ref()?;
        self.entries.get(name).cloned()
    }
}
