//! Exact match on `metadata.process_path`. Grounded on
//! `router/rule/prgpath.go`.

use std::collections::HashMap;

use super::{Action, RuleSet, KIND_PRGPATH};
use crate::metadata::Metadata;

#[derive(Default)]
pub struct PrgPathRuleSet {
    entries: HashMap<String, Action>,
}

impl PrgPathRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, action: Action) {
        self.entries.insert(path.into(), action);
    }
}

impl RuleSet for PrgPathRuleSet {
    fn kind(&self) -> &'static str {
        KIND_PRGPATH
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn dispatch(&self, metadata: &Metadata) -> Option<Action> {
        let path = metadata.process_path.as_ref()?;
        self.entries.get(path).cloned()
    }
}
