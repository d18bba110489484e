//! The fallback rule: always matches once the priority list is exhausted.
//! Grounded on `router/rule/default.go`.

use super::{Action, RuleSet, KIND_DEFAULT};
use crate::metadata::Metadata;

pub struct DefaultRule {
    action: Action,
}

impl DefaultRule {
    pub fn new(action: Action) -> Self {
        Self { action }
    }
}

impl Default for DefaultRule {
    fn default() -> Self {
        Self::new(Action::new("DIRECT", "none"))
    }
}

impl RuleSet for DefaultRule {
    fn kind(&self) -> &'static str {
        KIND_DEFAULT
    }

    fn is_empty(&self) -> bool {
        false
    }

    fn dispatch(&self, _metadata: &Metadata) -> Option<Action> {
        Some(self.action.clone())
    }
}
