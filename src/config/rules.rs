//! Rule-line grammar: `KIND,PATTERN,EGRESS[,POLICY]`, `DEFAULT,EGRESS[,POLICY]`,
//! `PRIOR,kind,kind,…`. Grounded on `config/rule.go`.

use crate::error::ConfigError;
use crate::router::rule::{KIND_DEFAULT, KIND_DOMAIN, KIND_GEOIP, KIND_PRGNAME, KIND_PRGPATH, KIND_ROUTE};

#[derive(Debug, Clone)]
pub enum RuleLine {
    Match {
        kind: String,
        pattern: String,
        egress: String,
        policy: String,
    },
    Default {
        egress: String,
        policy: String,
    },
    Priority(Vec<String>),
}

const KNOWN_KINDS: &[&str] = &[
    KIND_ROUTE,
    KIND_DOMAIN,
    KIND_GEOIP,
    KIND_PRGNAME,
    KIND_PRGPATH,
    KIND_DEFAULT,
];

pub fn parse_rule_line(line: &str) -> Result<RuleLine, ConfigError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.is_empty() || fields[0].is_empty() {
        return Err(ConfigError::InvalidRule(line.to_string()));
    }
    let kind = fields[0].to_ascii_uppercase();

    if kind == "PRIOR" {
        if fields.len() < 2 {
            return Err(ConfigError::InvalidRule(line.to_string()));
        }
        let kinds: Vec<String> = fields[1..].iter().map(|k| k.to_ascii_uppercase()).collect();
        for k in &kinds {
            if !KNOWN_KINDS.contains(&k.as_str()) || k == KIND_DEFAULT {
                return Err(ConfigError::UnknownRuleKind(k.clone()));
            }
        }
        return Ok(RuleLine::Priority(kinds));
    }

    if kind == KIND_DEFAULT {
        let (egress, policy) = match fields.len() {
            2 => (fields[1].to_string(), "none".to_string()),
            3 => (fields[1].to_string(), fields[2].to_string()),
            _ => return Err(ConfigError::InvalidRule(line.to_string())),
        };
        return Ok(RuleLine::Default { egress, policy });
    }

    if !KNOWN_KINDS.contains(&kind.as_str()) {
        return Err(ConfigError::UnknownRuleKind(kind));
    }

    let (pattern, egress, policy) = match fields.len() {
        3 => (fields[1].to_string(), fields[2].to_string(), "none".to_string()),
        4 => (fields[1].to_string(), fields[2].to_string(), fields[3].to_string()),
        _ => return Err(ConfigError::InvalidRule(line.to_string())),
    };
    Ok(RuleLine::Match {
        kind,
        pattern,
        egress,
        policy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_domain_rule() {
        let line = parse_rule_line("DOMAIN,+.example.com,EG1,none").unwrap();
        match line {
            RuleLine::Match {
                kind,
                pattern,
                egress,
                policy,
            } => {
                assert_eq!(kind, "DOMAIN");
                assert_eq!(pattern, "+.example.com");
                assert_eq!(egress, "EG1");
                assert_eq!(policy, "none");
            }
            _ => panic!("expected a match rule"),
        }
    }

    #[test]
    fn parses_default_without_policy() {
        let line = parse_rule_line("DEFAULT,DIRECT").unwrap();
        match line {
            RuleLine::Default { egress, policy } => {
                assert_eq!(egress, "DIRECT");
                assert_eq!(policy, "none");
            }
            _ => panic!("expected a default rule"),
        }
    }

    #[test]
    fn parses_priority_list() {
        let line = parse_rule_line("PRIOR,ROUTE,GEOIP").unwrap();
        match line {
            RuleLine::Priority(kinds) => assert_eq!(kinds, vec!["ROUTE", "GEOIP"]),
            _ => panic!("expected a priority line"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(parse_rule_line("BOGUS,x,EG1").is_err());
    }

    #[test]
    fn rejects_malformed_field_count() {
        assert!(parse_rule_line("DOMAIN,+.example.com").is_err());
    }
}
