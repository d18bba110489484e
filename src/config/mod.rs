//! YAML configuration: top-level shape, duplicate-name validation, and the
//! rule-grammar lines. Grounded on `config/config.go`.

pub mod rules;

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
pub use rules::{parse_rule_line, RuleLine};

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProxyConfig {
    None,
    Socks,
    Shadowsocks { cipher: String, password: String },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IngressConfig {
    General {
        name: String,
        listen: String,
        proxy: ProxyConfig,
    },
    Tun {
        name: String,
        device: String,
        address: String,
        netmask: String,
        #[serde(default)]
        mtu: Option<u32>,
        #[serde(default)]
        packet_file: Option<String>,
        #[serde(default = "default_mapped_cidr")]
        mapped_cidr: String,
    },
}

fn default_mapped_cidr() -> String {
    "198.18.0.0/16".to_string()
}

impl IngressConfig {
    pub fn name(&self) -> &str {
        match self {
            IngressConfig::General { name, .. } => name,
            IngressConfig::Tun { name, .. } => name,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EgressConfig {
    Direct {
        name: String,
    },
    Reject {
        name: String,
    },
    General {
        name: String,
        server: String,
        proxy: ProxyConfig,
    },
}

impl EgressConfig {
    pub fn name(&self) -> &str {
        match self {
            EgressConfig::Direct { name } => name,
            EgressConfig::Reject { name } => name,
            EgressConfig::General { name, .. } => name,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    pub name: String,
    pub member: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FakeIpConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_fakeip_cidr")]
    pub cidr: String,
    #[serde(default = "default_fakeip_ttl")]
    pub ttl: u64,
}

fn default_fakeip_cidr() -> String {
    "198.18.0.1/16".to_string()
}

fn default_fakeip_ttl() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DnsConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_dns_listen")]
    pub listen: String,
    #[serde(default)]
    pub upstream: Vec<String>,
    #[serde(default)]
    pub fakeip: FakeIpConfig,
}

fn default_dns_listen() -> String {
    "127.0.0.1:53".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeoIpConfig {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    pub listen: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub ingress: Vec<IngressConfig>,
    #[serde(default)]
    pub ingress_group: Vec<GroupConfig>,
    #[serde(default)]
    pub egress: Vec<EgressConfig>,
    #[serde(default)]
    pub egress_group: Vec<GroupConfig>,
    #[serde(default)]
    pub rule: Vec<String>,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub geoip: GeoIpConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every rule line parses, every ingress/egress name is unique,
    /// and the priority list (if any) names only known kinds. Does not
    /// build the rule engine itself — that happens in bootstrap, where the
    /// egress registry is available to resolve rule actions against.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut ingress_names = HashSet::new();
        for ingress in &self.ingress {
            if !ingress_names.insert(ingress.name().to_string()) {
                return Err(ConfigError::Duplicate {
                    zone: "ingress",
                    name: ingress.name().to_string(),
                });
            }
        }

        let mut egress_names = HashSet::new();
        for egress in &self.egress {
            if !egress_names.insert(egress.name().to_string()) {
                return Err(ConfigError::Duplicate {
                    zone: "egress",
                    name: egress.name().to_string(),
                });
            }
        }

        for line in &self.rule {
            parse_rule_line(line)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_egress_names() {
        let yaml = r#"
egress:
  - type: direct
    name: DIRECT
  - type: direct
    name: DIRECT
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Duplicate { zone: "egress", .. })
        ));
    }

    #[test]
    fn rejects_wrong_scalar_type() {
        let yaml = r#"
dns:
  enable: "yes"
"#;
        let result: Result<Config, serde_yaml::Error> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_minimal_config() {
        let yaml = r#"
egress:
  - type: direct
    name: DIRECT
rule:
  - "DEFAULT,DIRECT,none"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
    }
}
