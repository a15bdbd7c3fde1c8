//! Firewall rule primitives.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ControlResult;
use crate::external::commands::{quote, CommandRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Input,
    Output,
    Forward,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Chain::Input => "INPUT",
            Chain::Output => "OUTPUT",
            Chain::Forward => "FORWARD",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Accept,
    Drop,
    Reject,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::Accept => "ACCEPT",
            Target::Drop => "DROP",
            Target::Reject => "REJECT",
        })
    }
}

/// A single packet filter rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub chain: Chain,
    pub out_interface: Option<String>,
    pub destination: String,
    pub protocol: String,
    pub dport: u16,
    pub target: Target,
    /// Target extension arguments, e.g. `("--reject-with", "tcp-reset")`.
    pub args: Vec<(String, String)>,
}

impl FirewallRule {
    /// Rule specification as iptables arguments, without the chain action.
    pub fn spec(&self) -> String {
        let mut spec = String::new();
        if let Some(iface) = &self.out_interface {
            spec.push_str(&format!("-o {} ", quote(iface)));
        }
        spec.push_str(&format!(
            "-d {} -p {} --dport {} -j {}",
            quote(&self.destination),
            quote(&self.protocol),
            self.dport,
            self.target
        ));
        for (flag, value) in &self.args {
            spec.push_str(&format!(" {flag} {}", quote(value)));
        }
        spec
    }
}

/// Adds and removes packet filter rules.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn add(&self, rule: &FirewallRule) -> ControlResult<()>;
    async fn delete(&self, rule: &FirewallRule) -> ControlResult<()>;
}

/// `iptables` through a command runner.
pub struct IptablesRuleEngine {
    runner: Arc<dyn CommandRunner>,
    binary: String,
}

impl IptablesRuleEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl RuleEngine for IptablesRuleEngine {
    async fn add(&self, rule: &FirewallRule) -> ControlResult<()> {
        self.runner
            .run(&format!("{} -A {} {}", self.binary, rule.chain, rule.spec()))
            .await
            .map(|_| ())
    }

    async fn delete(&self, rule: &FirewallRule) -> ControlResult<()> {
        self.runner
            .run(&format!("{} -D {} {}", self.binary, rule.chain, rule.spec()))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_spec() {
        let rule = FirewallRule {
            chain: Chain::Output,
            out_interface: Some("wg0".into()),
            destination: "10.8.0.2".into(),
            protocol: "tcp".into(),
            dport: 8080,
            target: Target::Reject,
            args: vec![("--reject-with".into(), "tcp-reset".into())],
        };
        assert_eq!(
            rule.spec(),
            "-o wg0 -d 10.8.0.2 -p tcp --dport 8080 -j REJECT --reject-with tcp-reset"
        );
    }

    #[test]
    fn test_rule_spec_quotes_interpolated_values() {
        let rule = FirewallRule {
            chain: Chain::Output,
            out_interface: Some("wg0;reboot".into()),
            destination: "10.8.0.2".into(),
            protocol: "tcp".into(),
            dport: 8080,
            target: Target::Reject,
            args: Vec::new(),
        };
        assert_eq!(rule.spec(), "-o 'wg0;reboot' -d 10.8.0.2 -p tcp --dport 8080 -j REJECT");
    }
}
