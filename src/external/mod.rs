//! Capabilities consumed from the host system.
//!
//! # Data Flow
//! ```text
//! services/* orchestrators
//!     → CertificateProvider (openssl / certbot)
//!     → AuthSidecarManager (oauth2-proxy under supervisord)
//!     → ReachabilityProbe (TCP connect, DNS ownership)
//!     → RuleEngine (iptables) ──┐
//!     → CommandRunner (sh -c) ◄─┘ every shell adapter runs through it
//! ```
//!
//! # Design Decisions
//! - Every capability is an async trait object so tests swap in fakes
//! - Shell adapters share one `CommandRunner`, keeping process spawning in one place
//! - Adapters report failures as `ControlError`; callers decide what is fatal

pub mod certificates;
pub mod commands;
pub mod firewall;
pub mod probe;
pub mod sidecar;

pub use certificates::{CertificateProvider, OpensslCertbotProvider};
pub use commands::{CommandRunner, ShellRunner};
pub use firewall::{Chain, FirewallRule, IptablesRuleEngine, RuleEngine, Target};
pub use probe::{ReachabilityProbe, TcpProbe};
pub use sidecar::{AuthSidecarManager, SupervisorSidecarManager};
