//! # lms_compose
//!
//! Infrastructure composition for the lmstack Moodle hosting
//! environment.
//!
//! Given a validated [`StackConfig`], [`MoodleStack::compose`]
//! deterministically declares the whole resource graph: isolated
//! network, managed MySQL database, shared elastic filesystem, a
//! Fargate service behind a TLS-terminating load balancer, DNS
//! binding, a managed-rule firewall ACL, and secret-by-reference
//! administrative credentials. Every cross-resource value is an
//! explicit attribute reference, and every traffic pair is wired in
//! both directions.

pub mod compute;
pub mod config;
pub mod edge;
pub mod error;
pub mod network;
pub mod stack;
pub mod storage;
pub mod wiring;

pub use compute::{Service, ServiceComposer};
pub use config::{Environment, StackConfig, TeardownPolicy};
pub use edge::{Edge, EdgeComposer, ManagedRuleGroup, RuleAction};
pub use error::{ComposeError, ComposeResult};
pub use network::{Network, NetworkComposer};
pub use stack::MoodleStack;
pub use storage::{Database, DatabaseComposer, Filesystem, FilesystemComposer};
pub use wiring::TrafficPair;
