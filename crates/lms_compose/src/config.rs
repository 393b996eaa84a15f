//! Stack configuration.
//!
//! All external inputs to the composer live here: domain and DNS zone,
//! certificate reference, target environment, teardown policy. Missing
//! or malformed values abort composition with a descriptive error
//! before any resource is declared.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ComposeError, ComposeResult};

/// Target account and region. Omitting it composes an
/// environment-agnostic stack that can be deployed anywhere, at the
/// cost of region-dependent lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

/// What happens to stateful resources (database, filesystem) when the
/// stack is torn down.
///
/// There is deliberately no `Default` impl: destroying a production
/// database because nobody chose otherwise is exactly the failure this
/// field exists to prevent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeardownPolicy {
    /// Delete the resource with the stack (ephemeral/dev environments).
    Destroy,
    /// Keep the resource after the stack is gone.
    Retain,
}

impl TeardownPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownPolicy::Destroy => "Delete",
            TeardownPolicy::Retain => "Retain",
        }
    }
}

/// Inputs for one Moodle hosting stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack name, used for the firewall ACL name and output banner.
    pub stack_name: String,
    /// Public domain the site is served under.
    pub domain_name: String,
    /// Id of the pre-existing DNS hosted zone.
    pub hosted_zone_id: String,
    /// Name of the pre-existing DNS hosted zone.
    pub hosted_zone_name: String,
    /// ARN of the TLS certificate for the load balancer.
    pub certificate_arn: String,
    /// Target account/region; `None` composes environment-agnostic.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Required, explicit teardown choice for stateful resources.
    pub teardown: TeardownPolicy,
    /// Availability zones to span. Default 2; the region's real zone
    /// count is only checked by the provider at deploy time.
    #[serde(default = "default_max_azs")]
    pub max_azs: usize,
    /// Site name injected into the Moodle first-boot installer.
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

fn default_max_azs() -> usize {
    2
}

fn default_site_name() -> String {
    "Moodle".to_string()
}

impl StackConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn from_file(path: &Path) -> ComposeResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ComposeError::ConfigFile(format!("{}: {}", path.display(), e))
        })?;
        let config: StackConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every required input before any resource is declared.
    pub fn validate(&self) -> ComposeResult<()> {
        if self.stack_name.is_empty() {
            return Err(ComposeError::MissingInput("stack_name"));
        }
        if self.domain_name.is_empty() {
            return Err(ComposeError::MissingInput("domain_name"));
        }
        if self.hosted_zone_id.is_empty() {
            return Err(ComposeError::MissingInput("hosted_zone_id"));
        }
        if self.hosted_zone_name.is_empty() {
            return Err(ComposeError::MissingInput("hosted_zone_name"));
        }
        if self.certificate_arn.is_empty() {
            return Err(ComposeError::MissingInput("certificate_arn"));
        }
        if !self.certificate_arn.starts_with("arn:") {
            return Err(ComposeError::InvalidInput {
                field: "certificate_arn",
                reason: format!("not an ARN: {}", self.certificate_arn),
            });
        }
        let zone = self.hosted_zone_name.trim_end_matches('.');
        let domain = self.domain_name.trim_end_matches('.');
        if domain != zone && !domain.ends_with(&format!(".{}", zone)) {
            return Err(ComposeError::InvalidInput {
                field: "domain_name",
                reason: format!(
                    "{} is not within hosted zone {}",
                    self.domain_name, self.hosted_zone_name
                ),
            });
        }
        if self.max_azs < 2 {
            return Err(ComposeError::InvalidInput {
                field: "max_azs",
                reason: format!("at least 2 zones required, got {}", self.max_azs),
            });
        }
        debug!(stack = %self.stack_name, "configuration validated");
        Ok(())
    }
}
