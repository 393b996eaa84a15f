//! Top-level stack composition.
//!
//! Sequential, single-pass declaration: network → storage → edge →
//! compute → security wiring → outputs. Configuration errors abort
//! before the first resource is declared, so a failed composition
//! never yields a partial graph.

use serde_json::json;
use tracing::info;

use lms_graph::{ResourceGraph, Template};

use crate::compute::ServiceComposer;
use crate::config::StackConfig;
use crate::edge::EdgeComposer;
use crate::error::ComposeResult;
use crate::network::NetworkComposer;
use crate::storage::{DatabaseComposer, FilesystemComposer};
use crate::wiring::{self, TrafficPair};

/// The composed Moodle hosting stack.
pub struct MoodleStack;

impl MoodleStack {
    /// Compose the full resource graph for the given configuration.
    pub fn compose(config: &StackConfig) -> ComposeResult<ResourceGraph> {
        config.validate()?;

        let mut graph = ResourceGraph::new();

        let network = NetworkComposer::new(config.max_azs).compose(&mut graph)?;
        let database = DatabaseComposer::new(config.teardown).compose(&mut graph, &network)?;
        let filesystem = FilesystemComposer::new(config.teardown).compose(&mut graph, &network)?;

        let edge = EdgeComposer::new().compose(&mut graph, config, &network, 8080)?;
        let service = ServiceComposer::new(config.site_name.clone()).compose(
            &mut graph,
            &network,
            &database,
            &filesystem,
            &edge.target_group_arn(),
        )?;

        // Every traffic pair gets rules in both directions; see the
        // wiring module for why one direction is never enough.
        wiring::compose_pairs(
            &mut graph,
            &[
                TrafficPair::new(
                    "ServiceDb",
                    service.security_group.clone(),
                    database.security_group.clone(),
                    database.port,
                ),
                TrafficPair::new(
                    "ServiceEfs",
                    service.security_group.clone(),
                    filesystem.security_group.clone(),
                    filesystem.port,
                ),
                TrafficPair::new(
                    "AlbService",
                    edge.security_group.clone(),
                    service.security_group.clone(),
                    service.container_port,
                ),
            ],
        )?;

        // The admin password leaves the stack as a reference only;
        // operators fetch the live value out-of-band.
        graph.add_output("MOODLE-USERNAME", json!(service.admin_username))?;
        graph.add_output(
            "MOODLE-PASSWORD-ARN",
            json!(service.admin_secret.arn().token()),
        )?;
        if let Some(env) = &config.environment {
            graph.add_output("STACK-ACCOUNT", json!(env.account))?;
            graph.add_output("STACK-REGION", json!(env.region))?;
        }

        info!(
            stack = %config.stack_name,
            resources = graph.len(),
            "composed stack"
        );
        Ok(graph)
    }

    /// Compose and render in one step.
    pub fn synth(config: &StackConfig) -> ComposeResult<Template> {
        Ok(Self::compose(config)?.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_config;
    use crate::error::ComposeError;

    #[test]
    fn test_full_scenario_resource_counts() {
        let template = MoodleStack::synth(&sample_config()).unwrap();

        assert_eq!(template.resource_count_of("AWS::EC2::VPC"), 1);
        assert_eq!(template.resource_count_of("AWS::EC2::Subnet"), 4);
        assert_eq!(template.resource_count_of("AWS::RDS::DBInstance"), 1);
        assert_eq!(template.resource_count_of("AWS::EFS::FileSystem"), 1);
        assert_eq!(template.resource_count_of("AWS::EFS::AccessPoint"), 1);
        assert_eq!(template.resource_count_of("AWS::ECS::Service"), 1);
        assert_eq!(template.resource_count_of("AWS::WAFv2::WebACL"), 1);
        assert_eq!(template.resource_count_of("AWS::WAFv2::WebACLAssociation"), 1);
    }

    #[test]
    fn test_missing_certificate_yields_no_partial_graph() {
        let mut config = sample_config();
        config.certificate_arn = String::new();
        let err = MoodleStack::compose(&config).unwrap_err();
        assert!(matches!(err, ComposeError::MissingInput("certificate_arn")));
    }

    #[test]
    fn test_outputs_expose_reference_not_secret() {
        let template = MoodleStack::synth(&sample_config()).unwrap();
        assert_eq!(template.output("MOODLE-USERNAME"), Some(&json!("moodleadmin")));
        assert_eq!(
            template.output("MOODLE-PASSWORD-ARN"),
            Some(&json!("${MoodleAdminSecret.Arn}"))
        );
    }

    #[test]
    fn test_environment_agnostic_omits_env_outputs() {
        let mut config = sample_config();
        config.environment = None;
        let template = MoodleStack::synth(&config).unwrap();
        assert_eq!(template.output("STACK-ACCOUNT"), None);
        assert_eq!(template.output("STACK-REGION"), None);
    }
}
