//! Cross-resource security wiring.
//!
//! Zero-trust default: nothing talks to anything without an explicit
//! rule. For every pair of resources that exchange traffic the
//! platform needs a permission in *each* direction; a missing
//! direction does not fail the deploy, it shows up later as connection
//! timeouts. This module therefore only ever emits rules in pairs.

use serde_json::json;
use tracing::debug;

use lms_graph::{LogicalId, Resource, ResourceGraph};

use crate::error::ComposeResult;

/// A declared traffic relationship between two security groups.
#[derive(Debug, Clone)]
pub struct TrafficPair {
    pub name: &'static str,
    pub a: LogicalId,
    pub b: LogicalId,
    pub port: u16,
}

impl TrafficPair {
    pub fn new(name: &'static str, a: LogicalId, b: LogicalId, port: u16) -> Self {
        Self { name, a, b, port }
    }

    /// Emit the allow rules for both directions of this pair.
    pub fn compose(&self, graph: &mut ResourceGraph) -> ComposeResult<()> {
        self.ingress(graph, &self.a, &self.b, "AtoB")?;
        self.ingress(graph, &self.b, &self.a, "BtoA")?;
        debug!(pair = self.name, port = self.port, "wired both directions");
        Ok(())
    }

    fn ingress(
        &self,
        graph: &mut ResourceGraph,
        to: &LogicalId,
        from: &LogicalId,
        direction: &str,
    ) -> ComposeResult<()> {
        graph.add_resource(
            LogicalId::new(format!("{}Ingress{}", self.name, direction))?,
            Resource::new("AWS::EC2::SecurityGroupIngress")
                .prop_attr("GroupId", &to.attr("GroupId"))
                .prop_attr("SourceSecurityGroupId", &from.attr("GroupId"))
                .prop("IpProtocol", json!("tcp"))
                .prop("FromPort", json!(self.port))
                .prop("ToPort", json!(self.port)),
        )?;
        Ok(())
    }
}

/// Wire every declared traffic pair, both directions each.
pub fn compose_pairs(graph: &mut ResourceGraph, pairs: &[TrafficPair]) -> ComposeResult<()> {
    for pair in pairs {
        pair.compose(graph)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(graph: &mut ResourceGraph, name: &str) -> LogicalId {
        graph
            .add_resource(
                LogicalId::new(name).unwrap(),
                Resource::new("AWS::EC2::SecurityGroup"),
            )
            .unwrap()
    }

    #[test]
    fn test_pair_emits_both_directions() {
        let mut graph = ResourceGraph::new();
        let service = group(&mut graph, "ServiceSg");
        let db = group(&mut graph, "DbSg");

        TrafficPair::new("ServiceDb", service, db, 3306)
            .compose(&mut graph)
            .unwrap();

        let template = graph.render();
        let rules = template.find_resources("AWS::EC2::SecurityGroupIngress");
        assert_eq!(rules.len(), 2);
        assert!(template.has_resource_properties(
            "AWS::EC2::SecurityGroupIngress",
            &json!({
                "GroupId": "${DbSg.GroupId}",
                "SourceSecurityGroupId": "${ServiceSg.GroupId}",
                "FromPort": 3306
            })
        ));
        assert!(template.has_resource_properties(
            "AWS::EC2::SecurityGroupIngress",
            &json!({
                "GroupId": "${ServiceSg.GroupId}",
                "SourceSecurityGroupId": "${DbSg.GroupId}",
                "FromPort": 3306
            })
        ));
    }

    #[test]
    fn test_rules_scoped_to_single_port() {
        let mut graph = ResourceGraph::new();
        let service = group(&mut graph, "ServiceSg");
        let efs = group(&mut graph, "EfsSg");

        TrafficPair::new("ServiceEfs", service, efs, 2049)
            .compose(&mut graph)
            .unwrap();

        let template = graph.render();
        for (_, props) in template.find_resources("AWS::EC2::SecurityGroupIngress") {
            assert_eq!(props["FromPort"], json!(2049));
            assert_eq!(props["ToPort"], json!(2049));
            assert_eq!(props["IpProtocol"], json!("tcp"));
        }
    }
}
