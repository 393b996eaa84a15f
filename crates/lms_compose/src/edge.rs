//! Edge composition: load balancer, DNS binding, firewall ACL.
//!
//! The load balancer terminates TLS with the configured certificate
//! and unconditionally redirects plaintext traffic. The firewall is an
//! ordered list of managed rule groups under a default-allow ACL,
//! associated with exactly one load balancer. Every rule group runs in
//! count (observe) mode: detect before enforcing. Switching a group to
//! blocking is an operator decision.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use lms_graph::{Attr, LogicalId, Resource, ResourceGraph};

use crate::config::StackConfig;
use crate::error::ComposeResult;
use crate::network::Network;

/// Handles to the composed edge resources.
#[derive(Debug, Clone)]
pub struct Edge {
    pub load_balancer: LogicalId,
    pub target_group: LogicalId,
    pub security_group: LogicalId,
    pub web_acl: LogicalId,
}

impl Edge {
    pub fn target_group_arn(&self) -> Attr {
        self.target_group.attr("TargetGroupArn")
    }
}

/// Action applied when a managed rule group matches a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Flag and count matches without blocking the request.
    Count,
    /// Block matching requests.
    Block,
}

/// One provider-managed rule group in the ACL, evaluated in priority
/// order (lower first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedRuleGroup {
    pub name: String,
    pub managed_group: String,
    pub priority: u32,
    pub action: RuleAction,
    pub metric_name: String,
}

impl ManagedRuleGroup {
    fn new(
        name: &str,
        managed_group: &str,
        priority: u32,
        metric_name: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            managed_group: managed_group.to_string(),
            priority,
            action: RuleAction::Count,
            metric_name: metric_name.to_string(),
        }
    }

    fn render(&self) -> serde_json::Value {
        let override_action = match self.action {
            RuleAction::Count => json!({ "Count": {} }),
            // No override: the group's own block actions apply.
            RuleAction::Block => json!({ "None": {} }),
        };
        json!({
            "Name": self.name,
            "Priority": self.priority,
            "OverrideAction": override_action,
            "Statement": {
                "ManagedRuleGroupStatement": {
                    "Name": self.managed_group,
                    "VendorName": "AWS",
                    "ExcludedRules": []
                }
            },
            "VisibilityConfig": {
                "CloudWatchMetricsEnabled": true,
                "MetricName": self.metric_name,
                "SampledRequestsEnabled": true
            }
        })
    }
}

/// The detection rulesets Moodle needs, in fixed priority order:
/// PHP exploits first, then broad OWASP patterns, SQL injection,
/// Linux/LFI, and known-bad-input signatures.
pub fn moodle_rule_groups() -> Vec<ManagedRuleGroup> {
    vec![
        ManagedRuleGroup::new("WafPHPRule", "AWSManagedRulesPHPRuleSet", 0, "aws_php"),
        ManagedRuleGroup::new("WafCommonRule", "AWSManagedRulesCommonRuleSet", 1, "aws_common"),
        ManagedRuleGroup::new("WafSQLiRule", "AWSManagedRulesSQLiRuleSet", 2, "aws_sqli"),
        ManagedRuleGroup::new("WafLinuxRule", "AWSManagedRulesLinuxRuleSet", 3, "aws_linux"),
        ManagedRuleGroup::new(
            "WafBadInputRule",
            "AWSManagedRulesKnownBadInputsRuleSet",
            4,
            "aws_badinput",
        ),
    ]
}

/// Composes the public load balancer, DNS record and firewall.
#[derive(Debug, Clone)]
pub struct EdgeComposer {
    rule_groups: Vec<ManagedRuleGroup>,
}

impl EdgeComposer {
    pub fn new() -> Self {
        Self {
            rule_groups: moodle_rule_groups(),
        }
    }

    /// Replace the rule list, e.g. to move a group out of count mode.
    pub fn with_rule_groups(mut self, rule_groups: Vec<ManagedRuleGroup>) -> Self {
        self.rule_groups = rule_groups;
        self
    }

    pub fn compose(
        &self,
        graph: &mut ResourceGraph,
        config: &StackConfig,
        network: &Network,
        container_port: u16,
    ) -> ComposeResult<Edge> {
        let security_group = graph.add_resource(
            LogicalId::new("AlbSecurityGroup")?,
            Resource::new("AWS::EC2::SecurityGroup")
                .prop("GroupDescription", json!("Load balancer security group"))
                .prop_attr("VpcId", &network.vpc.attr("VpcId"))
                .prop(
                    "SecurityGroupIngress",
                    json!([
                        { "IpProtocol": "tcp", "FromPort": 80, "ToPort": 80, "CidrIp": "0.0.0.0/0" },
                        { "IpProtocol": "tcp", "FromPort": 443, "ToPort": 443, "CidrIp": "0.0.0.0/0" }
                    ]),
                ),
        )?;

        let load_balancer = graph.add_resource(
            LogicalId::new("MoodleAlb")?,
            Resource::new("AWS::ElasticLoadBalancingV2::LoadBalancer")
                .prop("Scheme", json!("internet-facing"))
                .prop("Type", json!("application"))
                .prop_with_refs(
                    "Subnets",
                    json!(network.subnet_refs(&network.public_subnets)),
                    &network
                        .public_subnets
                        .iter()
                        .map(|s| s.attr("SubnetId"))
                        .collect::<Vec<_>>(),
                )
                .prop_with_refs(
                    "SecurityGroups",
                    json!([security_group.attr("GroupId").token()]),
                    &[security_group.attr("GroupId")],
                ),
        )?;

        let target_group = graph.add_resource(
            LogicalId::new("MoodleTargetGroup")?,
            Resource::new("AWS::ElasticLoadBalancingV2::TargetGroup")
                .prop("Port", json!(container_port))
                .prop("Protocol", json!("HTTP"))
                .prop("TargetType", json!("ip"))
                .prop_attr("VpcId", &network.vpc.attr("VpcId")),
        )?;

        graph.add_resource(
            LogicalId::new("HttpsListener")?,
            Resource::new("AWS::ElasticLoadBalancingV2::Listener")
                .prop_attr("LoadBalancerArn", &load_balancer.attr("LoadBalancerArn"))
                .prop("Port", json!(443))
                .prop("Protocol", json!("HTTPS"))
                .prop("Certificates", json!([{ "CertificateArn": config.certificate_arn }]))
                .prop_with_refs(
                    "DefaultActions",
                    json!([{
                        "Type": "forward",
                        "TargetGroupArn": target_group.attr("TargetGroupArn").token()
                    }]),
                    &[target_group.attr("TargetGroupArn")],
                ),
        )?;

        // Plaintext is never served; port 80 exists only to redirect.
        graph.add_resource(
            LogicalId::new("HttpRedirectListener")?,
            Resource::new("AWS::ElasticLoadBalancingV2::Listener")
                .prop_attr("LoadBalancerArn", &load_balancer.attr("LoadBalancerArn"))
                .prop("Port", json!(80))
                .prop("Protocol", json!("HTTP"))
                .prop(
                    "DefaultActions",
                    json!([{
                        "Type": "redirect",
                        "RedirectConfig": {
                            "Protocol": "HTTPS",
                            "Port": "443",
                            "StatusCode": "HTTP_301"
                        }
                    }]),
                ),
        )?;

        graph.add_resource(
            LogicalId::new("MoodleDnsRecord")?,
            Resource::new("AWS::Route53::RecordSet")
                .prop("HostedZoneId", json!(config.hosted_zone_id))
                .prop("HostedZoneName", json!(config.hosted_zone_name))
                .prop("Name", json!(config.domain_name))
                .prop("Type", json!("A"))
                .prop_with_refs(
                    "AliasTarget",
                    json!({
                        "DNSName": load_balancer.attr("DNSName").token(),
                        "HostedZoneId": load_balancer.attr("CanonicalHostedZoneID").token()
                    }),
                    &[
                        load_balancer.attr("DNSName"),
                        load_balancer.attr("CanonicalHostedZoneID"),
                    ],
                ),
        )?;

        let rules: Vec<serde_json::Value> = self.rule_groups.iter().map(|r| r.render()).collect();
        let web_acl = graph.add_resource(
            LogicalId::new("WebAcl")?,
            Resource::new("AWS::WAFv2::WebACL")
                .prop("Name", json!(format!("{}-waf", config.stack_name)))
                .prop("DefaultAction", json!({ "Allow": {} }))
                // Regional scope: the ACL fronts a regional load
                // balancer, not a global distribution.
                .prop("Scope", json!("REGIONAL"))
                .prop(
                    "VisibilityConfig",
                    json!({
                        "CloudWatchMetricsEnabled": true,
                        "MetricName": "webACL",
                        "SampledRequestsEnabled": true
                    }),
                )
                .prop("Rules", json!(rules)),
        )?;

        graph.add_resource(
            LogicalId::new("WebAclAssociation")?,
            Resource::new("AWS::WAFv2::WebACLAssociation")
                .prop_attr("WebACLArn", &web_acl.attr("Arn"))
                .prop_attr("ResourceArn", &load_balancer.attr("LoadBalancerArn")),
        )?;

        info!(rules = self.rule_groups.len(), "composed edge and firewall");
        Ok(Edge {
            load_balancer,
            target_group,
            security_group,
            web_acl,
        })
    }
}

impl Default for EdgeComposer {
    fn default() -> Self {
        Self::new()
    }
}
