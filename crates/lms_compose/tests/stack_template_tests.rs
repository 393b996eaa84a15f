//! Integration tests pinning the composed stack's template shape.

use std::collections::HashSet;

use serde_json::json;

use lms_compose::{
    ComposeError, Environment, MoodleStack, NetworkComposer, StackConfig, TeardownPolicy,
};
use lms_graph::ResourceGraph;

fn config() -> StackConfig {
    StackConfig {
        stack_name: "moodle-dev".to_string(),
        domain_name: "example.org".to_string(),
        hosted_zone_id: "Z1".to_string(),
        hosted_zone_name: "example.org".to_string(),
        certificate_arn: "arn:aws:acm:eu-west-2:111111111111:certificate/abc".to_string(),
        environment: Some(Environment {
            account: "111111111111".to_string(),
            region: "eu-west-2".to_string(),
        }),
        teardown: TeardownPolicy::Destroy,
        max_azs: 2,
        site_name: "Example Academy".to_string(),
    }
}

#[test]
fn scenario_full_config_yields_expected_graph() {
    let template = MoodleStack::synth(&config()).unwrap();

    assert_eq!(template.resource_count_of("AWS::EC2::VPC"), 1);
    assert_eq!(template.resource_count_of("AWS::EC2::Subnet"), 4);
    assert_eq!(template.resource_count_of("AWS::RDS::DBInstance"), 1);
    assert!(template.has_resource_properties(
        "AWS::RDS::DBInstance",
        &json!({ "DBInstanceClass": "db.t4g.micro" })
    ));
    assert_eq!(template.resource_count_of("AWS::EFS::FileSystem"), 1);
    assert_eq!(template.resource_count_of("AWS::EFS::AccessPoint"), 1);
    assert_eq!(template.resource_count_of("AWS::ECS::Service"), 1);
    assert!(template
        .has_resource_properties("AWS::ECS::Service", &json!({ "DesiredCount": 1 })));
    assert_eq!(template.resource_count_of("AWS::WAFv2::WebACL"), 1);
    assert!(template.has_resource_properties("AWS::WAFv2::WebACL", &json!({ "Scope": "REGIONAL" })));
    assert_eq!(
        template.resource_count_of("AWS::WAFv2::WebACLAssociation"),
        1
    );
}

#[test]
fn scenario_missing_certificate_aborts_before_composition() {
    let mut bad = config();
    bad.certificate_arn = String::new();
    let err = MoodleStack::compose(&bad).unwrap_err();
    assert!(matches!(err, ComposeError::MissingInput("certificate_arn")));
}

#[test]
fn subnets_scale_evenly_with_zone_count() {
    for zones in 2..=4 {
        let mut graph = ResourceGraph::new();
        NetworkComposer::new(zones).compose(&mut graph).unwrap();
        let template = graph.render();

        assert_eq!(template.resource_count_of("AWS::EC2::Subnet"), 2 * zones);
        let public = template
            .find_resources("AWS::EC2::Subnet")
            .iter()
            .filter(|(_, p)| p["MapPublicIpOnLaunch"] == json!(true))
            .count();
        assert_eq!(public, zones);
        assert_eq!(template.resource_count_of("AWS::EC2::NatGateway"), 1);
    }
}

#[test]
fn hosted_zone_name_shapes_the_dns_record() {
    // The zone name is a live input: it lands in the rendered record
    // and a domain outside the zone never composes.
    let template = MoodleStack::synth(&config()).unwrap();
    assert!(template.has_resource_properties(
        "AWS::Route53::RecordSet",
        &json!({ "HostedZoneName": "example.org" })
    ));

    let mut mismatched = config();
    mismatched.hosted_zone_name = "other.net".to_string();
    assert!(matches!(
        MoodleStack::compose(&mismatched).unwrap_err(),
        ComposeError::InvalidInput { field: "domain_name", .. }
    ));
}

#[test]
fn database_configuration_is_pinned() {
    let template = MoodleStack::synth(&config()).unwrap();
    assert!(template.has_resource_properties(
        "AWS::RDS::DBInstance",
        &json!({
            "Engine": "mysql",
            "EngineVersion": "8.0.31",
            "DBInstanceClass": "db.t4g.micro",
            "AllocatedStorage": "5",
            "MaxAllocatedStorage": 20,
        })
    ));
    assert!(template.has_resource_properties(
        "AWS::SecretsManager::Secret",
        &json!({ "GenerateSecretString": { "GenerateStringKey": "password" } })
    ));
}

#[test]
fn firewall_rules_are_ordered_and_observing() {
    let template = MoodleStack::synth(&config()).unwrap();
    let (_, props) = template.find_resources("AWS::WAFv2::WebACL")[0];
    let rules = props["Rules"].as_array().unwrap();

    assert_eq!(rules.len(), 5);
    assert_eq!(props["DefaultAction"], json!({ "Allow": {} }));
    for (priority, rule) in rules.iter().enumerate() {
        assert_eq!(rule["Priority"], json!(priority));
        assert_eq!(rule["OverrideAction"], json!({ "Count": {} }));
        assert_eq!(
            rule["Statement"]["ManagedRuleGroupStatement"]["VendorName"],
            json!("AWS")
        );
    }
}

/// Every security-group rule between two groups must have a mirror
/// rule in the opposite direction. A one-directional pair is the
/// silent-timeout failure mode the wiring module exists to prevent.
#[test]
fn no_one_directional_security_rule_exists() {
    let template = MoodleStack::synth(&config()).unwrap();
    let rules = template.find_resources("AWS::EC2::SecurityGroupIngress");
    assert!(!rules.is_empty());

    let directed: HashSet<(String, String, i64)> = rules
        .iter()
        .map(|(_, p)| {
            (
                p["SourceSecurityGroupId"].as_str().unwrap().to_string(),
                p["GroupId"].as_str().unwrap().to_string(),
                p["FromPort"].as_i64().unwrap(),
            )
        })
        .collect();

    for (from, to, port) in &directed {
        assert!(
            directed.contains(&(to.clone(), from.clone(), *port)),
            "rule {} -> {} on {} has no mirror",
            from,
            to,
            port
        );
    }
}

#[test]
fn compute_database_and_filesystem_pairs_are_wired() {
    let template = MoodleStack::synth(&config()).unwrap();
    for (group, source, port) in [
        ("${DbSecurityGroup.GroupId}", "${ServiceSecurityGroup.GroupId}", 3306),
        ("${ServiceSecurityGroup.GroupId}", "${DbSecurityGroup.GroupId}", 3306),
        ("${EfsSecurityGroup.GroupId}", "${ServiceSecurityGroup.GroupId}", 2049),
        ("${ServiceSecurityGroup.GroupId}", "${EfsSecurityGroup.GroupId}", 2049),
    ] {
        assert!(
            template.has_resource_properties(
                "AWS::EC2::SecurityGroupIngress",
                &json!({ "GroupId": group, "SourceSecurityGroupId": source, "FromPort": port })
            ),
            "missing rule into {} from {} on {}",
            group,
            source,
            port
        );
    }
}

#[test]
fn attribute_consumers_declare_dependency_edges() {
    let template = MoodleStack::synth(&config()).unwrap();
    // The task definition consumes the database endpoint and both
    // secrets, so all of them must be ordering dependencies.
    let deps = template.dependencies_of("MoodleTaskDefinition");
    assert!(deps.contains(&"MoodleDb"));
    assert!(deps.contains(&"DbSecret"));
    assert!(deps.contains(&"MoodleAdminSecret"));
    assert!(deps.contains(&"MoodleFileSystem"));
    assert!(deps.contains(&"MoodleAccessPoint"));
}

#[test]
fn teardown_policy_flows_to_stateful_resources() {
    let mut retained = config();
    retained.teardown = TeardownPolicy::Retain;
    let template = MoodleStack::synth(&retained).unwrap();
    assert!(template
        .has_resource_properties("AWS::RDS::DBInstance", &json!({ "DeletionPolicy": "Retain" })));
    assert!(template
        .has_resource_properties("AWS::EFS::FileSystem", &json!({ "DeletionPolicy": "Retain" })));
}

#[test]
fn rendered_template_is_valid_json() {
    let template = MoodleStack::synth(&config()).unwrap();
    let text = template.to_json_pretty().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(parsed["Resources"].is_object());
    assert!(parsed["Outputs"]["MOODLE-USERNAME"].is_object());
}
