//! Rendered template and structural assertions.
//!
//! The template is the deployable JSON form of a [`ResourceGraph`].
//! The query helpers exist so tests can pin the composer's output
//! shape: count resources of a type, match property subsets, read
//! outputs.

use serde_json::{json, Map, Value};

use crate::error::GraphResult;
use crate::graph::ResourceGraph;

/// Deployable JSON rendering of a resource graph.
#[derive(Debug, Clone)]
pub struct Template {
    root: Value,
}

impl Template {
    pub(crate) fn from_graph(graph: &ResourceGraph) -> Self {
        let mut resources = Map::new();
        for (id, resource) in graph.iter() {
            let mut entry = Map::new();
            entry.insert("Type".into(), json!(resource.resource_type()));
            entry.insert(
                "Properties".into(),
                Value::Object(resource.properties().clone()),
            );
            if !resource.dependencies().is_empty() {
                let deps: Vec<Value> = resource
                    .dependencies()
                    .iter()
                    .map(|d| json!(d.as_str()))
                    .collect();
                entry.insert("DependsOn".into(), Value::Array(deps));
            }
            resources.insert(id.to_string(), Value::Object(entry));
        }

        let mut outputs = Map::new();
        for output in graph.outputs() {
            outputs.insert(output.key.clone(), json!({ "Value": output.value }));
        }

        Self {
            root: json!({ "Resources": resources, "Outputs": outputs }),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn to_json_pretty(&self) -> GraphResult<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    fn resources(&self) -> &Map<String, Value> {
        self.root["Resources"].as_object().expect("rendered root")
    }

    /// Number of resources of the given provider type.
    pub fn resource_count_of(&self, resource_type: &str) -> usize {
        self.resources()
            .values()
            .filter(|r| r["Type"] == resource_type)
            .count()
    }

    /// All `(logical_id, properties)` pairs for a provider type.
    pub fn find_resources(&self, resource_type: &str) -> Vec<(&str, &Value)> {
        self.resources()
            .iter()
            .filter(|(_, r)| r["Type"] == resource_type)
            .map(|(id, r)| (id.as_str(), &r["Properties"]))
            .collect()
    }

    /// Whether at least one resource of the type carries the expected
    /// properties. Objects match by subset, everything else by
    /// equality.
    pub fn has_resource_properties(&self, resource_type: &str, expected: &Value) -> bool {
        self.find_resources(resource_type)
            .iter()
            .any(|(_, props)| matches_subset(props, expected))
    }

    /// Value of a stack output, if present.
    pub fn output(&self, key: &str) -> Option<&Value> {
        self.root["Outputs"].get(key).map(|o| &o["Value"])
    }

    /// Declared dependency edges of one resource.
    pub fn dependencies_of(&self, logical_id: &str) -> Vec<&str> {
        self.resources()
            .get(logical_id)
            .and_then(|r| r.get("DependsOn"))
            .and_then(Value::as_array)
            .map(|deps| deps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

fn matches_subset(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected
            .iter()
            .all(|(k, v)| actual.get(k).is_some_and(|a| matches_subset(a, v))),
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual
                    .iter()
                    .zip(expected.iter())
                    .all(|(a, e)| matches_subset(a, e))
        }
        (actual, expected) => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LogicalId, Resource, ResourceGraph};

    fn sample_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        let vpc = graph
            .add_resource(
                LogicalId::new("Vpc").unwrap(),
                Resource::new("AWS::EC2::VPC").prop("CidrBlock", json!("10.0.0.0/16")),
            )
            .unwrap();
        graph
            .add_resource(
                LogicalId::new("PublicSubnet1").unwrap(),
                Resource::new("AWS::EC2::Subnet")
                    .prop_attr("VpcId", &vpc.attr("VpcId"))
                    .prop("MapPublicIpOnLaunch", json!(true)),
            )
            .unwrap();
        graph.add_output("ADMIN", json!("moodleadmin")).unwrap();
        graph
    }

    #[test]
    fn test_resource_count_of() {
        let template = sample_graph().render();
        assert_eq!(template.resource_count_of("AWS::EC2::VPC"), 1);
        assert_eq!(template.resource_count_of("AWS::EC2::Subnet"), 1);
        assert_eq!(template.resource_count_of("AWS::RDS::DBInstance"), 0);
    }

    #[test]
    fn test_has_resource_properties_subset_match() {
        let template = sample_graph().render();
        assert!(template.has_resource_properties(
            "AWS::EC2::Subnet",
            &json!({ "MapPublicIpOnLaunch": true })
        ));
        assert!(!template.has_resource_properties(
            "AWS::EC2::Subnet",
            &json!({ "MapPublicIpOnLaunch": false })
        ));
    }

    #[test]
    fn test_attr_token_survives_rendering() {
        let template = sample_graph().render();
        let subnets = template.find_resources("AWS::EC2::Subnet");
        assert_eq!(subnets[0].1["VpcId"], json!("${Vpc.VpcId}"));
        assert_eq!(template.dependencies_of("PublicSubnet1"), vec!["Vpc"]);
    }

    #[test]
    fn test_outputs_rendered() {
        let template = sample_graph().render();
        assert_eq!(template.output("ADMIN"), Some(&json!("moodleadmin")));
        assert_eq!(template.output("MISSING"), None);
    }
}
