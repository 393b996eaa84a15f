//! The resource graph.
//!
//! A stack is declared as an explicit directed acyclic graph of typed
//! resource descriptors keyed by unique logical ids. Composition is
//! single-pass and synchronous: the whole graph is declared before
//! anything is provisioned, and every cross-resource value consumption
//! is recorded as a dependency edge rather than left to implicit
//! ordering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::reference::Attr;
use crate::template::Template;

/// Unique construct name within a stack.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Create a logical id. Ids must be non-empty and alphanumeric so
    /// they stay usable as template keys and attribute-token prefixes.
    pub fn new(id: impl Into<String>) -> GraphResult<Self> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GraphError::InvalidLogicalId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reference an attribute of the resource behind this id.
    pub fn attr(&self, name: impl Into<String>) -> Attr {
        Attr::new(self.clone(), name)
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single resource descriptor: provider type, properties, edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    resource_type: String,
    properties: serde_json::Map<String, Value>,
    depends_on: Vec<LogicalId>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties: serde_json::Map::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set a literal property.
    pub fn prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Set a property to a deploy-time attribute reference. Recording
    /// the edge here is what keeps ordering explicit: the provider may
    /// create unrelated resources in parallel, but a consumed attribute
    /// forces the upstream resource first.
    pub fn prop_attr(mut self, key: impl Into<String>, attr: &Attr) -> Self {
        self.properties
            .insert(key.into(), Value::String(attr.token()));
        self.record_edge(attr.logical_id().clone());
        self
    }

    /// Set a property from a JSON value that embeds attribute tokens,
    /// declaring the edges the value consumes.
    pub fn prop_with_refs(
        mut self,
        key: impl Into<String>,
        value: Value,
        refs: &[Attr],
    ) -> Self {
        self.properties.insert(key.into(), value);
        for attr in refs {
            self.record_edge(attr.logical_id().clone());
        }
        self
    }

    /// Declare an ordering edge with no property value attached.
    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        self.record_edge(id.clone());
        self
    }

    fn record_edge(&mut self, id: LogicalId) {
        if !self.depends_on.contains(&id) {
            self.depends_on.push(id);
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn properties(&self) -> &serde_json::Map<String, Value> {
        &self.properties
    }

    pub fn dependencies(&self) -> &[LogicalId] {
        &self.depends_on
    }
}

/// A named stack output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackOutput {
    pub key: String,
    pub value: Value,
}

/// The declared resource graph for one stack.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: BTreeMap<LogicalId, Resource>,
    // Insertion order, so rendering stays deterministic and mirrors
    // the declaration sequence.
    order: Vec<LogicalId>,
    outputs: Vec<StackOutput>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource under a unique logical id.
    ///
    /// Every edge the resource declares must point at an id already in
    /// the graph. Composition is sequential, so this holds naturally
    /// for well-formed stacks and makes cycles unrepresentable.
    pub fn add_resource(&mut self, id: LogicalId, resource: Resource) -> GraphResult<LogicalId> {
        if self.resources.contains_key(&id) {
            return Err(GraphError::DuplicateLogicalId(id.to_string()));
        }
        for dep in resource.dependencies() {
            if !self.resources.contains_key(dep) {
                return Err(GraphError::UnknownDependency {
                    resource: id.to_string(),
                    dependency: dep.to_string(),
                });
            }
        }
        debug!(id = %id, resource_type = resource.resource_type(), "declared resource");
        self.order.push(id.clone());
        self.resources.insert(id.clone(), resource);
        Ok(id)
    }

    /// Add a stack output. Keys are unique within the stack.
    pub fn add_output(&mut self, key: impl Into<String>, value: Value) -> GraphResult<()> {
        let key = key.into();
        if self.outputs.iter().any(|o| o.key == key) {
            return Err(GraphError::DuplicateOutput(key));
        }
        self.outputs.push(StackOutput { key, value });
        Ok(())
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&LogicalId, &Resource)> {
        self.order.iter().map(|id| (id, &self.resources[id]))
    }

    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Render the graph to its deployable template form.
    pub fn render(&self) -> Template {
        Template::from_graph(self)
    }
}
