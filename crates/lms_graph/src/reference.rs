//! Deploy-time value handles.
//!
//! Resources cross-reference each other through values that only exist
//! once the provider has created the upstream resource: endpoint
//! addresses, ARNs, security-group ids. At composition time those are
//! represented as opaque [`Attr`] handles that render as placeholder
//! tokens; embedding a handle into a downstream resource records an
//! explicit dependency edge, so the provider orders creation correctly.

use serde::{Deserialize, Serialize};

use crate::graph::LogicalId;

/// An opaque reference to a resource attribute resolved at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    logical_id: LogicalId,
    name: String,
}

impl Attr {
    pub fn new(logical_id: LogicalId, name: impl Into<String>) -> Self {
        Self {
            logical_id,
            name: name.into(),
        }
    }

    /// The resource this attribute belongs to.
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder token substituted by the provider at deploy time.
    pub fn token(&self) -> String {
        format!("${{{}.{}}}", self.logical_id, self.name)
    }
}

impl std::fmt::Display for Attr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// A capability handle to a generated secret.
///
/// Carries the secret's location, never its value. Plaintext can only
/// be obtained by an explicit call against the live secrets store at
/// consumption time (task launch, operator retrieval), not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    logical_id: LogicalId,
    /// JSON field within the secret, when the secret holds a document
    /// rather than a single value.
    field: Option<String>,
}

impl SecretRef {
    pub fn new(logical_id: LogicalId) -> Self {
        Self {
            logical_id,
            field: None,
        }
    }

    /// Narrow the reference to one field of a JSON secret document.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Deploy-time reference to the secret's ARN.
    pub fn arn(&self) -> Attr {
        Attr::new(self.logical_id.clone(), "Arn")
    }

    /// Token the orchestrator resolves when injecting the secret into a
    /// task environment, e.g. `${DbSecret.Arn}:password`.
    pub fn value_token(&self) -> String {
        match &self.field {
            Some(field) => format!("{}:{}", self.arn().token(), field),
            None => self.arn().token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_token_format() {
        let id = LogicalId::new("MoodleDb").unwrap();
        let attr = Attr::new(id, "EndpointAddress");
        assert_eq!(attr.token(), "${MoodleDb.EndpointAddress}");
    }

    #[test]
    fn test_secret_ref_value_token_with_field() {
        let id = LogicalId::new("DbSecret").unwrap();
        let secret = SecretRef::new(id).field("password");
        assert_eq!(secret.value_token(), "${DbSecret.Arn}:password");
    }

    #[test]
    fn test_secret_ref_value_token_whole_secret() {
        let id = LogicalId::new("AdminSecret").unwrap();
        let secret = SecretRef::new(id);
        assert_eq!(secret.value_token(), "${AdminSecret.Arn}");
    }
}
