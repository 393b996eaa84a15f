//! # lms_graph
//!
//! Typed cloud resource graph for lmstack.
//!
//! A stack is an explicit DAG of resource descriptors keyed by unique
//! logical ids. Cross-resource values (endpoints, ARNs, ports) are
//! opaque [`Attr`] handles that render as deploy-time tokens and record
//! dependency edges when consumed; generated secrets travel as
//! [`SecretRef`] capability handles that never expose plaintext at
//! composition time.
//!
//! ## Example
//!
//! ```rust
//! use lms_graph::{LogicalId, Resource, ResourceGraph};
//!
//! let mut graph = ResourceGraph::new();
//! let vpc = graph
//!     .add_resource(LogicalId::new("Vpc")?, Resource::new("AWS::EC2::VPC"))
//!     .unwrap();
//! graph.add_resource(
//!     LogicalId::new("Db")?,
//!     Resource::new("AWS::RDS::DBInstance").prop_attr("VpcId", &vpc.attr("VpcId")),
//! )?;
//!
//! let template = graph.render();
//! assert_eq!(template.resource_count_of("AWS::EC2::VPC"), 1);
//! # Ok::<(), lms_graph::GraphError>(())
//! ```

pub mod error;
pub mod graph;
pub mod reference;
pub mod template;

pub use error::{GraphError, GraphResult};
pub use graph::{LogicalId, Resource, ResourceGraph, StackOutput};
pub use reference::{Attr, SecretRef};
pub use template::Template;
