//! Storage provisioning: managed database and shared filesystem.
//!
//! The database password is generated into the secrets store, never
//! held in the composed model; consumers get a [`SecretRef`]. The
//! filesystem carries a cold-storage lifecycle and one access point
//! whose POSIX identity must match the container runtime user; a
//! mismatch surfaces as mount-permission crash loops at runtime, not
//! as a composition error.

use serde_json::json;
use tracing::info;

use lms_graph::{Attr, LogicalId, Resource, ResourceGraph, SecretRef};

use crate::config::TeardownPolicy;
use crate::error::ComposeResult;
use crate::network::Network;

/// Characters excluded from generated passwords: anything that breaks
/// connection strings or shell quoting downstream.
pub const PASSWORD_EXCLUDE_CHARACTERS: &str =
    r#"(" %+~`#$&*()|[]}{:;<>?!'/^-,@_=\"#;

/// Handles to the composed database.
#[derive(Debug, Clone)]
pub struct Database {
    pub instance: LogicalId,
    pub security_group: LogicalId,
    pub secret: SecretRef,
    pub endpoint_address: Attr,
    pub endpoint_port: Attr,
    pub name: String,
    pub username: String,
    /// MySQL default; wiring needs it for the security rules.
    pub port: u16,
}

/// Handles to the composed filesystem.
#[derive(Debug, Clone)]
pub struct Filesystem {
    pub filesystem: LogicalId,
    pub access_point: LogicalId,
    pub security_group: LogicalId,
    /// NFS default; wiring needs it for the security rules.
    pub port: u16,
}

/// Composes the managed MySQL instance and its generated credentials.
#[derive(Debug, Clone)]
pub struct DatabaseComposer {
    engine_version: String,
    instance_class: String,
    allocated_storage_gib: u32,
    max_allocated_storage_gib: u32,
    database_name: String,
    username: String,
    teardown: TeardownPolicy,
}

impl DatabaseComposer {
    pub fn new(teardown: TeardownPolicy) -> Self {
        Self {
            engine_version: "8.0.31".to_string(),
            instance_class: "db.t4g.micro".to_string(),
            allocated_storage_gib: 5,
            max_allocated_storage_gib: 20,
            database_name: "moodledb".to_string(),
            username: "dbadmin".to_string(),
            teardown,
        }
    }

    pub fn with_instance_class(mut self, class: impl Into<String>) -> Self {
        self.instance_class = class.into();
        self
    }

    pub fn with_storage(mut self, initial_gib: u32, max_gib: u32) -> Self {
        self.allocated_storage_gib = initial_gib;
        self.max_allocated_storage_gib = max_gib;
        self
    }

    pub fn compose(&self, graph: &mut ResourceGraph, network: &Network) -> ComposeResult<Database> {
        let secret_id = graph.add_resource(
            LogicalId::new("DbSecret")?,
            Resource::new("AWS::SecretsManager::Secret").prop(
                "GenerateSecretString",
                json!({
                    "SecretStringTemplate": format!("{{\"username\":\"{}\"}}", self.username),
                    "GenerateStringKey": "password",
                    "ExcludeCharacters": PASSWORD_EXCLUDE_CHARACTERS,
                }),
            ),
        )?;
        let secret = SecretRef::new(secret_id).field("password");

        let security_group = graph.add_resource(
            LogicalId::new("DbSecurityGroup")?,
            Resource::new("AWS::EC2::SecurityGroup")
                .prop("GroupDescription", json!("Database security group"))
                .prop_attr("VpcId", &network.vpc.attr("VpcId")),
        )?;

        let subnet_group = graph.add_resource(
            LogicalId::new("DbSubnetGroup")?,
            Resource::new("AWS::RDS::DBSubnetGroup")
                .prop("DBSubnetGroupDescription", json!("Private database subnets"))
                .prop_with_refs(
                    "SubnetIds",
                    json!(network.subnet_refs(&network.private_subnets)),
                    &network
                        .private_subnets
                        .iter()
                        .map(|s| s.attr("SubnetId"))
                        .collect::<Vec<_>>(),
                ),
        )?;

        let instance = graph.add_resource(
            LogicalId::new("MoodleDb")?,
            Resource::new("AWS::RDS::DBInstance")
                .prop("Engine", json!("mysql"))
                .prop("EngineVersion", json!(self.engine_version))
                .prop("DBInstanceClass", json!(self.instance_class))
                .prop("AllocatedStorage", json!(self.allocated_storage_gib.to_string()))
                .prop("MaxAllocatedStorage", json!(self.max_allocated_storage_gib))
                .prop("DBName", json!(self.database_name))
                .prop("MasterUsername", json!(self.username))
                .prop_with_refs(
                    "MasterUserPassword",
                    json!(secret.value_token()),
                    &[secret.arn()],
                )
                .prop_attr("DBSubnetGroupName", &subnet_group.attr("DBSubnetGroupName"))
                .prop_with_refs(
                    "VPCSecurityGroups",
                    json!([security_group.attr("GroupId").token()]),
                    &[security_group.attr("GroupId")],
                )
                .prop("DeletionPolicy", json!(self.teardown.as_str())),
        )?;

        info!(
            class = %self.instance_class,
            storage = self.allocated_storage_gib,
            "composed database"
        );
        Ok(Database {
            endpoint_address: instance.attr("EndpointAddress"),
            endpoint_port: instance.attr("EndpointPort"),
            instance,
            security_group,
            secret,
            name: self.database_name.clone(),
            username: self.username.clone(),
            port: 3306,
        })
    }
}

/// Composes the shared elastic filesystem and its access point.
#[derive(Debug, Clone)]
pub struct FilesystemComposer {
    teardown: TeardownPolicy,
    /// POSIX identity the access point imposes. Must match the
    /// container's runtime user or mounts fail at task start.
    owner_uid: String,
    owner_gid: String,
    permissions: String,
    root_path: String,
}

impl FilesystemComposer {
    pub fn new(teardown: TeardownPolicy) -> Self {
        Self {
            teardown,
            owner_uid: "0".to_string(),
            owner_gid: "0".to_string(),
            permissions: "755".to_string(),
            root_path: "/".to_string(),
        }
    }

    pub fn compose(
        &self,
        graph: &mut ResourceGraph,
        network: &Network,
    ) -> ComposeResult<Filesystem> {
        let security_group = graph.add_resource(
            LogicalId::new("EfsSecurityGroup")?,
            Resource::new("AWS::EC2::SecurityGroup")
                .prop("GroupDescription", json!("Filesystem security group"))
                .prop_attr("VpcId", &network.vpc.attr("VpcId")),
        )?;

        let filesystem = graph.add_resource(
            LogicalId::new("MoodleFileSystem")?,
            Resource::new("AWS::EFS::FileSystem")
                .prop("PerformanceMode", json!("generalPurpose"))
                .prop(
                    "LifecyclePolicies",
                    json!([
                        { "TransitionToIA": "AFTER_14_DAYS" },
                        { "TransitionToPrimaryStorageClass": "AFTER_1_ACCESS" }
                    ]),
                )
                .prop("DeletionPolicy", json!(self.teardown.as_str())),
        )?;

        // One mount target per private subnet, behind the filesystem's
        // security group.
        for (index, subnet) in network.private_subnets.iter().enumerate() {
            graph.add_resource(
                LogicalId::new(format!("EfsMountTarget{}", index + 1))?,
                Resource::new("AWS::EFS::MountTarget")
                    .prop_attr("FileSystemId", &filesystem.attr("FileSystemId"))
                    .prop_attr("SubnetId", &subnet.attr("SubnetId"))
                    .prop_with_refs(
                        "SecurityGroups",
                        json!([security_group.attr("GroupId").token()]),
                        &[security_group.attr("GroupId")],
                    ),
            )?;
        }

        let access_point = graph.add_resource(
            LogicalId::new("MoodleAccessPoint")?,
            Resource::new("AWS::EFS::AccessPoint")
                .prop_attr("FileSystemId", &filesystem.attr("FileSystemId"))
                .prop(
                    "RootDirectory",
                    json!({
                        "Path": self.root_path,
                        "CreationInfo": {
                            "OwnerUid": self.owner_uid,
                            "OwnerGid": self.owner_gid,
                            "Permissions": self.permissions,
                        }
                    }),
                )
                .prop(
                    "PosixUser",
                    json!({ "Uid": self.owner_uid, "Gid": self.owner_gid }),
                ),
        )?;

        info!("composed filesystem with access point");
        Ok(Filesystem {
            filesystem,
            access_point,
            security_group,
            port: 2049,
        })
    }
}
