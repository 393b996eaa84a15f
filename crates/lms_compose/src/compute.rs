//! Container service composition.
//!
//! One Fargate task template wrapped in a horizontally replicable
//! service: image, port, plain environment, secret-bound environment
//! entries resolved at task launch, an EFS volume bound to the access
//! point, and the rollout/availability knobs. The health-check grace
//! period is long because Moodle's first boot runs installation
//! routines for several minutes; the retry loop around failed tasks
//! belongs to the orchestrator, not to this composer.

use serde_json::json;
use tracing::info;

use lms_graph::{Attr, LogicalId, Resource, ResourceGraph, SecretRef};

use crate::error::ComposeResult;
use crate::network::Network;
use crate::storage::{Database, Filesystem};

const VOLUME_NAME: &str = "moodleVolume";
const CONTAINER_NAME: &str = "MoodleContainer";

/// Handles to the composed service.
#[derive(Debug, Clone)]
pub struct Service {
    pub cluster: LogicalId,
    pub task_definition: LogicalId,
    pub service: LogicalId,
    pub security_group: LogicalId,
    pub container_name: String,
    pub container_port: u16,
    /// Secret holding the generated Moodle admin password.
    pub admin_secret: SecretRef,
    pub admin_username: String,
}

/// Composes the cluster, task definition and service.
#[derive(Debug, Clone)]
pub struct ServiceComposer {
    image: String,
    container_port: u16,
    cpu: u32,
    memory_limit_mib: u32,
    desired_count: u32,
    min_healthy_percent: u32,
    health_check_grace_secs: u64,
    admin_username: String,
    site_name: String,
}

impl ServiceComposer {
    pub fn new(site_name: impl Into<String>) -> Self {
        Self {
            image: "bitnami/moodle".to_string(),
            container_port: 8080,
            cpu: 256,
            memory_limit_mib: 1024,
            desired_count: 1,
            min_healthy_percent: 50,
            health_check_grace_secs: 900,
            admin_username: "moodleadmin".to_string(),
            site_name: site_name.into(),
        }
    }

    pub fn with_cpu(mut self, cpu: u32) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn with_memory_limit_mib(mut self, memory: u32) -> Self {
        self.memory_limit_mib = memory;
        self
    }

    pub fn with_desired_count(mut self, count: u32) -> Self {
        self.desired_count = count;
        self
    }

    pub fn with_min_healthy_percent(mut self, percent: u32) -> Self {
        self.min_healthy_percent = percent;
        self
    }

    pub fn with_health_check_grace_secs(mut self, secs: u64) -> Self {
        self.health_check_grace_secs = secs;
        self
    }

    pub fn compose(
        &self,
        graph: &mut ResourceGraph,
        network: &Network,
        database: &Database,
        filesystem: &Filesystem,
        target_group: &Attr,
    ) -> ComposeResult<Service> {
        let cluster = graph.add_resource(
            LogicalId::new("MoodleCluster")?,
            Resource::new("AWS::ECS::Cluster"),
        )?;

        let admin_secret_id = graph.add_resource(
            LogicalId::new("MoodleAdminSecret")?,
            Resource::new("AWS::SecretsManager::Secret").prop(
                "GenerateSecretString",
                json!({
                    "ExcludeCharacters": crate::storage::PASSWORD_EXCLUDE_CHARACTERS,
                }),
            ),
        )?;
        let admin_secret = SecretRef::new(admin_secret_id);

        let security_group = graph.add_resource(
            LogicalId::new("ServiceSecurityGroup")?,
            Resource::new("AWS::EC2::SecurityGroup")
                .prop("GroupDescription", json!("Moodle service security group"))
                .prop_attr("VpcId", &network.vpc.attr("VpcId")),
        )?;

        // The task role only needs to read and write the shared
        // filesystem; everything else arrives via environment.
        let task_role = graph.add_resource(
            LogicalId::new("MoodleTaskRole")?,
            Resource::new("AWS::IAM::Role")
                .prop(
                    "AssumeRolePolicyDocument",
                    json!({
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "ecs-tasks.amazonaws.com" },
                            "Action": "sts:AssumeRole"
                        }]
                    }),
                )
                .prop_with_refs(
                    "Policies",
                    json!([{
                        "PolicyName": "filesystem-access",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Action": [
                                    "elasticfilesystem:ClientWrite",
                                    "elasticfilesystem:ClientRead"
                                ],
                                "Resource": [filesystem.filesystem.attr("Arn").token()]
                            }]
                        }
                    }]),
                    &[filesystem.filesystem.attr("Arn")],
                ),
        )?;

        let environment = json!([
            { "Name": "MOODLE_DATABASE_TYPE", "Value": "mysqli" },
            { "Name": "MOODLE_DATABASE_HOST", "Value": database.endpoint_address.token() },
            { "Name": "MOODLE_DATABASE_PORT_NUMBER", "Value": database.endpoint_port.token() },
            { "Name": "MOODLE_DATABASE_NAME", "Value": database.name },
            { "Name": "MOODLE_DATABASE_USER", "Value": database.username },
            { "Name": "MOODLE_USERNAME", "Value": self.admin_username },
            { "Name": "MOODLE_SITE_NAME", "Value": self.site_name },
            { "Name": "MOODLE_SKIP_BOOTSTRAP", "Value": "no" },
            { "Name": "MOODLE_SKIP_INSTALL", "Value": "no" },
            { "Name": "BITNAMI_DEBUG", "Value": "true" },
            { "Name": "PHP_UPLOAD_MAX_FILESIZE", "Value": "500M" }
        ]);

        // Secret-bound entries resolve from the secrets store at task
        // launch; plaintext never appears in the template.
        let secrets = json!([
            { "Name": "MOODLE_DATABASE_PASSWORD", "ValueFrom": database.secret.value_token() },
            { "Name": "MOODLE_PASSWORD", "ValueFrom": admin_secret.value_token() }
        ]);

        let task_definition = graph.add_resource(
            LogicalId::new("MoodleTaskDefinition")?,
            Resource::new("AWS::ECS::TaskDefinition")
                .prop("Cpu", json!(self.cpu.to_string()))
                .prop("Memory", json!(self.memory_limit_mib.to_string()))
                .prop("NetworkMode", json!("awsvpc"))
                .prop("RequiresCompatibilities", json!(["FARGATE"]))
                .prop_attr("TaskRoleArn", &task_role.attr("Arn"))
                .prop_with_refs(
                    "ContainerDefinitions",
                    json!([{
                        "Name": CONTAINER_NAME,
                        "Image": self.image,
                        "PortMappings": [{ "ContainerPort": self.container_port }],
                        "Environment": environment,
                        "Secrets": secrets,
                        "MountPoints": [{
                            "ContainerPath": "/bitnami",
                            "ReadOnly": false,
                            "SourceVolume": VOLUME_NAME
                        }]
                    }]),
                    &[
                        database.endpoint_address.clone(),
                        database.endpoint_port.clone(),
                        database.secret.arn(),
                        admin_secret.arn(),
                    ],
                )
                .prop_with_refs(
                    "Volumes",
                    json!([{
                        "Name": VOLUME_NAME,
                        "EFSVolumeConfiguration": {
                            "FilesystemId": filesystem.filesystem.attr("FileSystemId").token(),
                            "TransitEncryption": "ENABLED",
                            "AuthorizationConfig": {
                                "AccessPointId": filesystem.access_point.attr("AccessPointId").token(),
                                "IAM": "ENABLED"
                            }
                        }
                    }]),
                    &[
                        filesystem.filesystem.attr("FileSystemId"),
                        filesystem.access_point.attr("AccessPointId"),
                    ],
                ),
        )?;

        let service = graph.add_resource(
            LogicalId::new("MoodleService")?,
            Resource::new("AWS::ECS::Service")
                .prop_attr("Cluster", &cluster.attr("Arn"))
                .prop("LaunchType", json!("FARGATE"))
                // EFS volumes require platform 1.4.
                .prop("PlatformVersion", json!("1.4.0"))
                .prop_attr("TaskDefinition", &task_definition.attr("Arn"))
                .prop("DesiredCount", json!(self.desired_count))
                .prop(
                    "DeploymentConfiguration",
                    json!({ "MinimumHealthyPercent": self.min_healthy_percent }),
                )
                .prop(
                    "HealthCheckGracePeriodSeconds",
                    json!(self.health_check_grace_secs),
                )
                .prop_with_refs(
                    "NetworkConfiguration",
                    json!({
                        "AwsvpcConfiguration": {
                            "AssignPublicIp": "ENABLED",
                            "Subnets": network.subnet_refs(&network.public_subnets),
                            "SecurityGroups": [security_group.attr("GroupId").token()]
                        }
                    }),
                    &network
                        .public_subnets
                        .iter()
                        .map(|s| s.attr("SubnetId"))
                        .chain(std::iter::once(security_group.attr("GroupId")))
                        .collect::<Vec<_>>(),
                )
                .prop_with_refs(
                    "LoadBalancers",
                    json!([{
                        "ContainerName": CONTAINER_NAME,
                        "ContainerPort": self.container_port,
                        "TargetGroupArn": target_group.token()
                    }]),
                    &[target_group.clone()],
                ),
        )?;

        info!(
            cpu = self.cpu,
            memory = self.memory_limit_mib,
            desired = self.desired_count,
            "composed container service"
        );
        Ok(Service {
            cluster,
            task_definition,
            service,
            security_group,
            container_name: CONTAINER_NAME.to_string(),
            container_port: self.container_port,
            admin_secret,
            admin_username: self.admin_username.clone(),
        })
    }
}
