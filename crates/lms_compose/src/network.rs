//! Network composition.
//!
//! One VPC across a bounded number of availability zones, one public
//! and one private subnet per zone. Private subnets share a single NAT
//! egress path for image pulls and patches regardless of zone count;
//! fanning NAT out per zone is a cost decision left to the operator.

use serde_json::json;
use tracing::info;

use lms_graph::{LogicalId, Resource, ResourceGraph};

use crate::error::ComposeResult;

/// Handles to the composed network, consumed downstream.
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: LogicalId,
    pub public_subnets: Vec<LogicalId>,
    pub private_subnets: Vec<LogicalId>,
}

impl Network {
    /// Deploy-time subnet id references for the given visibility.
    pub fn subnet_refs(&self, subnets: &[LogicalId]) -> Vec<serde_json::Value> {
        subnets
            .iter()
            .map(|s| json!(s.attr("SubnetId").token()))
            .collect()
    }
}

/// Composes the VPC, subnets, gateways and route tables.
#[derive(Debug, Clone)]
pub struct NetworkComposer {
    max_azs: usize,
    cidr_block: String,
}

impl NetworkComposer {
    pub fn new(max_azs: usize) -> Self {
        Self {
            max_azs,
            cidr_block: "10.0.0.0/16".to_string(),
        }
    }

    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr_block = cidr.into();
        self
    }

    pub fn compose(&self, graph: &mut ResourceGraph) -> ComposeResult<Network> {
        let vpc = graph.add_resource(
            LogicalId::new("Vpc")?,
            Resource::new("AWS::EC2::VPC")
                .prop("CidrBlock", json!(self.cidr_block))
                .prop("EnableDnsHostnames", json!(true))
                .prop("EnableDnsSupport", json!(true)),
        )?;

        let igw = graph.add_resource(
            LogicalId::new("InternetGateway")?,
            Resource::new("AWS::EC2::InternetGateway"),
        )?;
        graph.add_resource(
            LogicalId::new("VpcGatewayAttachment")?,
            Resource::new("AWS::EC2::VPCGatewayAttachment")
                .prop_attr("VpcId", &vpc.attr("VpcId"))
                .prop_attr("InternetGatewayId", &igw.attr("InternetGatewayId")),
        )?;

        let mut public_subnets = Vec::with_capacity(self.max_azs);
        let mut private_subnets = Vec::with_capacity(self.max_azs);
        for zone in 0..self.max_azs {
            public_subnets.push(self.subnet(graph, &vpc, zone, true)?);
            private_subnets.push(self.subnet(graph, &vpc, zone, false)?);
        }

        // Single NAT egress path in the first public subnet; every
        // private route table points at it.
        let eip = graph.add_resource(
            LogicalId::new("NatEip")?,
            Resource::new("AWS::EC2::EIP").prop("Domain", json!("vpc")),
        )?;
        let nat = graph.add_resource(
            LogicalId::new("NatGateway")?,
            Resource::new("AWS::EC2::NatGateway")
                .prop_attr("AllocationId", &eip.attr("AllocationId"))
                .prop_attr("SubnetId", &public_subnets[0].attr("SubnetId")),
        )?;

        let public_rt = graph.add_resource(
            LogicalId::new("PublicRouteTable")?,
            Resource::new("AWS::EC2::RouteTable").prop_attr("VpcId", &vpc.attr("VpcId")),
        )?;
        graph.add_resource(
            LogicalId::new("PublicDefaultRoute")?,
            Resource::new("AWS::EC2::Route")
                .prop_attr("RouteTableId", &public_rt.attr("RouteTableId"))
                .prop("DestinationCidrBlock", json!("0.0.0.0/0"))
                .prop_attr("GatewayId", &igw.attr("InternetGatewayId")),
        )?;

        let private_rt = graph.add_resource(
            LogicalId::new("PrivateRouteTable")?,
            Resource::new("AWS::EC2::RouteTable").prop_attr("VpcId", &vpc.attr("VpcId")),
        )?;
        graph.add_resource(
            LogicalId::new("PrivateDefaultRoute")?,
            Resource::new("AWS::EC2::Route")
                .prop_attr("RouteTableId", &private_rt.attr("RouteTableId"))
                .prop("DestinationCidrBlock", json!("0.0.0.0/0"))
                .prop_attr("NatGatewayId", &nat.attr("NatGatewayId")),
        )?;

        for (index, subnet) in public_subnets.iter().chain(&private_subnets).enumerate() {
            let table = if index < self.max_azs {
                &public_rt
            } else {
                &private_rt
            };
            graph.add_resource(
                LogicalId::new(format!("{}RouteAssoc", subnet))?,
                Resource::new("AWS::EC2::SubnetRouteTableAssociation")
                    .prop_attr("SubnetId", &subnet.attr("SubnetId"))
                    .prop_attr("RouteTableId", &table.attr("RouteTableId")),
            )?;
        }

        info!(
            zones = self.max_azs,
            subnets = public_subnets.len() + private_subnets.len(),
            "composed network"
        );
        Ok(Network {
            vpc,
            public_subnets,
            private_subnets,
        })
    }

    fn subnet(
        &self,
        graph: &mut ResourceGraph,
        vpc: &LogicalId,
        zone: usize,
        public: bool,
    ) -> ComposeResult<LogicalId> {
        let visibility = if public { "Public" } else { "Private" };
        // Public subnets take the low /24 blocks, private the high ones.
        let octet = if public { zone } else { 128 + zone };
        let id = graph.add_resource(
            LogicalId::new(format!("{}Subnet{}", visibility, zone + 1))?,
            Resource::new("AWS::EC2::Subnet")
                .prop_attr("VpcId", &vpc.attr("VpcId"))
                .prop("CidrBlock", json!(format!("10.0.{}.0/24", octet)))
                // Zone names resolve at deploy time; a zone index past
                // what the region offers fails there, not here.
                .prop("AvailabilityZone", json!(format!("${{AvailabilityZones.{}}}", zone)))
                .prop("MapPublicIpOnLaunch", json!(public))
                .prop(
                    "Tags",
                    json!([
                        { "Key": "subnet-type", "Value": visibility },
                        { "Key": "zone-index", "Value": zone.to_string() }
                    ]),
                ),
        )?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_zones_yield_four_subnets() {
        let mut graph = ResourceGraph::new();
        NetworkComposer::new(2).compose(&mut graph).unwrap();
        let template = graph.render();
        assert_eq!(template.resource_count_of("AWS::EC2::VPC"), 1);
        assert_eq!(template.resource_count_of("AWS::EC2::Subnet"), 4);
    }

    #[test]
    fn test_subnets_split_evenly_for_any_zone_count() {
        for zones in 2..=4 {
            let mut graph = ResourceGraph::new();
            let network = NetworkComposer::new(zones).compose(&mut graph).unwrap();
            let template = graph.render();
            assert_eq!(template.resource_count_of("AWS::EC2::Subnet"), 2 * zones);
            assert_eq!(network.public_subnets.len(), zones);
            assert_eq!(network.private_subnets.len(), zones);
        }
    }

    #[test]
    fn test_single_nat_regardless_of_zone_count() {
        for zones in 2..=4 {
            let mut graph = ResourceGraph::new();
            NetworkComposer::new(zones).compose(&mut graph).unwrap();
            let template = graph.render();
            assert_eq!(template.resource_count_of("AWS::EC2::NatGateway"), 1);
        }
    }

    #[test]
    fn test_public_and_private_visibility() {
        let mut graph = ResourceGraph::new();
        NetworkComposer::new(2).compose(&mut graph).unwrap();
        let template = graph.render();
        assert!(template
            .has_resource_properties("AWS::EC2::Subnet", &json!({ "MapPublicIpOnLaunch": true })));
        assert!(template
            .has_resource_properties("AWS::EC2::Subnet", &json!({ "MapPublicIpOnLaunch": false })));
    }

    #[test]
    fn test_private_route_goes_through_nat() {
        let mut graph = ResourceGraph::new();
        NetworkComposer::new(2).compose(&mut graph).unwrap();
        let template = graph.render();
        assert!(template.has_resource_properties(
            "AWS::EC2::Route",
            &json!({ "NatGatewayId": "${NatGateway.NatGatewayId}" })
        ));
    }
}
