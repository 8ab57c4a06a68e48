//! Virtual networks, subnets, public IPs, network interfaces, security groups,
//! load balancers and firewalls.

use serde_json::Value;

use crate::azure::models::{
    ArmResource, AzureFirewallProperties, LoadBalancerProperties, NetworkInterfaceProperties,
    NetworkSecurityGroupProperties, PublicIpAddressProperties, SecurityRuleProperties,
    SubnetProperties, VirtualNetworkProperties,
};
use crate::azure::resource_id::resource_group_name;
use crate::azure::AzureWebLinker;
use crate::graph::{Entity, PropertyBag, Relationship, RelationshipClass};
use crate::jobstate::JobState;
use crate::resolver::{find_or_build_resource_entity, relationship_to_resolution};

use super::resource_properties;

pub const VIRTUAL_NETWORK_ENTITY_TYPE: &str = "azure_vnet";
pub const VIRTUAL_NETWORK_ENTITY_CLASS: &[&str] = &["Network"];
pub const SUBNET_ENTITY_TYPE: &str = "azure_subnet";
pub const SUBNET_ENTITY_CLASS: &[&str] = &["Network"];
pub const PUBLIC_IP_ENTITY_TYPE: &str = "azure_public_ip";
pub const PUBLIC_IP_ENTITY_CLASS: &[&str] = &["IpAddress"];
pub const NETWORK_INTERFACE_ENTITY_TYPE: &str = "azure_nic";
pub const NETWORK_INTERFACE_ENTITY_CLASS: &[&str] = &["NetworkInterface"];
pub const SECURITY_GROUP_ENTITY_TYPE: &str = "azure_security_group";
pub const SECURITY_GROUP_ENTITY_CLASS: &[&str] = &["Firewall"];
pub const LOAD_BALANCER_ENTITY_TYPE: &str = "azure_lb";
pub const LOAD_BALANCER_ENTITY_CLASS: &[&str] = &["Gateway"];
pub const FIREWALL_ENTITY_TYPE: &str = "azure_firewall";
pub const FIREWALL_ENTITY_CLASS: &[&str] = &["Firewall"];

/// Address prefixes that stand for "anywhere".
pub const INTERNET_PREFIXES: &[&str] = &["*", "Internet", "0.0.0.0/0"];

fn cidr_display_name(name: Option<&str>, cidr: Option<&str>) -> Option<String> {
    let name = name?;
    Some(match cidr {
        Some(cidr) => format!("{} ({})", name, cidr),
        None => name.to_string(),
    })
}

pub fn create_virtual_network_entity(
    linker: &AzureWebLinker,
    vnet: &ArmResource<VirtualNetworkProperties>,
) -> Entity {
    let cidr = vnet
        .properties
        .address_space
        .as_ref()
        .and_then(|space| space.address_prefixes.first())
        .map(String::as_str);

    let properties = resource_properties(linker, vnet)
        .set_opt("CIDR", cidr)
        .set_opt("displayName", cidr_display_name(vnet.name.as_deref(), cidr))
        .set("internal", true)
        .set("public", false)
        .build();

    Entity::new(
        vnet.id.as_str(),
        VIRTUAL_NETWORK_ENTITY_TYPE,
        VIRTUAL_NETWORK_ENTITY_CLASS,
        properties,
    )
}

/// Subnets carry no tags or location of their own; both come from the enclosing vnet.
pub fn create_subnet_entity(
    linker: &AzureWebLinker,
    vnet: &ArmResource<VirtualNetworkProperties>,
    subnet: &ArmResource<SubnetProperties>,
) -> Entity {
    let cidr = subnet.properties.address_prefix.as_deref();

    let properties = PropertyBag::new()
        .set("id", subnet.id.as_str())
        .set_opt("name", subnet.name.as_deref())
        .set_opt("displayName", cidr_display_name(subnet.name.as_deref(), cidr))
        .set_opt("CIDR", cidr)
        .set_opt("environment", vnet.tag("environment"))
        .set_opt("region", vnet.location.as_deref())
        .set_opt("resourceGroup", resource_group_name(&subnet.id))
        .set("internal", true)
        .set("public", false)
        .set_opt("webLink", linker.portal_resource_url(&subnet.id))
        .build();

    Entity::new(subnet.id.as_str(), SUBNET_ENTITY_TYPE, SUBNET_ENTITY_CLASS, properties)
}

pub fn create_virtual_network_subnet_relationship(vnet: &Entity, subnet: &Entity) -> Relationship {
    Relationship::direct(RelationshipClass::Contains, vnet, subnet)
}

pub fn create_public_ip_entity(
    linker: &AzureWebLinker,
    ip: &ArmResource<PublicIpAddressProperties>,
) -> Entity {
    let address = ip.properties.ip_address.as_deref();

    let properties = resource_properties(linker, ip)
        .set("public", true)
        .set_opt("publicIp", address)
        .set_opt("publicIpAddress", address)
        .set_opt("resourceGuid", ip.properties.resource_guid.as_deref())
        .set_opt("sku", ip.sku.as_ref().and_then(|s| s.name.as_deref()))
        .set_opt(
            "allocationMethod",
            ip.properties.public_ip_allocation_method.as_deref(),
        )
        .build();

    Entity::new(ip.id.as_str(), PUBLIC_IP_ENTITY_TYPE, PUBLIC_IP_ENTITY_CLASS, properties)
}

/// Ids of the public IP resources referenced by an interface's IP configurations.
pub fn network_interface_public_ip_ids(nic: &ArmResource<NetworkInterfaceProperties>) -> Vec<&str> {
    nic.properties
        .ip_configurations
        .iter()
        .filter_map(|c| c.properties.public_ip_address.as_ref())
        .map(|ip| ip.id.as_str())
        .collect()
}

/// `public_ip_addresses` are the addresses of the public IPs the interface references.
pub fn create_network_interface_entity(
    linker: &AzureWebLinker,
    nic: &ArmResource<NetworkInterfaceProperties>,
    public_ip_addresses: &[String],
) -> Entity {
    let props = &nic.properties;
    let private_ips: Vec<Value> = props
        .ip_configurations
        .iter()
        .filter_map(|c| c.properties.private_ip_address.as_deref())
        .map(Value::from)
        .collect();
    let public_ips: Vec<Value> = public_ip_addresses.iter().map(|a| Value::from(a.as_str())).collect();

    let properties = resource_properties(linker, nic)
        .set("ipForwarding", props.enable_ip_forwarding.unwrap_or(false))
        .set_opt("macAddress", props.mac_address.as_deref())
        .set("privateIp", private_ips.clone())
        .set("privateIpAddress", private_ips)
        .set("publicIp", public_ips.clone())
        .set("publicIpAddress", public_ips)
        .set_opt("resourceGuid", props.resource_guid.as_deref())
        .set_opt(
            "securityGroupId",
            props.network_security_group.as_ref().map(|g| g.id.as_str()),
        )
        .set_opt(
            "virtualMachineId",
            props.virtual_machine.as_ref().map(|vm| vm.id.as_str()),
        )
        .build();

    Entity::new(
        nic.id.as_str(),
        NETWORK_INTERFACE_ENTITY_TYPE,
        NETWORK_INTERFACE_ENTITY_CLASS,
        properties,
    )
}

/// An inbound allow rule open to any source, port and protocol.
fn is_wide_open_rule(rule: &SecurityRuleProperties) -> bool {
    let any_source = rule
        .source_address_prefix
        .as_deref()
        .is_some_and(|p| INTERNET_PREFIXES.contains(&p));

    rule.access.as_deref() == Some("Allow")
        && rule.direction.as_deref() == Some("Inbound")
        && any_source
        && rule.destination_port_range.as_deref() == Some("*")
        && rule.protocol.as_deref() == Some("*")
}

pub fn create_network_security_group_entity(
    linker: &AzureWebLinker,
    nsg: &ArmResource<NetworkSecurityGroupProperties>,
) -> Entity {
    let is_wide_open = nsg
        .properties
        .security_rules
        .iter()
        .any(|rule| is_wide_open_rule(&rule.properties));

    let properties = resource_properties(linker, nsg)
        .set("category", vec!["network", "host"])
        .set("isWideOpen", is_wide_open)
        .set_opt("provisioningState", nsg.properties.provisioning_state.as_deref())
        .build();

    Entity::new(
        nsg.id.as_str(),
        SECURITY_GROUP_ENTITY_TYPE,
        SECURITY_GROUP_ENTITY_CLASS,
        properties,
    )
}

/// `public_ip_addresses` are the addresses of the public IPs the frontends reference.
pub fn create_load_balancer_entity(
    linker: &AzureWebLinker,
    lb: &ArmResource<LoadBalancerProperties>,
    public_ip_addresses: &[String],
) -> Entity {
    let private_ips: Vec<Value> = lb
        .properties
        .frontend_ip_configurations
        .iter()
        .filter_map(|c| c.properties.private_ip_address.as_deref())
        .map(Value::from)
        .collect();
    let public_ips: Vec<Value> = public_ip_addresses.iter().map(|a| Value::from(a.as_str())).collect();
    let is_public = !lb
        .properties
        .frontend_ip_configurations
        .iter()
        .all(|c| c.properties.public_ip_address.is_none());

    let properties = resource_properties(linker, lb)
        .set("category", vec!["network"])
        .set("function", vec!["load-balancing"])
        .set_opt("resourceGuid", lb.properties.resource_guid.as_deref())
        .set("publicIp", public_ips)
        .set("privateIp", private_ips)
        .set("public", is_public)
        .build();

    Entity::new(
        lb.id.as_str(),
        LOAD_BALANCER_ENTITY_TYPE,
        LOAD_BALANCER_ENTITY_CLASS,
        properties,
    )
}

/// Ids of the public IP resources referenced by a load balancer's frontends.
pub fn load_balancer_public_ip_ids(lb: &ArmResource<LoadBalancerProperties>) -> Vec<&str> {
    lb.properties
        .frontend_ip_configurations
        .iter()
        .filter_map(|c| c.properties.public_ip_address.as_ref())
        .map(|ip| ip.id.as_str())
        .collect()
}

pub fn create_azure_firewall_entity(
    linker: &AzureWebLinker,
    firewall: &ArmResource<AzureFirewallProperties>,
) -> Entity {
    let properties = resource_properties(linker, firewall)
        .set("category", vec!["network"])
        .set_opt("provisioningState", firewall.properties.provisioning_state.as_deref())
        .set_opt("threatIntelMode", firewall.properties.threat_intel_mode.as_deref())
        .build();

    Entity::new(
        firewall.id.as_str(),
        FIREWALL_ENTITY_TYPE,
        FIREWALL_ENTITY_CLASS,
        properties,
    )
}

/// `PROTECTS` edges from a security group to the subnets and interfaces it is attached to.
pub fn create_security_group_protects_relationships(
    state: &dyn JobState,
    nsg_entity: &Entity,
    nsg: &ArmResource<NetworkSecurityGroupProperties>,
) -> Vec<Relationship> {
    nsg.properties
        .subnets
        .iter()
        .chain(nsg.properties.network_interfaces.iter())
        .map(|attached| {
            let target = find_or_build_resource_entity(state, &attached.id, None);
            relationship_to_resolution(RelationshipClass::Protects, nsg_entity, &target)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SUB: &str = "/subscriptions/87f62f44-9dad-4284-a08f-f2fb3d8b528a/resourceGroups/j1dev/providers/Microsoft.Network";

    fn linker() -> AzureWebLinker {
        AzureWebLinker::new(Some("example.onmicrosoft.com".into()))
    }

    fn vnet(tags: Value) -> ArmResource<VirtualNetworkProperties> {
        serde_json::from_value(json!({
            "id": format!("{}/virtualNetworks/j1dev", SUB),
            "name": "j1dev",
            "type": "Microsoft.Network/virtualNetworks",
            "location": "eastus",
            "tags": tags,
            "properties": {
                "addressSpace": {"addressPrefixes": ["10.0.0.0/16"]},
                "subnets": [{
                    "id": format!("{}/virtualNetworks/j1dev/subnets/j1dev_priv_one", SUB),
                    "name": "j1dev_priv_one",
                    "properties": {"addressPrefix": "10.0.3.0/24"}
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_virtual_network_entity() {
        let entity = create_virtual_network_entity(&linker(), &vnet(json!({"environment": "j1dev"})));
        assert_eq!(entity.str_property("CIDR"), Some("10.0.0.0/16"));
        assert_eq!(entity.str_property("displayName"), Some("j1dev (10.0.0.0/16)"));
        assert_eq!(entity.str_property("environment"), Some("j1dev"));
        assert_eq!(entity.str_property("tag.environment"), Some("j1dev"));
        assert_eq!(entity.property("internal"), Some(&json!(true)));
        assert_eq!(entity.property("public"), Some(&json!(false)));
        assert_eq!(entity.str_property("resourceGroup"), Some("j1dev"));
    }

    #[test]
    fn test_subnet_inherits_vnet_environment() {
        let vnet = vnet(json!({"environment": "j1dev"}));
        let subnet = &vnet.properties.subnets[0];
        let entity = create_subnet_entity(&linker(), &vnet, subnet);

        assert_eq!(entity.class, vec!["Network"]);
        assert_eq!(entity.str_property("displayName"), Some("j1dev_priv_one (10.0.3.0/24)"));
        assert_eq!(entity.str_property("environment"), Some("j1dev"));
        assert_eq!(entity.str_property("region"), Some("eastus"));
        assert!(entity.property("tag.environment").is_none());

        let untagged = vnet_without_tags();
        let entity = create_subnet_entity(&linker(), &untagged, &untagged.properties.subnets[0]);
        assert!(entity.property("environment").is_none());
    }

    fn vnet_without_tags() -> ArmResource<VirtualNetworkProperties> {
        let mut v = vnet(Value::Null);
        v.tags = None;
        v
    }

    #[test]
    fn test_vnet_contains_subnet() {
        let v = vnet(json!({}));
        let vnet_entity = create_virtual_network_entity(&linker(), &v);
        let subnet_entity = create_subnet_entity(&linker(), &v, &v.properties.subnets[0]);
        let rel = create_virtual_network_subnet_relationship(&vnet_entity, &subnet_entity);

        assert_eq!(rel.relationship_type(), "azure_vnet_contains_subnet");
        assert_eq!(rel.key(), format!("{}|contains|{}", vnet_entity.key, subnet_entity.key));
    }

    #[test]
    fn test_public_ip_entity() {
        let ip: ArmResource<PublicIpAddressProperties> = serde_json::from_value(json!({
            "id": format!("{}/publicIPAddresses/j1dev", SUB),
            "name": "j1dev",
            "type": "Microsoft.Network/publicIPAddresses",
            "location": "eastus",
            "sku": {"name": "Basic"},
            "properties": {
                "resourceGuid": "a8e1e4f4-9c35-4d5a-bf34-2e5c2b1a1e2f",
                "publicIPAllocationMethod": "Dynamic"
            }
        }))
        .unwrap();

        let entity = create_public_ip_entity(&linker(), &ip);
        assert_eq!(entity.property("public"), Some(&json!(true)));
        assert_eq!(entity.str_property("sku"), Some("Basic"));
        assert_eq!(entity.str_property("type"), Some("Microsoft.Network/publicIPAddresses"));
        assert!(entity.property("publicIp").is_none());
    }

    #[test]
    fn test_network_interface_entity() {
        let nic: ArmResource<NetworkInterfaceProperties> = serde_json::from_value(json!({
            "id": format!("{}/networkInterfaces/j1dev", SUB),
            "name": "j1dev",
            "type": "Microsoft.Network/networkInterfaces",
            "properties": {
                "enableIPForwarding": false,
                "ipConfigurations": [{
                    "id": format!("{}/networkInterfaces/j1dev/ipConfigurations/cfg", SUB),
                    "properties": {
                        "privateIPAddress": "10.0.2.4",
                        "publicIPAddress": {"id": format!("{}/publicIPAddresses/j1dev", SUB)}
                    }
                }],
                "networkSecurityGroup": {"id": format!("{}/networkSecurityGroups/j1dev", SUB)}
            }
        }))
        .unwrap();

        assert_eq!(
            network_interface_public_ip_ids(&nic),
            vec![format!("{}/publicIPAddresses/j1dev", SUB)]
        );

        let entity = create_network_interface_entity(&linker(), &nic, &["52.188.119.30".to_string()]);
        assert_eq!(entity.property("ipForwarding"), Some(&json!(false)));
        assert_eq!(entity.property("privateIp"), Some(&json!(["10.0.2.4"])));
        assert_eq!(entity.property("publicIpAddress"), Some(&json!(["52.188.119.30"])));
        assert_eq!(
            entity.str_property("securityGroupId"),
            Some(format!("{}/networkSecurityGroups/j1dev", SUB).as_str())
        );
        assert!(entity.property("macAddress").is_none());
        assert!(entity.property("virtualMachineId").is_none());
    }

    #[test]
    fn test_security_group_wide_open() {
        let nsg = |source: &str| -> ArmResource<NetworkSecurityGroupProperties> {
            serde_json::from_value(json!({
                "id": format!("{}/networkSecurityGroups/j1dev", SUB),
                "name": "j1dev",
                "properties": {"securityRules": [{
                    "id": format!("{}/networkSecurityGroups/j1dev/securityRules/any", SUB),
                    "name": "any",
                    "properties": {
                        "access": "Allow",
                        "direction": "Inbound",
                        "protocol": "*",
                        "sourceAddressPrefix": source,
                        "destinationPortRange": "*"
                    }
                }]}
            }))
            .unwrap()
        };

        let open = create_network_security_group_entity(&linker(), &nsg("*"));
        assert_eq!(open.property("isWideOpen"), Some(&json!(true)));
        assert_eq!(open.property("category"), Some(&json!(["network", "host"])));

        let closed = create_network_security_group_entity(&linker(), &nsg("10.0.3.0/24"));
        assert_eq!(closed.property("isWideOpen"), Some(&json!(false)));
    }

    #[test]
    fn test_load_balancer_entity() {
        let lb: ArmResource<LoadBalancerProperties> = serde_json::from_value(json!({
            "id": format!("{}/loadBalancers/TestLoadBalancer", SUB),
            "name": "TestLoadBalancer",
            "type": "Microsoft.Network/loadBalancers",
            "properties": {
                "frontendIPConfigurations": [{
                    "id": format!("{}/loadBalancers/TestLoadBalancer/frontendIPConfigurations/PublicIPAddress", SUB),
                    "properties": {"publicIPAddress": {"id": format!("{}/publicIPAddresses/j1dev_lb_ip", SUB)}}
                }]
            }
        }))
        .unwrap();

        assert_eq!(load_balancer_public_ip_ids(&lb).len(), 1);
        let entity = create_load_balancer_entity(&linker(), &lb, &[]);
        assert_eq!(entity.property("public"), Some(&json!(true)));
        assert_eq!(entity.property("function"), Some(&json!(["load-balancing"])));
        assert_eq!(entity.property("privateIp"), Some(&json!([])));
    }

    #[test]
    fn test_firewall_entity() {
        let firewall: ArmResource<AzureFirewallProperties> = serde_json::from_value(json!({
            "id": format!("{}/azureFirewalls/j1dev_firewall", SUB),
            "name": "j1dev_firewall",
            "properties": {"provisioningState": "Succeeded", "threatIntelMode": "Alert"}
        }))
        .unwrap();

        let entity = create_azure_firewall_entity(&linker(), &firewall);
        assert_eq!(entity.class, vec!["Firewall"]);
        assert_eq!(entity.str_property("threatIntelMode"), Some("Alert"));
        assert_eq!(entity.property("category"), Some(&json!(["network"])));
    }

    #[test]
    fn test_security_group_protects_subnet_and_nic() {
        use crate::jobstate::MemoryJobState;

        let nsg: ArmResource<NetworkSecurityGroupProperties> = serde_json::from_value(json!({
            "id": format!("{}/networkSecurityGroups/j1dev", SUB),
            "name": "j1dev",
            "properties": {
                "subnets": [{"id": format!("{}/virtualNetworks/j1dev/subnets/j1dev_priv_one", SUB)}],
                "networkInterfaces": [{"id": format!("{}/networkInterfaces/j1dev", SUB)}]
            }
        }))
        .unwrap();
        let nsg_entity = create_network_security_group_entity(&linker(), &nsg);

        let mut state = MemoryJobState::new();
        let v = vnet(json!({}));
        state
            .add_entity(create_subnet_entity(&linker(), &v, &v.properties.subnets[0]))
            .unwrap();

        let rels = create_security_group_protects_relationships(&state, &nsg_entity, &nsg);
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[0].relationship_type(), "azure_security_group_protects_subnet");
        assert!(!rels[0].is_mapped());
        assert_eq!(rels[1].relationship_type(), "azure_security_group_protects_nic");
        assert!(rels[1].is_mapped());
    }
}
