//! ALLOWS / DENIES edges derived from network security group rules.
//!
//! Every rule yields one edge per destination port range and address prefix.
//! A prefix equal to a known subnet CIDR becomes a direct subnet edge; the
//! internet, other CIDRs and service tags become mapped edges resolved by the
//! ingestion backend.

use std::collections::HashSet;
use std::net::IpAddr;

use serde_json::Value;

use crate::azure::models::{ArmResource, NetworkSecurityGroupProperties, SecurityRuleProperties};
use crate::graph::{
    generate_relationship_type, security_rule_key, DirectRelationship, Entity, MappedRelationship,
    Properties, PropertyBag, Relationship, RelationshipClass, RelationshipDirection,
    RelationshipMapping,
};

use super::network::INTERNET_PREFIXES;

pub const SECURITY_GROUP_RULE_RELATIONSHIP_TYPE: &str = "azure_security_group_rule";

const INTERNET_KEY: &str = "global:internet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleDirection {
    Inbound,
    Outbound,
}

/// What the non-NSG side of a rule refers to.
#[derive(Debug, Clone, PartialEq)]
enum RuleTarget<'a> {
    Internet,
    Subnet(&'a Entity),
    Cidr(&'a str),
    Service { entity_type: String, tag: &'a str },
}

/// Port bounds of an ARM port range: `"22"`, `"80-443"` or `"*"`.
pub fn parse_port_range(range: &str) -> Option<(u16, u16)> {
    if range == "*" {
        return Some((0, 65535));
    }
    match range.split_once('-') {
        Some((from, to)) => Some((from.trim().parse().ok()?, to.trim().parse().ok()?)),
        None => {
            let port = range.trim().parse().ok()?;
            Some((port, port))
        }
    }
}

/// `VirtualNetwork` -> `azure_virtual_network`, `AzureLoadBalancer` -> `azure_load_balancer`.
pub fn service_tag_entity_type(tag: &str) -> String {
    let mut snake = String::with_capacity(tag.len() + 8);
    let mut previous: Option<char> = None;
    for c in tag.chars() {
        if !c.is_ascii_alphanumeric() {
            if !snake.ends_with('_') && !snake.is_empty() {
                snake.push('_');
            }
        } else {
            if c.is_ascii_uppercase()
                && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
            {
                snake.push('_');
            }
            snake.push(c.to_ascii_lowercase());
        }
        previous = Some(c);
    }
    let snake = snake.trim_end_matches('_');

    if snake.starts_with("azure_") || snake == "azure" {
        snake.to_string()
    } else {
        format!("azure_{}", snake)
    }
}

fn is_cidr(prefix: &str) -> bool {
    let (address, length) = match prefix.split_once('/') {
        Some((address, length)) => (address, Some(length)),
        None => (prefix, None),
    };
    address.parse::<IpAddr>().is_ok() && length.map_or(true, |l| l.parse::<u8>().is_ok())
}

fn classify<'a>(prefix: &'a str, subnets: &'a [&'a Entity]) -> Vec<RuleTarget<'a>> {
    if INTERNET_PREFIXES.contains(&prefix) {
        return vec![RuleTarget::Internet];
    }
    if !is_cidr(prefix) {
        return vec![RuleTarget::Service {
            entity_type: service_tag_entity_type(prefix),
            tag: prefix,
        }];
    }

    let matching: Vec<RuleTarget<'a>> = subnets
        .iter()
        .filter(|subnet| subnet.str_property("CIDR") == Some(prefix))
        .map(|subnet| RuleTarget::Subnet(*subnet))
        .collect();
    if matching.is_empty() {
        vec![RuleTarget::Cidr(prefix)]
    } else {
        matching
    }
}

/// Address prefixes on the remote side of the rule: source for inbound, destination for outbound.
fn remote_prefixes(rule: &SecurityRuleProperties, direction: RuleDirection) -> Vec<&str> {
    let (single, many) = match direction {
        RuleDirection::Inbound => (&rule.source_address_prefix, &rule.source_address_prefixes),
        RuleDirection::Outbound => (
            &rule.destination_address_prefix,
            &rule.destination_address_prefixes,
        ),
    };
    match single.as_deref() {
        Some(prefix) => vec![prefix],
        None => many.iter().map(String::as_str).collect(),
    }
}

fn port_ranges(rule: &SecurityRuleProperties) -> Vec<Option<&str>> {
    match rule.destination_port_range.as_deref() {
        Some(range) => vec![Some(range)],
        None if !rule.destination_port_ranges.is_empty() => rule
            .destination_port_ranges
            .iter()
            .map(|r| Some(r.as_str()))
            .collect(),
        None => vec![None],
    }
}

fn rule_properties(
    rule: &ArmResource<SecurityRuleProperties>,
    class: RelationshipClass,
    direction: RuleDirection,
    port_range: Option<&str>,
) -> Properties {
    let props = &rule.properties;
    let inbound = direction == RuleDirection::Inbound;
    let protocol = props.protocol.as_deref().map(str::to_lowercase);
    let ports = port_range.and_then(parse_port_range);

    PropertyBag::new()
        .set("displayName", class.as_str())
        .set_opt("access", props.access.as_deref())
        .set_opt("description", props.description.as_deref())
        .set_opt("destinationAddressPrefix", props.destination_address_prefix.as_deref())
        .set_opt("destinationPortRange", port_range)
        .set_opt("direction", props.direction.as_deref())
        .set_opt("etag", rule.etag.as_deref())
        .set("id", rule.id.as_str())
        .set_opt("name", rule.name.as_deref())
        .set_opt("priority", props.priority)
        .set_opt("ruleNumber", props.priority)
        .set_opt("provisioningState", props.provisioning_state.as_deref())
        .set_opt("sourceAddressPrefix", props.source_address_prefix.as_deref())
        .set_opt("sourcePortRange", props.source_port_range.as_deref())
        .set_opt("type", rule.resource_type.as_deref())
        .set("ingress", inbound)
        .set("inbound", inbound)
        .set("egress", !inbound)
        .set("outbound", !inbound)
        .set_opt("portRange", port_range)
        .set_opt("fromPort", ports.map(|(from, _)| from))
        .set_opt("toPort", ports.map(|(_, to)| to))
        .set_opt("ipProtocol", protocol.clone())
        .set_opt("protocol", protocol)
        .build()
}

fn internet_target() -> Properties {
    PropertyBag::new()
        .set("CIDR", "0.0.0.0/0")
        .set("CIDRv6", "::/0")
        .set("_class", vec!["Internet", "Network"])
        .set("_key", INTERNET_KEY)
        .set("_type", "internet")
        .set("displayName", "Internet")
        .set("public", true)
        .build()
}

/// Key discriminator, mapped target and filter keys for a non-subnet target.
fn mapped_target(target: &RuleTarget<'_>) -> Option<(String, Properties, Vec<Vec<String>>)> {
    let filter = |keys: &[&str]| vec![keys.iter().map(|k| k.to_string()).collect::<Vec<_>>()];
    match target {
        RuleTarget::Subnet(_) => None,
        RuleTarget::Internet => Some(("internet".to_string(), internet_target(), filter(&["_key"]))),
        RuleTarget::Cidr(cidr) => Some((
            format!("CIDR:{}", cidr),
            PropertyBag::new()
                .set("_class", "Network")
                .set("_type", "network")
                .set("CIDR", *cidr)
                .set("displayName", *cidr)
                .build(),
            filter(&["_type", "CIDR"]),
        )),
        RuleTarget::Service { entity_type, tag } => Some((
            format!("Service:{}:{}", entity_type, tag),
            PropertyBag::new()
                .set("_class", "Service")
                .set("_type", entity_type.as_str())
                .set("displayName", *tag)
                .build(),
            filter(&["_class", "_type", "displayName"]),
        )),
    }
}

fn rule_relationships(
    nsg_entity: &Entity,
    rule: &ArmResource<SecurityRuleProperties>,
    subnets: &[&Entity],
) -> Vec<Relationship> {
    let props = &rule.properties;
    let direction = match props.direction.as_deref() {
        Some("Inbound") => RuleDirection::Inbound,
        Some("Outbound") => RuleDirection::Outbound,
        other => {
            log::warn!("Skipping security rule {} with direction {:?}", rule.id, other);
            return Vec::new();
        }
    };
    let class = match props.access.as_deref() {
        Some("Allow") => RelationshipClass::Allows,
        Some("Deny") => RelationshipClass::Denies,
        other => {
            log::warn!("Skipping security rule {} with access {:?}", rule.id, other);
            return Vec::new();
        }
    };

    let mut relationships = Vec::new();
    for port_range in port_ranges(props) {
        for prefix in remote_prefixes(props, direction) {
            for target in classify(prefix, subnets) {
                let properties = rule_properties(rule, class, direction, port_range);

                if let RuleTarget::Subnet(subnet) = &target {
                    relationships.push(Relationship::Direct(DirectRelationship {
                        key: security_rule_key(&rule.id, port_range, &subnet.key),
                        relationship_type: generate_relationship_type(
                            class,
                            &subnet.entity_type,
                            &nsg_entity.entity_type,
                        ),
                        class,
                        from_key: subnet.key.clone(),
                        to_key: nsg_entity.key.clone(),
                        properties,
                    }));
                    continue;
                }

                let Some((discriminator, target_entity, target_filter_keys)) = mapped_target(&target)
                else {
                    continue;
                };
                let relationship_direction = match direction {
                    RuleDirection::Inbound => RelationshipDirection::Reverse,
                    RuleDirection::Outbound => RelationshipDirection::Forward,
                };
                relationships.push(Relationship::Mapped(MappedRelationship {
                    key: security_rule_key(&rule.id, port_range, &discriminator),
                    relationship_type: SECURITY_GROUP_RULE_RELATIONSHIP_TYPE.to_string(),
                    class,
                    mapping: RelationshipMapping {
                        relationship_direction,
                        source_entity_key: nsg_entity.key.clone(),
                        target_entity,
                        target_filter_keys,
                        skip_target_creation: Some(false),
                    },
                    properties,
                }));
            }
        }
    }
    relationships
}

/// Edges for every custom and default rule of a security group. `subnets` are
/// the subnet entities whose `CIDR` a rule prefix may name.
pub fn create_security_group_rule_relationships(
    nsg_entity: &Entity,
    nsg: &ArmResource<NetworkSecurityGroupProperties>,
    subnets: &[&Entity],
) -> Vec<Relationship> {
    let mut seen = HashSet::new();
    nsg.properties
        .security_rules
        .iter()
        .chain(nsg.properties.default_security_rules.iter())
        .flat_map(|rule| rule_relationships(nsg_entity, rule, subnets))
        .filter(|relationship| {
            // Prefixes such as `Internet` and `0.0.0.0/0` collapse onto the same target.
            let first = seen.insert(relationship.key().to_string());
            if !first {
                log::debug!("Dropping repeated rule edge {}", relationship.key());
            }
            first
        })
        .collect()
}

/// Raw JSON form of the security groups stashed for the rule step.
pub fn security_groups_from_data(
    value: Option<&Value>,
) -> Vec<ArmResource<NetworkSecurityGroupProperties>> {
    let Some(value) = value else {
        return Vec::new();
    };
    match serde_json::from_value(value.clone()) {
        Ok(groups) => groups,
        Err(e) => {
            log::warn!("Stored security groups could not be read back: {}", e);
            Vec::new()
        }
    }
}
