use std::collections::BTreeMap;

use crate::azure::models::{
    ArmResource, AzureFirewallProperties, LoadBalancerProperties, NetworkInterfaceProperties,
    NetworkSecurityGroupProperties, PublicIpAddressProperties, VirtualNetworkProperties,
};
use crate::azure::AzureWebLinker;
use crate::converters::network::{
    create_azure_firewall_entity, create_load_balancer_entity, create_network_interface_entity,
    create_network_security_group_entity, create_public_ip_entity,
    create_security_group_protects_relationships, create_subnet_entity,
    create_virtual_network_entity, create_virtual_network_subnet_relationship,
    load_balancer_public_ip_ids, network_interface_public_ip_ids, SUBNET_ENTITY_TYPE,
};
use crate::converters::security_rules::{
    create_security_group_rule_relationships, security_groups_from_data,
};
use crate::error::Result;
use crate::graph::Relationship;
use crate::jobstate::JobState;

use super::monitor::publish_diagnostic_settings;
use super::{publish_resource_entity, StepContext};

const NETWORK_API_VERSION: &str = "2023-09-01";

/// Raw security groups, kept for the rule relationship step.
pub(super) const SECURITY_GROUPS_DATA_KEY: &str = "network_security_groups";
/// Public IP ids per network interface id, kept for the virtual machine step.
pub(super) const INTERFACE_PUBLIC_IPS_DATA_KEY: &str = "network_interface_public_ips";

fn network_path(ctx: &StepContext, collection: &str) -> String {
    ctx.subscription_path(&format!("/providers/Microsoft.Network/{}", collection))
}

/// Addresses of the already ingested public IPs among `ids`.
fn public_ip_addresses(state: &dyn JobState, ids: &[&str]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| state.find_entity(id))
        .filter_map(|ip| ip.str_property("publicIpAddress"))
        .map(str::to_string)
        .collect()
}

pub(super) async fn fetch_virtual_networks(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (vnets, stats) = ctx
        .client
        .list_management::<ArmResource<VirtualNetworkProperties>>(
            &network_path(ctx, "virtualNetworks"),
            NETWORK_API_VERSION,
        )
        .await?;

    for vnet in &vnets {
        let vnet_entity = create_virtual_network_entity(&linker, vnet);
        publish_resource_entity(state, vnet_entity.clone())?;

        for subnet in &vnet.properties.subnets {
            let subnet_entity = create_subnet_entity(&linker, vnet, subnet);
            let contains = create_virtual_network_subnet_relationship(&vnet_entity, &subnet_entity);
            state.add_entity(subnet_entity)?;
            state.add_relationship(contains)?;
        }
        publish_diagnostic_settings(ctx, state, &linker, &vnet.id).await?;
    }
    log::info!("Virtual networks: {} added, {} skipped", vnets.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_security_groups(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (groups, stats) = ctx
        .client
        .list_management::<ArmResource<NetworkSecurityGroupProperties>>(
            &network_path(ctx, "networkSecurityGroups"),
            NETWORK_API_VERSION,
        )
        .await?;

    for group in &groups {
        let entity = create_network_security_group_entity(&linker, group);
        let protects = create_security_group_protects_relationships(&*state, &entity, group);
        publish_resource_entity(state, entity)?;
        state.add_relationships(protects)?;
        publish_diagnostic_settings(ctx, state, &linker, &group.id).await?;
    }

    state.set_data(SECURITY_GROUPS_DATA_KEY, serde_json::to_value(&groups)?);
    log::info!("Security groups: {} added, {} skipped", groups.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_public_ip_addresses(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (addresses, stats) = ctx
        .client
        .list_management::<ArmResource<PublicIpAddressProperties>>(
            &network_path(ctx, "publicIPAddresses"),
            NETWORK_API_VERSION,
        )
        .await?;

    for address in &addresses {
        publish_resource_entity(state, create_public_ip_entity(&linker, address))?;
        publish_diagnostic_settings(ctx, state, &linker, &address.id).await?;
    }
    log::info!("Public IP addresses: {} added, {} skipped", addresses.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_network_interfaces(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (interfaces, stats) = ctx
        .client
        .list_management::<ArmResource<NetworkInterfaceProperties>>(
            &network_path(ctx, "networkInterfaces"),
            NETWORK_API_VERSION,
        )
        .await?;

    let mut public_ips_by_interface: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for interface in &interfaces {
        let public_ip_ids = network_interface_public_ip_ids(interface);
        let addresses = public_ip_addresses(&*state, &public_ip_ids);
        publish_resource_entity(state, create_network_interface_entity(&linker, interface, &addresses))?;
        public_ips_by_interface.insert(
            interface.id.clone(),
            public_ip_ids.into_iter().map(str::to_string).collect(),
        );
    }

    state.set_data(INTERFACE_PUBLIC_IPS_DATA_KEY, serde_json::to_value(&public_ips_by_interface)?);
    log::info!("Network interfaces: {} added, {} skipped", interfaces.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_load_balancers(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (balancers, stats) = ctx
        .client
        .list_management::<ArmResource<LoadBalancerProperties>>(
            &network_path(ctx, "loadBalancers"),
            NETWORK_API_VERSION,
        )
        .await?;

    for balancer in &balancers {
        let addresses = public_ip_addresses(&*state, &load_balancer_public_ip_ids(balancer));
        publish_resource_entity(state, create_load_balancer_entity(&linker, balancer, &addresses))?;
        publish_diagnostic_settings(ctx, state, &linker, &balancer.id).await?;
    }
    log::info!("Load balancers: {} added, {} skipped", balancers.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_firewalls(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let (firewalls, stats) = ctx
        .client
        .list_management::<ArmResource<AzureFirewallProperties>>(
            &network_path(ctx, "azureFirewalls"),
            NETWORK_API_VERSION,
        )
        .await?;

    for firewall in &firewalls {
        publish_resource_entity(state, create_azure_firewall_entity(&linker, firewall))?;
    }
    log::info!("Firewalls: {} added, {} skipped", firewalls.len(), stats.skipped);
    Ok(())
}

/// Rule edges need every subnet CIDR, so they are built once both the
/// security groups and the virtual networks are in job state.
pub(super) fn build_security_group_rule_relationships(state: &mut dyn JobState) -> Result<()> {
    let groups = security_groups_from_data(state.get_data(SECURITY_GROUPS_DATA_KEY));

    let relationships: Vec<Relationship> = {
        let subnets = state.entities_of_type(SUBNET_ENTITY_TYPE);
        groups
            .iter()
            .filter_map(|group| {
                let Some(entity) = state.find_entity(&group.id) else {
                    log::warn!("Security group {} not in job state; skipping its rules", group.id);
                    return None;
                };
                Some(create_security_group_rule_relationships(entity, group, &subnets))
            })
            .flatten()
            .collect()
    };

    log::info!("Security group rules: {} relationships", relationships.len());
    state.add_relationships(relationships)
}
