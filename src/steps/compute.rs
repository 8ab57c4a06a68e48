use std::collections::BTreeMap;

use crate::azure::models::{ArmResource, VirtualMachineProperties};
use crate::azure::AzureWebLinker;
use crate::converters::compute::{
    create_virtual_machine_entity, create_vm_network_interface_relationship,
    create_vm_public_ip_relationship, network_interface_ids,
};
use crate::error::Result;
use crate::jobstate::JobState;

use super::network::INTERFACE_PUBLIC_IPS_DATA_KEY;
use super::{publish_resource_entity, StepContext};

const COMPUTE_API_VERSION: &str = "2023-09-01";

fn interface_public_ips(state: &dyn JobState) -> Result<BTreeMap<String, Vec<String>>> {
    match state.get_data(INTERFACE_PUBLIC_IPS_DATA_KEY) {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(BTreeMap::new()),
    }
}

/// ARM ids are case-insensitive and the compute and network APIs do not agree on casing.
fn public_ips_of<'a>(by_interface: &'a BTreeMap<String, Vec<String>>, nic_id: &str) -> &'a [String] {
    by_interface
        .get(nic_id)
        .or_else(|| {
            by_interface
                .iter()
                .find(|(id, _)| id.eq_ignore_ascii_case(nic_id))
                .map(|(_, ips)| ips)
        })
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub(super) async fn fetch_virtual_machines(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let linker = AzureWebLinker::from_job_state(&*state);
    let by_interface = interface_public_ips(&*state)?;
    let (vms, stats) = ctx
        .client
        .list_management::<ArmResource<VirtualMachineProperties>>(
            &ctx.subscription_path("/providers/Microsoft.Compute/virtualMachines"),
            COMPUTE_API_VERSION,
        )
        .await?;

    for vm in &vms {
        publish_resource_entity(state, create_virtual_machine_entity(&linker, vm))?;

        for nic_id in network_interface_ids(vm) {
            state.add_relationship(create_vm_network_interface_relationship(vm, nic_id))?;
            for public_ip_id in public_ips_of(&by_interface, nic_id) {
                state.add_relationship(create_vm_public_ip_relationship(vm, public_ip_id))?;
            }
        }
    }
    log::info!("Virtual machines: {} added, {} skipped", vms.len(), stats.skipped);
    Ok(())
}
