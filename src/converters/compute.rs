use crate::azure::models::{ArmResource, VirtualMachineProperties};
use crate::azure::AzureWebLinker;
use crate::graph::{
    verb_relationship_key, DirectRelationship, Entity, PropertyBag, Relationship, RelationshipClass,
};

use super::resource_properties;

pub const VIRTUAL_MACHINE_ENTITY_TYPE: &str = "azure_vm";
pub const VIRTUAL_MACHINE_ENTITY_CLASS: &[&str] = &["Host"];

pub const VM_NETWORK_INTERFACE_RELATIONSHIP_TYPE: &str = "azure_vm_uses_network_interface";
pub const VM_PUBLIC_IP_RELATIONSHIP_TYPE: &str = "azure_vm_uses_public_ip";

pub fn create_virtual_machine_entity(
    linker: &AzureWebLinker,
    vm: &ArmResource<VirtualMachineProperties>,
) -> Entity {
    let props = &vm.properties;
    let properties = resource_properties(linker, vm)
        .set_opt("vmId", props.vm_id.as_deref())
        .set_opt(
            "vmSize",
            props.hardware_profile.as_ref().and_then(|h| h.vm_size.as_deref()),
        )
        .set_opt(
            "osType",
            props
                .storage_profile
                .as_ref()
                .and_then(|s| s.os_disk.as_ref())
                .and_then(|d| d.os_type.as_deref()),
        )
        .set_opt("provisioningState", props.provisioning_state.as_deref())
        .build();

    Entity::new(
        vm.id.as_str(),
        VIRTUAL_MACHINE_ENTITY_TYPE,
        VIRTUAL_MACHINE_ENTITY_CLASS,
        properties,
    )
}

fn vm_uses(
    vm: &ArmResource<VirtualMachineProperties>,
    target_id: &str,
    relationship_type: &str,
) -> Relationship {
    let properties = PropertyBag::new()
        .set("displayName", RelationshipClass::Uses.as_str())
        .set_opt("vmId", vm.properties.vm_id.as_deref())
        .build();

    Relationship::Direct(DirectRelationship {
        key: verb_relationship_key(&vm.id, "uses", target_id),
        relationship_type: relationship_type.to_string(),
        class: RelationshipClass::Uses,
        from_key: vm.id.clone(),
        to_key: target_id.to_string(),
        properties,
    })
}

pub fn create_vm_network_interface_relationship(
    vm: &ArmResource<VirtualMachineProperties>,
    nic_id: &str,
) -> Relationship {
    vm_uses(vm, nic_id, VM_NETWORK_INTERFACE_RELATIONSHIP_TYPE)
}

pub fn create_vm_public_ip_relationship(
    vm: &ArmResource<VirtualMachineProperties>,
    public_ip_id: &str,
) -> Relationship {
    vm_uses(vm, public_ip_id, VM_PUBLIC_IP_RELATIONSHIP_TYPE)
}

/// Ids of the network interfaces attached to a VM.
pub fn network_interface_ids(vm: &ArmResource<VirtualMachineProperties>) -> Vec<&str> {
    vm.properties
        .network_profile
        .as_ref()
        .map(|p| p.network_interfaces.iter().map(|n| n.id.as_str()).collect())
        .unwrap_or_default()
}
