//! Step identifiers. These strings appear in persisted run records, so they are stable.

pub const STEP_AD_ACCOUNT: &str = "ad-account";
pub const STEP_AD_USERS: &str = "ad-users";
pub const STEP_AD_GROUPS: &str = "ad-groups";
pub const STEP_AD_GROUP_MEMBERS: &str = "ad-group-members";

pub const STEP_RM_RESOURCES_RESOURCE_GROUPS: &str = "rm-resources-resource-groups";

pub const STEP_RM_NETWORK_VIRTUAL_NETWORKS: &str = "rm-network-virtual-networks";
pub const STEP_RM_NETWORK_SECURITY_GROUPS: &str = "rm-network-security-groups";
pub const STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES: &str = "rm-network-ip-addresses";
pub const STEP_RM_NETWORK_INTERFACES: &str = "rm-network-interfaces";
pub const STEP_RM_NETWORK_LOAD_BALANCERS: &str = "rm-network-load-balancers";
pub const STEP_RM_NETWORK_FIREWALLS: &str = "rm-network-firewalls";
pub const STEP_RM_NETWORK_SECURITY_GROUP_RULE_RELATIONSHIPS: &str =
    "rm-network-security-group-rule-relationships";

pub const STEP_RM_COMPUTE_VIRTUAL_MACHINES: &str = "rm-compute-virtual-machines";
pub const STEP_RM_STORAGE_RESOURCES: &str = "rm-storage-resources";
pub const STEP_RM_DATABASE_POSTGRESQL_DATABASES: &str = "rm-database-postgresql-databases";
pub const STEP_RM_KEYVAULT_VAULTS: &str = "rm-keyvault-vaults";
pub const STEP_RM_COSMOSDB_SQL_DATABASES: &str = "rm-cosmosdb-sql-databases";
pub const STEP_RM_SECURITY_ASSESSMENTS: &str = "rm-security-assessments";
