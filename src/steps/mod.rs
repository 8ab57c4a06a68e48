//! Step orchestration: fetch → convert → publish, one step per resource kind.
//!
//! Steps run sequentially in dependency order. A failing step is recorded and
//! the run carries on; steps downstream of it still run and are marked
//! [`StepStatus::PartialSuccessDueToDependencyFailure`].

pub mod ids;

mod active_directory;
mod compute;
mod cosmosdb;
mod databases;
mod keyvault;
mod monitor;
mod network;
mod resources;
mod security;
mod storage;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::azure::AzureClient;
use crate::config::Config;
use crate::converters::active_directory::IntegrationInstance;
use crate::converters::resources::create_resource_group_relationship;
use crate::converters::{
    active_directory as ad, compute as vm, cosmosdb as cosmos, databases as db, keyvault as kv,
    monitor as diag, network as net, resources as rg, security as sec, security_rules as rules,
    storage as sa,
};
use crate::error::{ConnectorError, Result};
use crate::graph::{generate_relationship_type, Entity, RelationshipClass};
use crate::jobstate::JobState;
use crate::resolver::{resource_id_matcher_depends_on, resource_id_matcher_entity_types};

use ids::*;

/// Outcome of one step in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failure,
    PartialSuccessDueToDependencyFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub id: String,
    pub status: StepStatus,
}

/// Static description of a step: what it produces and what must run first.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub entities: Vec<&'static str>,
    pub relationships: Vec<String>,
    pub depends_on: Vec<&'static str>,
}

impl StepDefinition {
    fn new(
        id: &'static str,
        name: &'static str,
        entities: &[&'static str],
        relationships: &[&'static str],
        depends_on: &[&'static str],
    ) -> Self {
        Self {
            id,
            name,
            entities: entities.to_vec(),
            relationships: relationships.iter().map(|r| r.to_string()).collect(),
            depends_on: depends_on.to_vec(),
        }
    }
}

/// Everything a step needs besides the job state.
pub struct StepContext {
    pub client: AzureClient,
    pub instance: IntegrationInstance,
    pub subscription_id: String,
    pub ingest_active_directory: bool,
}

impl StepContext {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            client: AzureClient::new(config)?,
            instance: IntegrationInstance {
                id: config.connector.instance_id.clone(),
                name: config.connector.instance_name.clone(),
            },
            subscription_id: config.azure.subscription_id.clone(),
            ingest_active_directory: config.azure.ingest_active_directory,
        })
    }

    /// `/subscriptions/{id}{suffix}`
    pub fn subscription_path(&self, suffix: &str) -> String {
        format!("/subscriptions/{}{}", self.subscription_id, suffix)
    }

    /// Steps switched off by configuration.
    pub fn disabled_steps(&self) -> Vec<&'static str> {
        if self.ingest_active_directory {
            Vec::new()
        } else {
            vec![STEP_AD_USERS, STEP_AD_GROUPS, STEP_AD_GROUP_MEMBERS]
        }
    }
}

/// The full step table, in declaration order.
pub fn step_definitions() -> Vec<StepDefinition> {
    let mut assessment_dependencies = vec![STEP_AD_ACCOUNT];
    assessment_dependencies.extend(resource_id_matcher_depends_on());

    let mut assessments = StepDefinition::new(
        STEP_RM_SECURITY_ASSESSMENTS,
        "Security Assessments",
        &[sec::ASSESSMENT_ENTITY_TYPE],
        &[],
        &[],
    );
    assessments.depends_on = assessment_dependencies;
    assessments.relationships = resource_id_matcher_entity_types()
        .into_iter()
        .map(|target| {
            generate_relationship_type(RelationshipClass::Assessed, sec::ASSESSMENT_ENTITY_TYPE, target)
        })
        .collect();

    vec![
        StepDefinition::new(
            STEP_AD_ACCOUNT,
            "Active Directory Info",
            &[ad::ACCOUNT_ENTITY_TYPE],
            &[],
            &[],
        ),
        StepDefinition::new(
            STEP_AD_USERS,
            "Active Directory Users",
            &[ad::USER_ENTITY_TYPE],
            &[ad::ACCOUNT_USER_RELATIONSHIP_TYPE],
            &[STEP_AD_ACCOUNT],
        ),
        StepDefinition::new(
            STEP_AD_GROUPS,
            "Active Directory Groups",
            &[ad::GROUP_ENTITY_TYPE],
            &[ad::ACCOUNT_GROUP_RELATIONSHIP_TYPE],
            &[STEP_AD_ACCOUNT],
        ),
        StepDefinition::new(
            STEP_AD_GROUP_MEMBERS,
            "Active Directory Group Members",
            &[],
            &[ad::GROUP_MEMBER_RELATIONSHIP_TYPE, ad::USER_GROUP_RELATIONSHIP_TYPE],
            &[STEP_AD_GROUPS],
        ),
        StepDefinition::new(
            STEP_RM_RESOURCES_RESOURCE_GROUPS,
            "Resource Groups",
            &[rg::RESOURCE_GROUP_ENTITY_TYPE],
            &[],
            &[STEP_AD_ACCOUNT],
        ),
        StepDefinition {
            depends_on: arm_dependencies(&[STEP_RM_STORAGE_RESOURCES]),
            ..StepDefinition::new(
                STEP_RM_NETWORK_VIRTUAL_NETWORKS,
                "Virtual Networks",
                &[
                    net::VIRTUAL_NETWORK_ENTITY_TYPE,
                    net::SUBNET_ENTITY_TYPE,
                    diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
                    diag::DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
                ],
                &["azure_vnet_contains_subnet", "azure_resource_group_has_vnet"],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[
                STEP_RM_NETWORK_VIRTUAL_NETWORKS,
                STEP_RM_NETWORK_INTERFACES,
                STEP_RM_STORAGE_RESOURCES,
            ]),
            ..StepDefinition::new(
                STEP_RM_NETWORK_SECURITY_GROUPS,
                "Network Security Groups",
                &[
                    net::SECURITY_GROUP_ENTITY_TYPE,
                    diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
                    diag::DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
                ],
                &[
                    "azure_security_group_protects_subnet",
                    "azure_security_group_protects_nic",
                    "azure_resource_group_has_security_group",
                ],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[STEP_RM_STORAGE_RESOURCES]),
            ..StepDefinition::new(
                STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES,
                "Public IP Addresses",
                &[
                    net::PUBLIC_IP_ENTITY_TYPE,
                    diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
                    diag::DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
                ],
                &["azure_resource_group_has_public_ip"],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES]),
            ..StepDefinition::new(
                STEP_RM_NETWORK_INTERFACES,
                "Network Interfaces",
                &[net::NETWORK_INTERFACE_ENTITY_TYPE],
                &["azure_resource_group_has_nic"],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES, STEP_RM_STORAGE_RESOURCES]),
            ..StepDefinition::new(
                STEP_RM_NETWORK_LOAD_BALANCERS,
                "Load Balancers",
                &[
                    net::LOAD_BALANCER_ENTITY_TYPE,
                    diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
                    diag::DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
                ],
                &["azure_resource_group_has_lb"],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[]),
            ..StepDefinition::new(
                STEP_RM_NETWORK_FIREWALLS,
                "Network Firewalls",
                &[net::FIREWALL_ENTITY_TYPE],
                &["azure_resource_group_has_firewall"],
                &[],
            )
        },
        StepDefinition::new(
            STEP_RM_NETWORK_SECURITY_GROUP_RULE_RELATIONSHIPS,
            "Network Security Group Rule Relationships",
            &[],
            &[
                rules::SECURITY_GROUP_RULE_RELATIONSHIP_TYPE,
                "azure_subnet_allows_security_group",
                "azure_subnet_denies_security_group",
            ],
            &[STEP_RM_NETWORK_SECURITY_GROUPS, STEP_RM_NETWORK_VIRTUAL_NETWORKS],
        ),
        StepDefinition {
            depends_on: arm_dependencies(&[STEP_RM_NETWORK_INTERFACES]),
            ..StepDefinition::new(
                STEP_RM_COMPUTE_VIRTUAL_MACHINES,
                "Virtual Machines",
                &[vm::VIRTUAL_MACHINE_ENTITY_TYPE],
                &[
                    vm::VM_NETWORK_INTERFACE_RELATIONSHIP_TYPE,
                    vm::VM_PUBLIC_IP_RELATIONSHIP_TYPE,
                    "azure_resource_group_has_vm",
                ],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[]),
            ..StepDefinition::new(
                STEP_RM_STORAGE_RESOURCES,
                "Storage Resources",
                &[
                    sa::STORAGE_ACCOUNT_ENTITY_TYPE,
                    sa::STORAGE_CONTAINER_ENTITY_TYPE,
                    sa::STORAGE_FILE_SHARE_ENTITY_TYPE,
                    diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
                    diag::DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
                ],
                &[
                    "azure_storage_account_has_container",
                    "azure_storage_account_has_file_share",
                    "azure_resource_group_has_storage_account",
                ],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[]),
            ..StepDefinition::new(
                STEP_RM_DATABASE_POSTGRESQL_DATABASES,
                "PostgreSQL Databases",
                &[db::POSTGRESQL_SERVER_ENTITY_TYPE, db::POSTGRESQL_DATABASE_ENTITY_TYPE],
                &[
                    "azure_postgresql_server_has_database",
                    "azure_resource_group_has_postgresql_server",
                ],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[STEP_RM_STORAGE_RESOURCES]),
            ..StepDefinition::new(
                STEP_RM_KEYVAULT_VAULTS,
                "Key Vaults",
                &[
                    kv::KEY_VAULT_ENTITY_TYPE,
                    diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE,
                    diag::DIAGNOSTIC_METRIC_SETTING_ENTITY_TYPE,
                ],
                &["azure_resource_group_has_keyvault_service"],
                &[],
            )
        },
        StepDefinition {
            depends_on: arm_dependencies(&[]),
            ..StepDefinition::new(
                STEP_RM_COSMOSDB_SQL_DATABASES,
                "Cosmos DB Accounts",
                &[cosmos::COSMOSDB_ACCOUNT_ENTITY_TYPE],
                &["azure_resource_group_has_cosmosdb_account"],
                &[],
            )
        },
        assessments,
    ]
}

/// Resource-manager steps need the account (for portal links) and the resource groups.
fn arm_dependencies(extra: &[&'static str]) -> Vec<&'static str> {
    [STEP_AD_ACCOUNT, STEP_RM_RESOURCES_RESOURCE_GROUPS]
        .into_iter()
        .chain(extra.iter().copied())
        .collect()
}

/// Stable topological order of the enabled steps: among the steps whose
/// dependencies are satisfied, the one declared first runs first.
/// Dependencies on disabled steps count as satisfied.
pub fn execution_order<'a>(
    definitions: &'a [StepDefinition],
    disabled: &[&str],
) -> Result<Vec<&'a StepDefinition>> {
    let known: HashSet<&str> = definitions.iter().map(|d| d.id).collect();
    for definition in definitions {
        if let Some(missing) = definition.depends_on.iter().find(|dep| !known.contains(*dep)) {
            return Err(ConnectorError::StepGraph(format!(
                "Step {} depends on unknown step {}",
                definition.id, missing
            )));
        }
    }

    let mut pending: Vec<&StepDefinition> = definitions
        .iter()
        .filter(|d| !disabled.contains(&d.id))
        .collect();
    let mut done: HashSet<&str> = disabled.iter().copied().collect();
    let mut order = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let Some(position) = pending
            .iter()
            .position(|d| d.depends_on.iter().all(|dep| done.contains(dep)))
        else {
            let stuck: Vec<&str> = pending.iter().map(|d| d.id).collect();
            return Err(ConnectorError::StepGraph(format!(
                "Dependency cycle among steps: {}",
                stuck.join(", ")
            )));
        };
        let next = pending.remove(position);
        done.insert(next.id);
        order.push(next);
    }

    Ok(order)
}

/// Run one step by id.
async fn execute_step(ctx: &StepContext, state: &mut dyn JobState, id: &str) -> Result<()> {
    match id {
        STEP_AD_ACCOUNT => active_directory::fetch_account(ctx, state).await,
        STEP_AD_USERS => active_directory::fetch_users(ctx, state).await,
        STEP_AD_GROUPS => active_directory::fetch_groups(ctx, state).await,
        STEP_AD_GROUP_MEMBERS => active_directory::fetch_group_members(ctx, state).await,
        STEP_RM_RESOURCES_RESOURCE_GROUPS => resources::fetch_resource_groups(ctx, state).await,
        STEP_RM_NETWORK_VIRTUAL_NETWORKS => network::fetch_virtual_networks(ctx, state).await,
        STEP_RM_NETWORK_SECURITY_GROUPS => network::fetch_security_groups(ctx, state).await,
        STEP_RM_NETWORK_PUBLIC_IP_ADDRESSES => network::fetch_public_ip_addresses(ctx, state).await,
        STEP_RM_NETWORK_INTERFACES => network::fetch_network_interfaces(ctx, state).await,
        STEP_RM_NETWORK_LOAD_BALANCERS => network::fetch_load_balancers(ctx, state).await,
        STEP_RM_NETWORK_FIREWALLS => network::fetch_firewalls(ctx, state).await,
        STEP_RM_NETWORK_SECURITY_GROUP_RULE_RELATIONSHIPS => {
            network::build_security_group_rule_relationships(state)
        }
        STEP_RM_COMPUTE_VIRTUAL_MACHINES => compute::fetch_virtual_machines(ctx, state).await,
        STEP_RM_STORAGE_RESOURCES => storage::fetch_storage_resources(ctx, state).await,
        STEP_RM_DATABASE_POSTGRESQL_DATABASES => databases::fetch_postgresql_databases(ctx, state).await,
        STEP_RM_KEYVAULT_VAULTS => keyvault::fetch_key_vaults(ctx, state).await,
        STEP_RM_COSMOSDB_SQL_DATABASES => cosmosdb::fetch_cosmosdb_accounts(ctx, state).await,
        STEP_RM_SECURITY_ASSESSMENTS => security::fetch_assessments(ctx, state).await,
        other => Err(ConnectorError::StepGraph(format!("No implementation for step {}", other))),
    }
}

/// Run `order` sequentially against `state`. Never aborts: every step gets a result.
pub async fn run_steps(
    ctx: &StepContext,
    state: &mut dyn JobState,
    order: &[&StepDefinition],
) -> Vec<StepResult> {
    let mut failed: HashSet<&str> = HashSet::new();
    let mut results = Vec::with_capacity(order.len());

    for step in order {
        log::info!("Starting step {} ({})", step.id, step.name);
        let status = match execute_step(ctx, state, step.id).await {
            Ok(()) if step.depends_on.iter().any(|dep| failed.contains(dep)) => {
                log::warn!("Step {} completed after a dependency failed", step.id);
                StepStatus::PartialSuccessDueToDependencyFailure
            }
            Ok(()) => {
                log::info!("Step {} completed", step.id);
                StepStatus::Success
            }
            Err(e) => {
                log::error!("Step {} failed: {}", step.id, e);
                failed.insert(step.id);
                StepStatus::Failure
            }
        };
        results.push(StepResult {
            id: step.id.to_string(),
            status,
        });
    }

    results
}

/// Add an ARM-backed entity together with its resource group edge.
fn publish_resource_entity(state: &mut dyn JobState, entity: Entity) -> Result<()> {
    let group_edge = create_resource_group_relationship(&*state, &entity);
    state.add_entity(entity)?;
    if let Some(relationship) = group_edge {
        state.add_relationship(relationship)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(order: &[&StepDefinition]) -> Vec<&'static str> {
        order.iter().map(|d| d.id).collect()
    }

    fn position(order: &[&'static str], id: &str) -> usize {
        order.iter().position(|s| *s == id).unwrap()
    }

    #[test]
    fn test_every_step_runs_after_its_dependencies() {
        let definitions = step_definitions();
        let order = ids(&execution_order(&definitions, &[]).unwrap());
        assert_eq!(order.len(), definitions.len());
        assert_eq!(order[0], STEP_AD_ACCOUNT);

        for definition in &definitions {
            for dep in &definition.depends_on {
                assert!(
                    position(&order, dep) < position(&order, definition.id),
                    "{} must run before {}",
                    dep,
                    definition.id
                );
            }
        }
        assert_eq!(*order.last().unwrap(), STEP_RM_SECURITY_ASSESSMENTS);
    }

    #[test]
    fn test_order_is_stable() {
        let definitions = step_definitions();
        let first = ids(&execution_order(&definitions, &[]).unwrap());
        let second = ids(&execution_order(&definitions, &[]).unwrap());
        assert_eq!(first, second);
        assert!(position(&first, STEP_AD_USERS) < position(&first, STEP_AD_GROUPS));
    }

    #[test]
    fn test_disabled_steps_are_excluded() {
        let definitions = step_definitions();
        let disabled = [STEP_AD_USERS, STEP_AD_GROUPS, STEP_AD_GROUP_MEMBERS];
        let order = ids(&execution_order(&definitions, &disabled).unwrap());
        assert_eq!(order.len(), definitions.len() - 3);
        assert!(!order.contains(&STEP_AD_GROUP_MEMBERS));
        assert!(order.contains(&STEP_AD_ACCOUNT));
    }

    #[test]
    fn test_dependency_on_disabled_step_is_satisfied() {
        let definitions = vec![
            StepDefinition::new("a", "A", &[], &[], &[]),
            StepDefinition::new("b", "B", &[], &[], &["a"]),
        ];
        let order = ids(&execution_order(&definitions, &["a"]).unwrap());
        assert_eq!(order, vec!["b"]);
    }

    #[test]
    fn test_unknown_dependency_is_an_error() {
        let definitions = vec![StepDefinition::new("a", "A", &[], &[], &["missing"])];
        let err = execution_order(&definitions, &[]).unwrap_err();
        assert!(matches!(err, ConnectorError::StepGraph(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_cycle_is_an_error() {
        let definitions = vec![
            StepDefinition::new("a", "A", &[], &[], &["b"]),
            StepDefinition::new("b", "B", &[], &[], &["a"]),
        ];
        let err = execution_order(&definitions, &[]).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_assessments_depend_on_every_resolvable_type() {
        let definitions = step_definitions();
        let assessments = definitions
            .iter()
            .find(|d| d.id == STEP_RM_SECURITY_ASSESSMENTS)
            .unwrap();
        for dep in resource_id_matcher_depends_on() {
            assert!(assessments.depends_on.contains(&dep));
        }
        assert_eq!(assessments.relationships.len(), resource_id_matcher_entity_types().len());
    }

    #[test]
    fn test_diagnostic_steps_run_after_storage() {
        let definitions = step_definitions();
        let diagnostic_steps: Vec<&str> = definitions
            .iter()
            .filter(|d| d.id != STEP_RM_STORAGE_RESOURCES)
            .filter(|d| d.entities.contains(&diag::DIAGNOSTIC_LOG_SETTING_ENTITY_TYPE))
            .map(|d| d.id)
            .collect();
        assert!(diagnostic_steps.contains(&STEP_RM_NETWORK_VIRTUAL_NETWORKS));

        for id in diagnostic_steps {
            let definition = definitions.iter().find(|d| d.id == id).unwrap();
            assert!(
                definition.depends_on.contains(&STEP_RM_STORAGE_RESOURCES),
                "{} fetches diagnostic settings but does not wait for storage",
                id
            );
        }
    }

    #[test]
    fn test_step_status_serialization() {
        let result = StepResult {
            id: STEP_AD_USERS.to_string(),
            status: StepStatus::PartialSuccessDueToDependencyFailure,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "partial_success_due_to_dependency_failure");
    }
}
