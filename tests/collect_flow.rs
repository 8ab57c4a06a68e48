//! Drives the collection steps against a mock ARM / Graph server.

use azgraph::azure::AzureClient;
use azgraph::converters::active_directory::IntegrationInstance;
use azgraph::db::Db;
use azgraph::graph::{Relationship, RelationshipClass};
use azgraph::jobstate::snapshot::{latest_run_summary, persist_run, RunRecord};
use azgraph::steps::ids::{STEP_AD_ACCOUNT, STEP_RM_RESOURCES_RESOURCE_GROUPS, STEP_RM_STORAGE_RESOURCES};
use azgraph::steps::{execution_order, run_steps, step_definitions, StepContext, StepStatus};
use azgraph::{JobState, MemoryJobState};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBSCRIPTION: &str = "87f62f44-9dad-4284-a08f-f2fb3d8b528a";
const RESOURCE_GROUP: &str = "/subscriptions/87f62f44-9dad-4284-a08f-f2fb3d8b528a/resourceGroups/j1dev";
const STORAGE_ACCOUNT: &str = "/subscriptions/87f62f44-9dad-4284-a08f-f2fb3d8b528a/resourceGroups/j1dev/providers/Microsoft.Storage/storageAccounts/j1devlogs";

fn vnet_id() -> String {
    format!("{}/providers/Microsoft.Network/virtualNetworks/j1dev", RESOURCE_GROUP)
}

fn vnet_settings_id() -> String {
    format!("{}/providers/microsoft.insights/diagnosticSettings/j1dev_vn_diag_set", vnet_id())
}

fn subnet_id() -> String {
    format!("{}/subnets/j1dev", vnet_id())
}

fn nsg_id() -> String {
    format!("{}/providers/Microsoft.Network/networkSecurityGroups/j1dev", RESOURCE_GROUP)
}

fn list(records: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "value": records }))
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_directory(server: &MockServer) {
    mount(
        server,
        "/v1.0/organization",
        list(json!([{
            "id": "4a17becb-fb42-4633-b5c8-5ab66f28d195",
            "displayName": "Local Org",
            "verifiedDomains": [{"name": "example.onmicrosoft.com", "isDefault": true}]
        }])),
    )
    .await;
    mount(
        server,
        "/v1.0/users",
        list(json!([{"id": "u1", "displayName": "User One", "userPrincipalName": "one@example.com"}])),
    )
    .await;
    mount(server, "/v1.0/groups", list(json!([{"id": "g1", "displayName": "Admins"}]))).await;
    mount(
        server,
        "/v1.0/groups/g1/members",
        list(json!([{"@odata.type": "#microsoft.graph.user", "id": "u1", "displayName": "User One"}])),
    )
    .await;
}

async fn mount_network(server: &MockServer) {
    let subscription = format!("/subscriptions/{}", SUBSCRIPTION);
    mount(
        server,
        &format!("{}/resourcegroups", subscription),
        list(json!([{
            "id": RESOURCE_GROUP,
            "name": "j1dev",
            "location": "eastus",
            "properties": {"provisioningState": "Succeeded"}
        }])),
    )
    .await;
    mount(
        server,
        &format!("{}/providers/Microsoft.Network/virtualNetworks", subscription),
        list(json!([{
            "id": vnet_id(),
            "name": "j1dev",
            "type": "Microsoft.Network/virtualNetworks",
            "location": "eastus",
            "properties": {
                "addressSpace": {"addressPrefixes": ["10.0.0.0/16"]},
                "subnets": [{
                    "id": subnet_id(),
                    "name": "j1dev",
                    "properties": {"addressPrefix": "10.0.2.0/24", "networkSecurityGroup": {"id": nsg_id()}}
                }]
            }
        }])),
    )
    .await;
    mount(
        server,
        &format!("{}/providers/Microsoft.Network/networkSecurityGroups", subscription),
        list(json!([{
            "id": nsg_id(),
            "name": "j1dev",
            "type": "Microsoft.Network/networkSecurityGroups",
            "location": "eastus",
            "properties": {
                "subnets": [{"id": subnet_id()}],
                "securityRules": [
                    {
                        "id": format!("{}/securityRules/ssh-from-subnet", nsg_id()),
                        "name": "ssh-from-subnet",
                        "properties": {
                            "access": "Allow",
                            "direction": "Inbound",
                            "priority": 100,
                            "protocol": "Tcp",
                            "sourceAddressPrefix": "10.0.2.0/24",
                            "sourcePortRange": "*",
                            "destinationAddressPrefix": "*",
                            "destinationPortRange": "22"
                        }
                    },
                    {
                        "id": format!("{}/securityRules/deny-internet", nsg_id()),
                        "name": "deny-internet",
                        "properties": {
                            "access": "Deny",
                            "direction": "Inbound",
                            "priority": 4000,
                            "protocol": "*",
                            "sourceAddressPrefix": "Internet",
                            "sourcePortRange": "*",
                            "destinationAddressPrefix": "*",
                            "destinationPortRange": "*"
                        }
                    }
                ]
            }
        }])),
    )
    .await;
    mount(
        server,
        &format!("{}/providers/Microsoft.Insights/diagnosticSettings", nsg_id()),
        list(json!([{
            "id": format!("{}/providers/microsoft.insights/diagnosticSettings/nsg-logs", nsg_id()),
            "name": "nsg-logs",
            "properties": {
                "storageAccountId": STORAGE_ACCOUNT,
                "workspaceId": null,
                "logs": [{
                    "category": "NetworkSecurityGroupEvent",
                    "enabled": true,
                    "retentionPolicy": {"enabled": false, "days": 0}
                }],
                "metrics": []
            }
        }])),
    )
    .await;
    mount(
        server,
        &format!("{}/providers/Microsoft.Insights/diagnosticSettings", vnet_id()),
        list(json!([{
            "id": vnet_settings_id(),
            "name": "j1dev_vn_diag_set",
            "properties": {
                "storageAccountId": STORAGE_ACCOUNT,
                "logs": [{
                    "category": "VMProtectionAlerts",
                    "enabled": true,
                    "retentionPolicy": {"enabled": true, "days": 1}
                }],
                "metrics": []
            }
        }])),
    )
    .await;
}

/// Every listing not mounted explicitly is empty. Mocks mounted earlier win.
async fn mount_empty_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(list(json!([])))
        .mount(server)
        .await;
}

fn context(server: &MockServer, ingest_active_directory: bool) -> StepContext {
    let client = AzureClient::with_endpoints(
        &server.uri(),
        "management-token",
        &server.uri(),
        "graph-token",
        Duration::from_secs(5),
    )
    .unwrap();

    StepContext {
        client,
        instance: IntegrationInstance {
            id: "local-integration-instance".to_string(),
            name: "Local Integration".to_string(),
        },
        subscription_id: SUBSCRIPTION.to_string(),
        ingest_active_directory,
    }
}

fn relationships_of_type<'a>(state: &'a MemoryJobState, relationship_type: &str) -> Vec<&'a Relationship> {
    state
        .relationships()
        .iter()
        .filter(|r| r.relationship_type() == relationship_type)
        .collect()
}

#[tokio::test]
async fn test_full_collection_run() {
    let server = MockServer::start().await;
    mount_directory(&server).await;
    mount_network(&server).await;
    mount_empty_fallback(&server).await;

    let ctx = context(&server, true);
    let definitions = step_definitions();
    let order = execution_order(&definitions, &ctx.disabled_steps()).unwrap();
    let mut state = MemoryJobState::new();
    let results = run_steps(&ctx, &mut state, &order).await;

    assert_eq!(results.len(), definitions.len());
    for result in &results {
        assert_eq!(result.status, StepStatus::Success, "step {} did not succeed", result.id);
    }

    assert_eq!(state.entities_of_type("azure_account").len(), 1);
    assert_eq!(state.entities_of_type("azure_user").len(), 1);
    assert_eq!(relationships_of_type(&state, "azure_user_assigned_group").len(), 1);
    assert_eq!(relationships_of_type(&state, "azure_group_has_member").len(), 1);

    let vnet = state.find_entity(&vnet_id()).unwrap();
    assert!(vnet
        .str_property("webLink")
        .unwrap()
        .starts_with("https://portal.azure.com/#@example.onmicrosoft.com"));

    let contains = relationships_of_type(&state, "azure_vnet_contains_subnet");
    assert_eq!(contains[0].endpoints(), Some((vnet_id().as_str(), subnet_id().as_str())));

    let group_has_vnet = relationships_of_type(&state, "azure_resource_group_has_vnet");
    assert_eq!(group_has_vnet.len(), 1);
    assert!(!group_has_vnet[0].is_mapped());

    let protects = relationships_of_type(&state, "azure_security_group_protects_subnet");
    assert_eq!(protects[0].endpoints(), Some((nsg_id().as_str(), subnet_id().as_str())));

    let allows = relationships_of_type(&state, "azure_subnet_allows_security_group");
    assert_eq!(allows.len(), 1);
    assert_eq!(allows[0].endpoints(), Some((subnet_id().as_str(), nsg_id().as_str())));
    assert_eq!(allows[0].properties().get("fromPort"), Some(&json!(22)));

    let rules = relationships_of_type(&state, "azure_security_group_rule");
    assert_eq!(rules.len(), 1);
    assert!(rules[0].is_mapped());
    assert_eq!(rules[0].class(), RelationshipClass::Denies);

    assert_eq!(state.entities_of_type("azure_diagnostic_log_setting").len(), 2);
    let vnet_log_setting = format!("{}/logs/VMProtectionAlerts/true/1/true", vnet_settings_id());
    assert!(state.find_entity(&vnet_log_setting).is_some());
    let has_setting = relationships_of_type(&state, "azure_resource_has_diagnostic_log_setting");
    assert!(has_setting
        .iter()
        .any(|r| r.endpoints() == Some((vnet_id().as_str(), vnet_log_setting.as_str()))));
    let uses = relationships_of_type(&state, "azure_diagnostic_log_setting_uses_storage_account");
    assert_eq!(uses.len(), 2);
    assert!(uses.iter().all(|r| r.is_mapped()));

    let temp_dir = TempDir::new().unwrap();
    let db = Db::new(temp_dir.path().join("snapshot.db"));
    let run = RunRecord {
        run_id: "run-1".to_string(),
        instance_id: "local-integration-instance".to_string(),
        started_at: 1_000,
        finished_at: 2_000,
        step_results: results,
    };
    persist_run(&db, Path::new("migrations"), run, &state).await.unwrap();

    let summary = latest_run_summary(&db).await.unwrap().unwrap();
    assert_eq!(summary.run_id, "run-1");
    assert!(summary.entity_counts.contains(&("azure_subnet".to_string(), 1)));
    assert!(summary.mapped_relationships >= 4);
}

#[tokio::test]
async fn test_failed_dependency_marks_downstream_steps() {
    let server = MockServer::start().await;
    mount(&server, "/v1.0/organization", ResponseTemplate::new(500)).await;
    mount_empty_fallback(&server).await;

    let ctx = context(&server, false);
    let definitions = step_definitions();
    let order = execution_order(&definitions, &ctx.disabled_steps()).unwrap();
    let mut state = MemoryJobState::new();
    let results = run_steps(&ctx, &mut state, &order).await;

    assert_eq!(results.len(), definitions.len() - 3);
    let status_of = |id: &str| results.iter().find(|r| r.id == id).unwrap().status;
    assert_eq!(status_of(STEP_AD_ACCOUNT), StepStatus::Failure);
    assert_eq!(
        status_of(STEP_RM_RESOURCES_RESOURCE_GROUPS),
        StepStatus::PartialSuccessDueToDependencyFailure
    );
    assert_eq!(state.entity_count(), 0);
}

#[tokio::test]
async fn test_storage_children_survive_malformed_records() {
    let server = MockServer::start().await;
    mount_directory(&server).await;
    mount(
        &server,
        &format!("/subscriptions/{}/providers/Microsoft.Storage/storageAccounts", SUBSCRIPTION),
        list(json!([{"id": STORAGE_ACCOUNT, "name": "j1devlogs", "kind": "StorageV2", "properties": {}}])),
    )
    .await;
    let container_id = format!("{}/blobServices/default/containers/bootdiagnostics", STORAGE_ACCOUNT);
    mount(
        &server,
        &format!("{}/blobServices/default/containers", STORAGE_ACCOUNT),
        list(json!([
            {"id": container_id, "name": "bootdiagnostics", "properties": {"publicAccess": "None"}},
            {"name": "missing-id"}
        ])),
    )
    .await;
    mount_empty_fallback(&server).await;

    let ctx = context(&server, false);
    let definitions = step_definitions();
    let order = execution_order(&definitions, &ctx.disabled_steps()).unwrap();
    let mut state = MemoryJobState::new();
    let results = run_steps(&ctx, &mut state, &order).await;

    let storage = results.iter().find(|r| r.id == STEP_RM_STORAGE_RESOURCES).unwrap();
    assert_eq!(storage.status, StepStatus::Success);
    assert_eq!(state.entities_of_type("azure_storage_container").len(), 1);
    assert!(state
        .relationships()
        .iter()
        .any(|r| r.endpoints() == Some((STORAGE_ACCOUNT, container_id.as_str()))));
}
