use crate::azure::models::{Group, GroupMember, Organization, User};
use crate::azure::web_linker::ACCOUNT_DATA_KEY;
use crate::converters::active_directory::{
    create_account_entity, create_account_group_relationship, create_account_user_relationship,
    create_group_entity, create_group_member_relationship, create_user_entity,
    create_user_group_relationships,
};
use crate::error::{ConnectorError, Result};
use crate::graph::Entity;
use crate::jobstate::JobState;

use super::StepContext;

/// Groups fetched by the groups step, read back by the membership step.
const GROUPS_DATA_KEY: &str = "ad_groups";

fn account_entity(state: &dyn JobState) -> Result<Entity> {
    let value = state
        .get_data(ACCOUNT_DATA_KEY)
        .ok_or_else(|| ConnectorError::InvalidRecord("Account entity not found in job state".into()))?;
    Ok(serde_json::from_value(value.clone())?)
}

pub(super) async fn fetch_account(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let (organizations, _) = ctx.client.list_graph::<Organization>("/v1.0/organization").await?;
    let organization = organizations
        .into_iter()
        .next()
        .ok_or_else(|| ConnectorError::Api("Directory returned no organization".into()))?;

    let account = create_account_entity(&ctx.instance, &organization);
    state.set_data(ACCOUNT_DATA_KEY, serde_json::to_value(&account)?);
    state.add_entity(account)
}

pub(super) async fn fetch_users(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let account = account_entity(&*state)?;
    let (users, stats) = ctx.client.list_graph::<User>("/v1.0/users").await?;

    for user in &users {
        state.add_entity(create_user_entity(user))?;
        state.add_relationship(create_account_user_relationship(&account, user))?;
    }
    log::info!("Users: {} added, {} skipped", users.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_groups(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let account = account_entity(&*state)?;
    let (groups, stats) = ctx.client.list_graph::<Group>("/v1.0/groups").await?;

    for group in &groups {
        state.add_entity(create_group_entity(group))?;
        state.add_relationship(create_account_group_relationship(&account, group))?;
    }
    state.set_data(GROUPS_DATA_KEY, serde_json::to_value(&groups)?);
    log::info!("Groups: {} added, {} skipped", groups.len(), stats.skipped);
    Ok(())
}

pub(super) async fn fetch_group_members(ctx: &StepContext, state: &mut dyn JobState) -> Result<()> {
    let groups: Vec<Group> = match state.get_data(GROUPS_DATA_KEY) {
        Some(value) => serde_json::from_value(value.clone())?,
        None => Vec::new(),
    };

    for group in &groups {
        let path = format!("/v1.0/groups/{}/members", group.id);
        let (members, _) = ctx.client.list_graph::<GroupMember>(&path).await?;
        log::debug!("Group {} has {} members", group.id, members.len());

        for member in &members {
            state.add_relationship(create_group_member_relationship(group, member))?;
        }
        state.add_relationships(create_user_group_relationships(group, &members))?;
    }
    Ok(())
}
