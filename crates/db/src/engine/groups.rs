//! Group lifecycle: creation, membership and soft deletion.

use std::collections::BTreeSet;

use sea_orm::DatabaseConnection;
use splitledger_core::ledger::{LedgerError, LedgerResult, LedgerService};
use splitledger_core::ports::{UserDirectory, UserInfo};
use splitledger_shared::types::{CurrencyCode, GroupId, UserId};

use crate::error::db_err;
use crate::repositories::{GroupRecord, GroupRepository, UserRepository};

/// Currency assigned when a group is created without one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Input for creating a group.
#[derive(Debug, Clone, Default)]
pub struct CreateGroupInput {
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Three-letter currency code; defaults to USD.
    pub currency: Option<String>,
    /// Creator, always the first member.
    pub created_by: UserId,
    /// Additional members. Unknown users and duplicates are skipped.
    pub members: Vec<UserId>,
}

/// Input for renaming or re-describing a group.
#[derive(Debug, Clone, Default)]
pub struct UpdateGroupInput {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
}

/// Group management service.
#[derive(Debug, Clone)]
pub struct GroupService {
    groups: GroupRepository,
    users: UserRepository,
}

impl GroupService {
    /// Creates a new group service.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            groups: GroupRepository::new(db.clone()),
            users: UserRepository::new(db),
        }
    }

    /// Creates a group with the creator as its first member.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGroupName`, `InvalidCurrency` or `UserNotFound` for
    /// the creator.
    pub async fn create_group(&self, input: CreateGroupInput) -> LedgerResult<GroupRecord> {
        let name = LedgerService::validate_group_name(&input.name)?;
        let raw_currency = input.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
        let currency = CurrencyCode::parse(raw_currency)
            .map_err(|_| LedgerError::InvalidCurrency(raw_currency.to_string()))?;
        self.users.get_user(input.created_by).await?;

        let mut seen = BTreeSet::from([input.created_by]);
        let mut members = vec![input.created_by];
        for user_id in input.members {
            if !seen.insert(user_id) {
                continue;
            }
            if self.users.find_by_id(user_id).await.map_err(db_err)?.is_none() {
                tracing::debug!(user_id = %user_id, "skipping unknown initial member");
                continue;
            }
            members.push(user_id);
        }

        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        let record = self
            .groups
            .create(&name, description, &currency, input.created_by, &members)
            .await?;

        tracing::info!(
            group_id = %record.info.id,
            created_by = %input.created_by,
            members = record.info.members.len(),
            "group created"
        );
        Ok(record)
    }

    /// Loads an active group the caller belongs to.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` or `NotGroupMember`.
    pub async fn get_group(&self, group_id: GroupId, caller: UserId) -> LedgerResult<GroupRecord> {
        let record = self.active(group_id).await?;
        LedgerService::ensure_member(&record.info, caller)?;
        Ok(record)
    }

    /// Adds an existing user to a group. Any member may add.
    ///
    /// # Errors
    ///
    /// Returns `NotGroupMember` for the caller, `UserNotFound` or
    /// `AlreadyMember`.
    pub async fn add_member(
        &self,
        group_id: GroupId,
        caller: UserId,
        user_id: UserId,
    ) -> LedgerResult<GroupRecord> {
        let record = self.get_group(group_id, caller).await?;
        self.users.get_user(user_id).await?;
        if record.info.is_member(user_id) {
            return Err(LedgerError::AlreadyMember(user_id));
        }

        self.groups.add_member(group_id, user_id).await.map_err(db_err)?;
        tracing::info!(group_id = %group_id, user_id = %user_id, added_by = %caller, "member added");
        self.active(group_id).await
    }

    /// Removes a member. Creator only; the creator cannot be removed.
    ///
    /// The member's ledger row stays in place.
    ///
    /// # Errors
    ///
    /// Returns `NotCreator`, `CannotRemoveCreator` or `NotGroupMember` if
    /// `user_id` is not in the group.
    pub async fn remove_member(
        &self,
        group_id: GroupId,
        caller: UserId,
        user_id: UserId,
    ) -> LedgerResult<()> {
        let record = self.get_group(group_id, caller).await?;
        ensure_creator(&record, caller, "remove members")?;
        if user_id == record.info.created_by {
            return Err(LedgerError::CannotRemoveCreator);
        }
        LedgerService::ensure_member(&record.info, user_id)?;

        self.groups
            .remove_member(group_id, user_id)
            .await
            .map_err(db_err)?;
        tracing::info!(group_id = %group_id, user_id = %user_id, "member removed");
        Ok(())
    }

    /// Updates name and description. Creator only.
    ///
    /// An input with no fields returns the group unchanged.
    ///
    /// # Errors
    ///
    /// Returns `NotCreator` or `InvalidGroupName`.
    pub async fn update_group(
        &self,
        group_id: GroupId,
        caller: UserId,
        input: UpdateGroupInput,
    ) -> LedgerResult<GroupRecord> {
        let record = self.get_group(group_id, caller).await?;
        ensure_creator(&record, caller, "update group details")?;

        let name = input
            .name
            .as_deref()
            .map(LedgerService::validate_group_name)
            .transpose()?;
        let description = input.description.as_deref().map(str::trim);
        if name.is_none() && description.is_none() {
            return Ok(record);
        }

        self.groups
            .update_details(group_id, name.as_deref(), description)
            .await
            .map_err(db_err)?;
        tracing::info!(group_id = %group_id, "group updated");
        self.active(group_id).await
    }

    /// Soft-deletes a group. Creator only.
    ///
    /// # Errors
    ///
    /// Returns `NotCreator`.
    pub async fn delete_group(&self, group_id: GroupId, caller: UserId) -> LedgerResult<()> {
        let record = self.get_group(group_id, caller).await?;
        ensure_creator(&record, caller, "delete the group")?;

        self.groups.soft_delete(group_id).await.map_err(db_err)?;
        tracing::info!(group_id = %group_id, "group deleted");
        Ok(())
    }

    /// Lists the active groups a user belongs to, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Database` if the query fails.
    pub async fn list_user_groups(&self, user_id: UserId) -> LedgerResult<Vec<GroupRecord>> {
        Ok(self.groups.list_for_user(user_id).await?)
    }

    /// Lists member profiles in join order.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` or `NotGroupMember`.
    pub async fn list_members(
        &self,
        group_id: GroupId,
        caller: UserId,
    ) -> LedgerResult<Vec<UserInfo>> {
        let record = self.get_group(group_id, caller).await?;
        let mut members = Vec::with_capacity(record.info.members.len());
        for user_id in record.info.members {
            if let Some(user) = self.users.find_by_id(user_id).await.map_err(db_err)? {
                members.push(user);
            }
        }
        Ok(members)
    }

    async fn active(&self, group_id: GroupId) -> LedgerResult<GroupRecord> {
        match self.groups.find_by_id(group_id).await? {
            Some(record) if record.is_active => Ok(record),
            _ => Err(LedgerError::GroupNotFound(group_id)),
        }
    }
}

fn ensure_creator(record: &GroupRecord, caller: UserId, action: &'static str) -> LedgerResult<()> {
    if record.info.created_by == caller {
        Ok(())
    } else {
        Err(LedgerError::NotCreator { action })
    }
}
