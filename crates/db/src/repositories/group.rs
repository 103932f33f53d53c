//! Group repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use splitledger_core::ledger::{LedgerError, LedgerResult};
use splitledger_core::ports::{GroupDirectory, GroupInfo};
use splitledger_shared::types::{CurrencyCode, GroupId, UserId};

use super::{from_db_time, to_db_time};
use crate::entities::{group_members, groups};
use crate::error::{RepositoryError, RepositoryResult, db_err};

/// A group with its lifecycle fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Ledger-facing snapshot.
    pub info: GroupInfo,
    /// Free-form description.
    pub description: Option<String>,
    /// False once soft-deleted.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change to name, description or membership.
    pub updated_at: DateTime<Utc>,
}

/// Group repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct GroupRepository {
    db: DatabaseConnection,
}

impl GroupRepository {
    /// Creates a new group repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a group by ID, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is malformed.
    pub async fn find_by_id(&self, id: GroupId) -> RepositoryResult<Option<GroupRecord>> {
        let Some(group) = groups::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let members = self.members(id).await?;
        to_record(group, members).map(Some)
    }

    /// Lists members in join order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn members(&self, id: GroupId) -> Result<Vec<UserId>, DbErr> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(id.into_inner()))
            .order_by_asc(group_members::Column::Position)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(|m| UserId::from_uuid(m.user_id)).collect())
    }

    /// Inserts a group and its initial members in one transaction.
    ///
    /// `members` must already include the creator, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails.
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        currency: &CurrencyCode,
        created_by: UserId,
        members: &[UserId],
    ) -> RepositoryResult<GroupRecord> {
        let now = to_db_time(Utc::now());
        let id = GroupId::new();

        let txn = self.db.begin().await?;

        let group = groups::ActiveModel {
            id: Set(id.into_inner()),
            name: Set(name.to_string()),
            description: Set(description.map(ToString::to_string)),
            currency: Set(currency.as_str().to_string()),
            created_by: Set(created_by.into_inner()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for (position, user_id) in (0i32..).zip(members) {
            group_members::ActiveModel {
                group_id: Set(id.into_inner()),
                user_id: Set(user_id.into_inner()),
                position: Set(position),
                joined_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        to_record(group, members.to_vec())
    }

    /// Appends a member after the current last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn add_member(&self, group_id: GroupId, user_id: UserId) -> Result<(), DbErr> {
        let txn = self.db.begin().await?;

        let last = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.into_inner()))
            .order_by_desc(group_members::Column::Position)
            .limit(1)
            .one(&txn)
            .await?;
        let now = to_db_time(Utc::now());

        group_members::ActiveModel {
            group_id: Set(group_id.into_inner()),
            user_id: Set(user_id.into_inner()),
            position: Set(last.map_or(0, |m| m.position + 1)),
            joined_at: Set(now),
        }
        .insert(&txn)
        .await?;
        touch(&txn, group_id, now).await?;

        txn.commit().await
    }

    /// Removes a member. Returns false if they were not a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn remove_member(&self, group_id: GroupId, user_id: UserId) -> Result<bool, DbErr> {
        let txn = self.db.begin().await?;
        let result = group_members::Entity::delete_many()
            .filter(group_members::Column::GroupId.eq(group_id.into_inner()))
            .filter(group_members::Column::UserId.eq(user_id.into_inner()))
            .exec(&txn)
            .await?;
        touch(&txn, group_id, to_db_time(Utc::now())).await?;
        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }

    /// Updates name and description.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_details(
        &self,
        group_id: GroupId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), DbErr> {
        let mut update = groups::Entity::update_many()
            .col_expr(groups::Column::UpdatedAt, Expr::value(to_db_time(Utc::now())))
            .filter(groups::Column::Id.eq(group_id.into_inner()));
        if let Some(name) = name {
            update = update.col_expr(groups::Column::Name, Expr::value(name));
        }
        if let Some(description) = description {
            update = update.col_expr(groups::Column::Description, Expr::value(description));
        }
        update.exec(&self.db).await?;
        Ok(())
    }

    /// Flags a group inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn soft_delete(&self, group_id: GroupId) -> Result<(), DbErr> {
        groups::Entity::update_many()
            .col_expr(groups::Column::IsActive, Expr::value(false))
            .col_expr(groups::Column::UpdatedAt, Expr::value(to_db_time(Utc::now())))
            .filter(groups::Column::Id.eq(group_id.into_inner()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Lists the active groups a user belongs to, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a row is malformed.
    pub async fn list_for_user(&self, user_id: UserId) -> RepositoryResult<Vec<GroupRecord>> {
        let group_ids: Vec<uuid::Uuid> = group_members::Entity::find()
            .filter(group_members::Column::UserId.eq(user_id.into_inner()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.group_id)
            .collect();

        let rows = groups::Entity::find()
            .filter(groups::Column::Id.is_in(group_ids))
            .filter(groups::Column::IsActive.eq(true))
            .order_by_desc(groups::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for group in rows {
            let members = self.members(GroupId::from_uuid(group.id)).await?;
            out.push(to_record(group, members)?);
        }
        Ok(out)
    }

    /// Lists the ids of every active group, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn active_ids(&self) -> Result<Vec<GroupId>, DbErr> {
        let ids = groups::Entity::find()
            .select_only()
            .column(groups::Column::Id)
            .filter(groups::Column::IsActive.eq(true))
            .order_by_asc(groups::Column::CreatedAt)
            .into_tuple::<uuid::Uuid>()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().map(GroupId::from_uuid).collect())
    }
}

#[async_trait]
impl GroupDirectory for GroupRepository {
    async fn is_member(&self, group_id: GroupId, user_id: UserId) -> LedgerResult<bool> {
        let active = groups::Entity::find_by_id(group_id.into_inner())
            .filter(groups::Column::IsActive.eq(true))
            .count(&self.db)
            .await
            .map_err(db_err)?;
        if active == 0 {
            return Ok(false);
        }
        let member = group_members::Entity::find_by_id((group_id.into_inner(), user_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(member.is_some())
    }

    async fn get_group(&self, group_id: GroupId) -> LedgerResult<GroupInfo> {
        match self.find_by_id(group_id).await? {
            Some(record) if record.is_active => Ok(record.info),
            _ => Err(LedgerError::GroupNotFound(group_id)),
        }
    }
}

async fn touch<C: sea_orm::ConnectionTrait>(
    conn: &C,
    group_id: GroupId,
    now: sea_orm::prelude::DateTimeWithTimeZone,
) -> Result<(), DbErr> {
    groups::Entity::update_many()
        .col_expr(groups::Column::UpdatedAt, Expr::value(now))
        .filter(groups::Column::Id.eq(group_id.into_inner()))
        .exec(conn)
        .await?;
    Ok(())
}

fn to_record(group: groups::Model, members: Vec<UserId>) -> RepositoryResult<GroupRecord> {
    let currency = CurrencyCode::parse(&group.currency)
        .map_err(|e| RepositoryError::corrupt("groups", group.id, e.to_string()))?;
    Ok(GroupRecord {
        info: GroupInfo {
            id: GroupId::from_uuid(group.id),
            name: group.name,
            currency,
            created_by: UserId::from_uuid(group.created_by),
            members,
        },
        description: group.description,
        is_active: group.is_active,
        created_at: from_db_time(group.created_at),
        updated_at: from_db_time(group.updated_at),
    })
}
