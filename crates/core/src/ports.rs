//! Interfaces to collaborators the ledger does not own.
//!
//! Group membership and user profiles live outside the ledger; the engine
//! only reads them through these traits, so tests and other storage backends
//! can supply their own implementations.

use async_trait::async_trait;
use splitledger_shared::types::{CurrencyCode, GroupId, UserId};

use crate::ledger::LedgerResult;

/// Snapshot of a group as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Group id.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Currency every transaction defaults to.
    pub currency: CurrencyCode,
    /// Creator; always a member.
    pub created_by: UserId,
    /// Members in join order.
    pub members: Vec<UserId>,
}

impl GroupInfo {
    /// Returns true if `user_id` belongs to the group.
    #[must_use]
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }
}

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// User id.
    pub id: UserId,
    /// Display name copied onto transaction lines and balance rows.
    pub name: String,
    /// Contact address.
    pub email: String,
}

/// Read access to group membership.
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Returns true if the user belongs to the active group.
    async fn is_member(&self, group_id: GroupId, user_id: UserId) -> LedgerResult<bool>;

    /// Loads an active group.
    ///
    /// # Errors
    ///
    /// Returns `GroupNotFound` when the group is missing or soft-deleted.
    async fn get_group(&self, group_id: GroupId) -> LedgerResult<GroupInfo>;
}

/// Read access to user profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Loads a user.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` when no such user exists.
    async fn get_user(&self, user_id: UserId) -> LedgerResult<UserInfo>;
}
