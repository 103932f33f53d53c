//! User repository for database operations.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use splitledger_core::ledger::{LedgerError, LedgerResult};
use splitledger_core::ports::{UserDirectory, UserInfo};
use splitledger_shared::types::UserId;

use super::to_db_time;
use crate::entities::users;
use crate::error::{db_err, is_unique_violation};

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserInfo>, DbErr> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.db)
            .await?;
        Ok(user.map(to_info))
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<UserInfo>, DbErr> {
        let user = users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?;
        Ok(user.map(to_info))
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateEmail` if the address is taken.
    pub async fn create(&self, name: &str, email: &str) -> LedgerResult<UserInfo> {
        let email = normalize_email(email);
        if self.email_exists(&email).await.map_err(db_err)? {
            return Err(LedgerError::DuplicateEmail(email));
        }

        let user = users::ActiveModel {
            id: Set(UserId::new().into_inner()),
            name: Set(name.trim().to_string()),
            email: Set(email.clone()),
            created_at: Set(to_db_time(Utc::now())),
        };

        match user.insert(&self.db).await {
            Ok(model) => {
                tracing::info!(user_id = %model.id, "user created");
                Ok(to_info(model))
            }
            Err(e) if is_unique_violation(&e) => Err(LedgerError::DuplicateEmail(email)),
            Err(e) => Err(db_err(e)),
        }
    }

    /// Checks if an email is already registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn email_exists(&self, email: &str) -> Result<bool, DbErr> {
        let count = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .count(&self.db)
            .await?;

        Ok(count > 0)
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn get_user(&self, user_id: UserId) -> LedgerResult<UserInfo> {
        self.find_by_id(user_id)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::UserNotFound(user_id))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn to_info(model: users::Model) -> UserInfo {
    UserInfo {
        id: UserId::from_uuid(model.id),
        name: model.name,
        email: model.email,
    }
}
