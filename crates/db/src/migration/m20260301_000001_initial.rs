//! Initial schema: users, groups, members, transactions and the balance ledger.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

/// Scale of every money column.
const MONEY_SCALE: u32 = 4;

/// Precision of money columns. The SQLite backend rejects more than 16 digits.
fn money_precision(backend: DatabaseBackend) -> u32 {
    match backend {
        DatabaseBackend::Sqlite => 16,
        _ => 19,
    }
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let precision = money_precision(manager.get_database_backend());

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Name).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Users::Email)
                            .string_len(255)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Groups::Description).text().null())
                    .col(ColumnDef::new(Groups::Currency).string_len(3).not_null())
                    .col(ColumnDef::new(Groups::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Groups::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Groups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Groups::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_groups_created_by")
                            .from(Groups::Table, Groups::CreatedBy)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(GroupMembers::GroupId).uuid().not_null())
                    .col(ColumnDef::new(GroupMembers::UserId).uuid().not_null())
                    .col(ColumnDef::new(GroupMembers::Position).integer().not_null())
                    .col(
                        ColumnDef::new(GroupMembers::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(GroupMembers::GroupId)
                            .col(GroupMembers::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_members_group")
                            .from(GroupMembers::Table, GroupMembers::GroupId)
                            .to(Groups::Table, Groups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_members_user")
                            .from(GroupMembers::Table, GroupMembers::UserId)
                            .to(Users::Table, Users::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup of a user's groups
        manager
            .create_index(
                Index::create()
                    .name("idx_group_members_user")
                    .table(GroupMembers::Table)
                    .col(GroupMembers::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::GroupId).uuid().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Description)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Amount)
                            .decimal_len(precision, MONEY_SCALE)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::Currency)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::TransactionDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::SplitType).string_len(20).null())
                    .col(ColumnDef::new(Transactions::Category).string_len(100).null())
                    .col(ColumnDef::new(Transactions::Notes).text().null())
                    .col(
                        ColumnDef::new(Transactions::Status)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::SettledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::SettlementMethod)
                            .string_len(50)
                            .null(),
                    )
                    .col(ColumnDef::new(Transactions::ProofOfPayment).text().null())
                    .col(ColumnDef::new(Transactions::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::UpdatedBy).uuid().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_group")
                            .from(Transactions::Table, Transactions::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Group history in date order
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_group_date")
                    .table(Transactions::Table)
                    .col(Transactions::GroupId)
                    .col(Transactions::TransactionDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TransactionEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionEntries::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TransactionEntries::TransactionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TransactionEntries::GroupId).uuid().not_null())
                    .col(ColumnDef::new(TransactionEntries::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(TransactionEntries::UserName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionEntries::Side)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionEntries::Amount)
                            .decimal_len(precision, MONEY_SCALE)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TransactionEntries::Position)
                            .integer()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_entries_transaction")
                            .from(TransactionEntries::Table, TransactionEntries::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transaction_entries_transaction")
                    .table(TransactionEntries::Table)
                    .col(TransactionEntries::TransactionId)
                    .to_owned(),
            )
            .await?;

        // Cross-group history of one user
        manager
            .create_index(
                Index::create()
                    .name("idx_transaction_entries_user")
                    .table(TransactionEntries::Table)
                    .col(TransactionEntries::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GroupBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupBalances::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GroupBalances::GroupId).uuid().not_null())
                    .col(ColumnDef::new(GroupBalances::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(GroupBalances::UserName)
                            .string_len(100)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::Currency)
                            .string_len(3)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::TotalPaid)
                            .decimal_len(precision, MONEY_SCALE)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::TotalOwed)
                            .decimal_len(precision, MONEY_SCALE)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::Balance)
                            .decimal_len(precision, MONEY_SCALE)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::LastTransactionId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::LastUpdated)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupBalances::Version)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_balances_group")
                            .from(GroupBalances::Table, GroupBalances::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One ledger row per (group, user); losing an insert race trips this
        manager
            .create_index(
                Index::create()
                    .name("uq_group_balances_group_user")
                    .table(GroupBalances::Table)
                    .col(GroupBalances::GroupId)
                    .col(GroupBalances::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_balances_user")
                    .table(GroupBalances::Table)
                    .col(GroupBalances::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupBalances::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(TransactionEntries::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GroupMembers::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Groups::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Name,
    Email,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Id,
    Name,
    Description,
    Currency,
    CreatedBy,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GroupMembers {
    Table,
    GroupId,
    UserId,
    Position,
    JoinedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    GroupId,
    TransactionType,
    Description,
    Amount,
    Currency,
    TransactionDate,
    SplitType,
    Category,
    Notes,
    Status,
    SettledAt,
    SettlementMethod,
    ProofOfPayment,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
    UpdatedBy,
}

#[derive(DeriveIden)]
enum TransactionEntries {
    Table,
    Id,
    TransactionId,
    GroupId,
    UserId,
    UserName,
    Side,
    Amount,
    Position,
}

#[derive(DeriveIden)]
enum GroupBalances {
    Table,
    Id,
    GroupId,
    UserId,
    UserName,
    Currency,
    TotalPaid,
    TotalOwed,
    Balance,
    LastTransactionId,
    LastUpdated,
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Migrator;
    use sea_orm_migration::sea_orm::{ConnectOptions, Database};

    #[test]
    fn test_money_precision_per_backend() {
        assert_eq!(money_precision(DatabaseBackend::Postgres), 19);
        assert_eq!(money_precision(DatabaseBackend::Sqlite), 16);
    }

    #[tokio::test]
    async fn test_migration_round_trip_on_sqlite() {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();

        Migrator::up(&db, None).await.unwrap();
        Migrator::down(&db, None).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let manager = SchemaManager::new(&db);
        assert!(manager.has_table("group_balances").await.unwrap());
        assert!(manager.has_table("transaction_entries").await.unwrap());
    }
}
