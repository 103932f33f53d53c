//! `SeaORM` Entity for transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub group_id: Uuid,
    /// `expense`, `settlement`, `refund` or `adjustment`.
    pub transaction_type: String,
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub currency: String,
    pub transaction_date: DateTimeWithTimeZone,
    pub split_type: Option<String>,
    pub category: Option<String>,
    pub notes: Option<String>,
    /// `open`, `pending` or `completed`.
    pub status: String,
    pub settled_at: Option<DateTimeWithTimeZone>,
    pub settlement_method: Option<String>,
    pub proof_of_payment: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub updated_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id"
    )]
    Groups,
    #[sea_orm(has_many = "super::transaction_entries::Entity")]
    TransactionEntries,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::transaction_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
