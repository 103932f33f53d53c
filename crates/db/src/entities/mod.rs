//! `SeaORM` entity definitions.

pub mod group_balances;
pub mod group_members;
pub mod groups;
pub mod transaction_entries;
pub mod transactions;
pub mod users;

pub mod prelude {
    //! Entity re-exports.

    pub use super::group_balances::Entity as GroupBalances;
    pub use super::group_members::Entity as GroupMembers;
    pub use super::groups::Entity as Groups;
    pub use super::transaction_entries::Entity as TransactionEntries;
    pub use super::transactions::Entity as Transactions;
    pub use super::users::Entity as Users;
}
