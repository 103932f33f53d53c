//! Shared fixtures for database integration tests.
//!
//! Every test gets its own in-memory `SQLite` database with the schema
//! applied. The pool holds a single connection so the database lives as long
//! as the pool does.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use splitledger_core::ledger::{CreateExpenseInput, CreateSettlementInput, PayerInput, SplitSpec};
use splitledger_core::notification::{Notification, NotificationDispatcher, NotificationError};
use splitledger_db::engine::{CreateGroupInput, GroupService, TransactionEngine};
use splitledger_db::migration::{Migrator, MigratorTrait};
use splitledger_db::UserRepository;
use splitledger_shared::config::LedgerConfig;
use splitledger_shared::types::{GroupId, UserId};

/// Dispatcher that keeps every notification it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

/// Dispatcher that always fails.
pub struct FailingNotifier;

#[async_trait]
impl NotificationDispatcher for FailingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::NoChannel(notification.user_id))
    }
}

pub struct TestContext {
    pub db: DatabaseConnection,
    pub engine: TransactionEngine,
    pub groups: GroupService,
    pub users: UserRepository,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn connect() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options)
        .await
        .expect("Failed to open in-memory database");
    Migrator::up(&db, None).await.expect("Failed to run migrations");
    db
}

pub async fn setup() -> TestContext {
    setup_with(LedgerConfig::default()).await
}

pub async fn setup_with(config: LedgerConfig) -> TestContext {
    let db = connect().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = TransactionEngine::new(db.clone(), config)
        .with_notifier(Arc::clone(&notifier) as Arc<dyn NotificationDispatcher>);
    TestContext {
        groups: GroupService::new(db.clone()),
        users: UserRepository::new(db.clone()),
        engine,
        notifier,
        db,
    }
}

impl TestContext {
    /// Creates a user with a unique address.
    pub async fn user(&self, name: &str) -> UserId {
        let email = format!("{}-{}@example.com", name.to_lowercase(), uuid::Uuid::new_v4());
        self.users
            .create(name, &email)
            .await
            .expect("Failed to create user")
            .id
    }

    /// Creates a USD group owned by `creator` with the given extra members.
    pub async fn group(&self, creator: UserId, members: &[UserId]) -> GroupId {
        self.groups
            .create_group(CreateGroupInput {
                name: "Flat".to_string(),
                description: None,
                currency: Some("USD".to_string()),
                created_by: creator,
                members: members.to_vec(),
            })
            .await
            .expect("Failed to create group")
            .info
            .id
    }

    /// Users A, B, C (ascending ids) and a group holding all three.
    pub async fn trio(&self) -> (GroupId, UserId, UserId, UserId) {
        let a = self.user("Alice").await;
        let b = self.user("Bob").await;
        let c = self.user("Carol").await;
        let group = self.group(a, &[b, c]).await;
        (group, a, b, c)
    }

    pub async fn balance_of(&self, group: GroupId, user: UserId) -> Decimal {
        self.engine
            .get_group_balances(group, user)
            .await
            .expect("Failed to load balances")
            .into_iter()
            .find(|r| r.user_id == user)
            .map_or(Decimal::ZERO, |r| r.balance)
    }
}

/// An expense paid in full by `payer` and split evenly.
pub fn equal_expense(
    group_id: GroupId,
    payer: UserId,
    amount: Decimal,
    split: &[UserId],
) -> CreateExpenseInput {
    CreateExpenseInput {
        group_id,
        created_by: payer,
        description: "Dinner".to_string(),
        amount,
        currency: None,
        date: None,
        payers: vec![PayerInput {
            user_id: payer,
            amount,
        }],
        split: SplitSpec::Equal(split.to_vec()),
        category: None,
        notes: None,
        completed: false,
    }
}

/// A pending settlement recorded by the payer.
pub fn settlement(
    group_id: GroupId,
    payer: UserId,
    payee: UserId,
    amount: Decimal,
) -> CreateSettlementInput {
    CreateSettlementInput {
        group_id,
        created_by: payer,
        payer_id: payer,
        payee_id: payee,
        amount,
        currency: None,
        date: None,
        notes: None,
        completed: false,
    }
}
