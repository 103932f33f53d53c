//! Demo data seeder for Splitledger development.
//!
//! Creates three users, a shared flat and a month of typical activity so the
//! ledger, simplifier and audit job have something to chew on. Running it
//! twice is harmless: existing users are reused and the demo group is only
//! created once.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use splitledger_core::ledger::{
    CreateExpenseInput, CreateSettlementInput, PayerInput, ShareInput, SplitSpec,
};
use splitledger_core::ports::UserInfo;
use splitledger_db::engine::CreateGroupInput;
use splitledger_db::{GroupService, TransactionEngine, UserRepository, connect_with};
use splitledger_shared::AppConfig;
use splitledger_shared::types::{GroupId, UserId};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_GROUP: &str = "Demo Flat";

const DEMO_USERS: [(&str, &str); 3] = [
    ("Alice", "alice@splitledger.dev"),
    ("Bob", "bob@splitledger.dev"),
    ("Carol", "carol@splitledger.dev"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let users = UserRepository::new(db.clone());
    let groups = GroupService::new(db.clone());
    let engine = TransactionEngine::new(db, config.ledger.clone());

    let mut ids = Vec::with_capacity(DEMO_USERS.len());
    for (name, email) in DEMO_USERS {
        ids.push(seed_user(&users, name, email).await?.id);
    }
    let [alice, bob, carol] = ids[..] else {
        anyhow::bail!("expected {} demo users", DEMO_USERS.len());
    };

    let existing = groups.list_user_groups(alice).await?;
    if existing.iter().any(|g| g.info.name == DEMO_GROUP) {
        info!("Demo group already exists, skipping");
        return Ok(());
    }

    let group = groups
        .create_group(CreateGroupInput {
            name: DEMO_GROUP.to_string(),
            description: Some("Shared flat expenses".to_string()),
            currency: Some("USD".to_string()),
            created_by: alice,
            members: vec![bob, carol],
        })
        .await?
        .info
        .id;

    seed_activity(&engine, group, alice, bob, carol).await?;

    for suggestion in engine.simplify_debts(group, alice).await? {
        info!(
            payer = %suggestion.payer_name,
            payee = %suggestion.payee_name,
            amount = %suggestion.amount,
            "suggested settlement"
        );
    }
    info!("Seeding complete");
    Ok(())
}

async fn seed_user(users: &UserRepository, name: &str, email: &str) -> anyhow::Result<UserInfo> {
    if let Some(user) = users.find_by_email(email).await? {
        info!(email, "User already exists, reusing");
        return Ok(user);
    }
    let user = users.create(name, email).await?;
    info!(email, "Created user");
    Ok(user)
}

async fn seed_activity(
    engine: &TransactionEngine,
    group_id: GroupId,
    alice: UserId,
    bob: UserId,
    carol: UserId,
) -> anyhow::Result<()> {
    let start = Utc::now() - Duration::days(30);
    let everyone = vec![alice, bob, carol];

    let expense = |created_by: UserId,
                   description: &str,
                   amount: Decimal,
                   day: i64,
                   split: SplitSpec| CreateExpenseInput {
        group_id,
        created_by,
        description: description.to_string(),
        amount,
        currency: None,
        date: Some(start + Duration::days(day)),
        payers: vec![PayerInput {
            user_id: created_by,
            amount,
        }],
        split,
        category: None,
        notes: None,
        completed: false,
    };

    engine
        .create_expense(expense(
            alice,
            "Rent",
            dec!(1500),
            1,
            SplitSpec::Equal(everyone.clone()),
        ))
        .await?;
    engine
        .create_expense(expense(
            bob,
            "Groceries",
            dec!(86.40),
            6,
            SplitSpec::Equal(everyone),
        ))
        .await?;
    engine
        .create_expense(expense(
            carol,
            "Internet",
            dec!(60),
            9,
            SplitSpec::Percentage(vec![
                ShareInput {
                    user_id: alice,
                    value: dec!(50),
                },
                ShareInput {
                    user_id: bob,
                    value: dec!(25),
                },
                ShareInput {
                    user_id: carol,
                    value: dec!(25),
                },
            ]),
        ))
        .await?;
    engine
        .create_expense(expense(
            alice,
            "Cleaning supplies",
            dec!(23.75),
            14,
            SplitSpec::Exact(vec![
                ShareInput {
                    user_id: alice,
                    value: dec!(3.75),
                },
                ShareInput {
                    user_id: bob,
                    value: dec!(10),
                },
                ShareInput {
                    user_id: carol,
                    value: dec!(10),
                },
            ]),
        ))
        .await?;

    engine
        .create_settlement(CreateSettlementInput {
            group_id,
            created_by: bob,
            payer_id: bob,
            payee_id: alice,
            amount: dec!(400),
            currency: None,
            date: Some(start + Duration::days(20)),
            notes: Some("Rent share".to_string()),
            completed: true,
        })
        .await?;

    info!(group_id = %group_id, "Seeded demo activity");
    Ok(())
}
