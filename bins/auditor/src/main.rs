//! Ledger audit job for Splitledger.
//!
//! Replays every transaction of a group and compares the result with the
//! stored ledger rows. With `--repair`, drifted groups are rebuilt.
//!
//! Exits non-zero when drift remains unrepaired.

use anyhow::{Context, bail};
use clap::Parser;
use splitledger_core::ledger::{LedgerResult, parse_id};
use splitledger_db::engine::AuditReport;
use splitledger_db::{GroupRepository, TransactionEngine, connect_with};
use splitledger_shared::AppConfig;
use splitledger_shared::config::LoggingConfig;
use splitledger_shared::types::GroupId;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "auditor")]
#[command(about = "Replays group transactions and checks the stored ledger rows")]
struct Args {
    /// Audit only this group (default: every active group)
    #[arg(long, value_parser = parse_group_id)]
    group: Option<GroupId>,

    /// Rebuild groups whose ledger drifted
    #[arg(long)]
    repair: bool,
}

fn parse_group_id(raw: &str) -> LedgerResult<GroupId> {
    parse_id("group", raw)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let db = connect_with(&config.database).await?;
    info!("Connected to database");

    let groups = match args.group {
        Some(group_id) => vec![group_id],
        None => GroupRepository::new(db.clone()).active_ids().await?,
    };
    let engine = TransactionEngine::new(db, config.ledger.clone());

    let mut unresolved = 0usize;
    for group_id in groups {
        let report = engine.audit_group_balances(group_id).await?;
        if report.is_clean() {
            info!(group_id = %group_id, transactions = report.transactions, "ledger consistent");
            continue;
        }
        log_drift(&report);

        if args.repair {
            let summary = engine.repair_group_balances(group_id).await?;
            info!(
                group_id = %group_id,
                corrected = summary.corrected.len(),
                rows_written = summary.rows_written,
                "ledger rebuilt"
            );
        } else {
            unresolved += 1;
        }
    }

    if unresolved > 0 {
        error!(groups = unresolved, "ledger drift left unrepaired");
        bail!("{unresolved} group(s) have drifted ledgers; rerun with --repair");
    }
    Ok(())
}

fn log_drift(report: &AuditReport) {
    if !report.stored_conserved {
        warn!(group_id = %report.group_id, "stored balances do not sum to zero");
    }
    for drift in &report.drift {
        warn!(
            group_id = %report.group_id,
            user_id = %drift.user_id,
            stored = %drift.stored.balance(),
            expected = %drift.expected.balance(),
            difference = %drift.net_difference(),
            "balance drift"
        );
    }
}
