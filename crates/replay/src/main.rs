use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use ledgerpost_accounting::AccountJournal;
use ledgerpost_events::{ChangeEvent, EventRecord};
use ledgerpost_infra::{
    BalanceRecompute, DispatchOutcome, EventDispatcher, InMemoryLedgerStore, JournalBalanceBook,
    LedgerStore, MovingAverageValuation, ReplayConfig,
};
use ledgerpost_inventory::StockHistory;
use ledgerpost_observability::LogConfig;

mod cli;

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum LineResult {
    Processed(DispatchOutcome),
    Failed { line: usize, error: String },
    Skipped { line: usize, event_id: String },
}

#[derive(Serialize)]
struct Summary {
    processed: usize,
    failed: usize,
    skipped: usize,
    results: Vec<LineResult>,
    event_records: Vec<EventRecord>,
    balance_recomputes: Vec<BalanceRecompute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    journals: Option<Vec<AccountJournal>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stock_rows: Option<Vec<StockHistory>>,
}

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    ledgerpost_observability::init_with(&LogConfig::from_env().with_format(cli.log_format.into()));

    let config_path = cli.config.clone().unwrap_or_else(ReplayConfig::path_from_env);
    let config = ReplayConfig::load(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    info!(
        businesses = config.businesses.len(),
        products = config.products.len(),
        "config loaded"
    );

    let catalog = Arc::new(config.catalog());
    let store = Arc::new(InMemoryLedgerStore::new());
    let balances = Arc::new(JournalBalanceBook::new());
    let dispatcher = EventDispatcher::new(
        store.clone(),
        Arc::new(config.directory()),
        catalog.clone(),
        Arc::new(MovingAverageValuation::new(catalog)),
        balances.clone(),
    )
    .with_config(config.dispatcher.clone());

    let file = File::open(&cli.events)
        .with_context(|| format!("opening events {}", cli.events.display()))?;

    let mut results = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let event: ChangeEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "undecodable event");
                results.push(LineResult::Failed {
                    line: line_no,
                    error: e.to_string(),
                });
                continue;
            }
        };

        // Redelivered events are dropped here; the dispatcher does not dedupe.
        let processed = store
            .read(|tx| tx.event_record(event.event_id()))?
            .is_some_and(|r| r.processed);
        if processed {
            results.push(LineResult::Skipped {
                line: line_no,
                event_id: event.event_id().to_string(),
            });
            continue;
        }

        match dispatcher.dispatch(&event) {
            Ok(outcome) => results.push(LineResult::Processed(outcome)),
            Err(e) => results.push(LineResult::Failed {
                line: line_no,
                error: e.to_string(),
            }),
        }
    }

    let count = |f: fn(&LineResult) -> bool| results.iter().filter(|r| f(r)).count();
    let (journals, stock_rows) = if cli.dump_ledgers {
        (Some(store.journals()?), Some(store.stock_rows()?))
    } else {
        (None, None)
    };
    let summary = Summary {
        processed: count(|r| matches!(r, LineResult::Processed(_))),
        failed: count(|r| matches!(r, LineResult::Failed { .. })),
        skipped: count(|r| matches!(r, LineResult::Skipped { .. })),
        event_records: store.event_records()?,
        balance_recomputes: balances.requests()?,
        results,
        journals,
        stock_rows,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
