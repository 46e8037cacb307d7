//! Change-event orchestration (Create / Update / Delete).
//!
//! ## Event flow
//!
//! ```text
//! ChangeEvent
//!   ↓
//! 1. Resolve compiler (by reference type) and business context
//!   ↓  ── one ledger transaction from here ──
//! 2. Update/Delete: reverse the active journal and stock rows of the old version
//!   ↓
//! 3. Create/Update: compile the new snapshot, persist journal + stock rows
//!   ↓
//! 4. Route the stock batch (old reversals + new rows) through valuation
//!   ↓
//! 5. Recompute balances for every touched account
//!   ↓
//! 6. Mark the event record processed
//! ```
//!
//! Any failure aborts the transaction, so no partial journal or stock row is
//! ever visible. The failure is then recorded on the event record in a
//! separate transaction and the event stays unprocessed for redelivery.
//!
//! There is one workflow for every document kind; per-kind behaviour comes
//! from the `DocumentCompiler` registered for the event's reference type.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use ledgerpost_core::{
    AccountId, BranchId, CurrencyId, DocumentKind, DomainError, DomainResult, EventId, JournalId,
};
use ledgerpost_documents::{
    BusinessContext, BusinessDirectory, CompiledDocument, DocumentCompiler, ProductCatalog,
    SourceDocument, default_compilers,
};
use ledgerpost_events::{ChangeEvent, EventAction, EventRecord};
use ledgerpost_inventory::{StockHistory, StockRouter, ValuationEngine, merge_accounts};

use crate::balances::{BalanceRecompute, BalanceRecomputer};
use crate::config::DispatcherConfig;
use crate::reversal::{DocumentReversal, ReversalEngine};
use crate::store::{LedgerStore, LedgerTx};

/// Step of the event flow an error came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStep {
    ResolveCompiler,
    ResolveBusiness,
    Decode,
    Reverse,
    Compile,
    Persist,
    Route,
    Recompute,
    Acknowledge,
    Transaction,
}

impl DispatchStep {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchStep::ResolveCompiler => "resolve_compiler",
            DispatchStep::ResolveBusiness => "resolve_business",
            DispatchStep::Decode => "decode",
            DispatchStep::Reverse => "reverse",
            DispatchStep::Compile => "compile",
            DispatchStep::Persist => "persist",
            DispatchStep::Route => "route",
            DispatchStep::Recompute => "recompute",
            DispatchStep::Acknowledge => "acknowledge",
            DispatchStep::Transaction => "transaction",
        }
    }
}

impl core::fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed event, with the document kind and the step that failed.
#[derive(Debug, Error)]
pub struct DispatchError {
    /// `None` only for failures of the store itself.
    pub kind: Option<DocumentKind>,
    pub step: DispatchStep,
    #[source]
    pub source: DomainError,
}

impl DispatchError {
    pub fn new(kind: DocumentKind, step: DispatchStep, source: DomainError) -> Self {
        Self {
            kind: Some(kind),
            step,
            source,
        }
    }
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{kind} failed at {}: {}", self.step, self.source),
            None => write!(f, "event failed at {}: {}", self.step, self.source),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(source: DomainError) -> Self {
        Self {
            kind: None,
            step: DispatchStep::Transaction,
            source,
        }
    }
}

/// Tag a domain result with the document kind and step.
trait StepContext<T> {
    fn at(self, kind: DocumentKind, step: DispatchStep) -> Result<T, DispatchError>;
}

impl<T> StepContext<T> for DomainResult<T> {
    fn at(self, kind: DocumentKind, step: DispatchStep) -> Result<T, DispatchError> {
        self.map_err(|e| DispatchError::new(kind, step, e))
    }
}

/// What a successfully processed event wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub event_id: EventId,
    pub action: EventAction,
    /// New journal for Create/Update, reversal journal for Delete.
    pub journal_id: JournalId,
    pub touched_accounts: Vec<AccountId>,
    pub stock_rows_written: usize,
    pub recomputes: Vec<BalanceRecompute>,
}

/// Reusable event processing engine.
///
/// Generic over the store so tests and replay run against
/// `InMemoryLedgerStore`; every other collaborator is an injected port.
pub struct EventDispatcher<S> {
    store: S,
    directory: Arc<dyn BusinessDirectory>,
    catalog: Arc<dyn ProductCatalog>,
    valuation: Arc<dyn ValuationEngine + Send + Sync>,
    balances: Arc<dyn BalanceRecomputer>,
    compilers: HashMap<DocumentKind, Arc<dyn DocumentCompiler>>,
    reversal: ReversalEngine,
    config: DispatcherConfig,
}

impl<S> EventDispatcher<S> {
    pub fn new(
        store: S,
        directory: Arc<dyn BusinessDirectory>,
        catalog: Arc<dyn ProductCatalog>,
        valuation: Arc<dyn ValuationEngine + Send + Sync>,
        balances: Arc<dyn BalanceRecomputer>,
    ) -> Self {
        let compilers = default_compilers()
            .into_iter()
            .map(|c| (c.kind(), c))
            .collect();
        Self {
            store,
            directory,
            catalog,
            valuation,
            balances,
            compilers,
            reversal: ReversalEngine::new(),
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace (or add) the compiler for its kind.
    pub fn with_compiler(mut self, compiler: Arc<dyn DocumentCompiler>) -> Self {
        self.compilers.insert(compiler.kind(), compiler);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn compiler(&self, kind: DocumentKind) -> Result<&Arc<dyn DocumentCompiler>, DispatchError> {
        self.compilers.get(&kind).ok_or_else(|| {
            DispatchError::new(
                kind,
                DispatchStep::ResolveCompiler,
                DomainError::lookup(format!("no compiler registered for {kind}")),
            )
        })
    }
}

/// Ledger coordinates of one balance recompute.
struct PostingPoint {
    branch_id: BranchId,
    date: NaiveDate,
    foreign_currency_id: Option<CurrencyId>,
}

impl PostingPoint {
    fn of_compiled(compiled: &CompiledDocument) -> Self {
        Self {
            branch_id: compiled.journal.branch_id,
            date: compiled.journal.date,
            foreign_currency_id: compiled.foreign_currency_id,
        }
    }

    fn of_reversal(reversal: &DocumentReversal) -> Self {
        Self {
            branch_id: reversal.branch_id,
            date: reversal.date,
            foreign_currency_id: reversal.foreign_currency_id,
        }
    }

    fn request(&self, context: &BusinessContext, account_ids: Vec<AccountId>) -> BalanceRecompute {
        BalanceRecompute {
            business_id: context.business_id,
            base_currency_id: context.base_currency_id,
            branch_id: self.branch_id,
            account_ids,
            as_of: self.date,
            foreign_currency_id: self.foreign_currency_id,
        }
    }

    fn same_as(&self, other: &PostingPoint) -> bool {
        self.branch_id == other.branch_id
            && self.date == other.date
            && self.foreign_currency_id == other.foreign_currency_id
    }
}

impl<S> EventDispatcher<S>
where
    S: LedgerStore,
{
    /// Process one change event atomically.
    #[instrument(
        skip_all,
        fields(
            event_id = %event.event_id(),
            action = %event.action(),
            reference_type = %event.reference_type(),
        )
    )]
    pub fn dispatch(&self, event: &ChangeEvent) -> Result<DispatchOutcome, DispatchError> {
        let now = Utc::now();
        match self.process(event, now) {
            Ok(outcome) => {
                info!(
                    journal_id = %outcome.journal_id,
                    touched_accounts = outcome.touched_accounts.len(),
                    stock_rows = outcome.stock_rows_written,
                    "event processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(step = %err.step, error = %err, "event failed");
                self.record_failure(event, &err, now);
                Err(err)
            }
        }
    }

    fn process(
        &self,
        event: &ChangeEvent,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = event.reference_type();
        let compiler = self.compiler(kind)?.as_ref();
        let context = self
            .directory
            .resolve_business(event.business_id())
            .at(kind, DispatchStep::ResolveBusiness)?;

        self.store.transaction(|tx| {
            let outcome = match event.action() {
                EventAction::Create => self.handle_create(tx, compiler, &context, event, now)?,
                EventAction::Update => self.handle_update(tx, compiler, &context, event, now)?,
                EventAction::Delete => self.handle_delete(tx, compiler, &context, event)?,
            };

            let mut record = tx
                .event_record(event.event_id())
                .at(kind, DispatchStep::Acknowledge)?
                .unwrap_or_else(|| EventRecord::received(event, now));
            record.mark_processed(Some(outcome.journal_id), now);
            tx.save_event_record(record).at(kind, DispatchStep::Acknowledge)?;

            Ok(outcome)
        })
    }

    fn handle_create(
        &self,
        tx: &mut dyn LedgerTx,
        compiler: &dyn DocumentCompiler,
        context: &BusinessContext,
        event: &ChangeEvent,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = compiler.kind();
        let document = parse(compiler, event.require_new())?;
        let compiled = self.compile_and_persist(tx, compiler, &document, context, now)?;

        let batch = compiled.stock_rows.clone();
        let routed = StockRouter::new(&*self.valuation)
            .route(tx.stock_ledger(), batch, &compiled.touched_accounts)
            .at(kind, DispatchStep::Route)?;

        let point = PostingPoint::of_compiled(&compiled);
        let recomputes = vec![point.request(context, routed.touched_accounts.clone())];
        self.recompute(tx, kind, &recomputes)?;

        Ok(DispatchOutcome {
            event_id: event.event_id(),
            action: event.action(),
            journal_id: compiled.journal.id,
            touched_accounts: routed.touched_accounts,
            stock_rows_written: compiled.stock_rows.len(),
            recomputes,
        })
    }

    fn handle_delete(
        &self,
        tx: &mut dyn LedgerTx,
        compiler: &dyn DocumentCompiler,
        context: &BusinessContext,
        event: &ChangeEvent,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = compiler.kind();
        let old = parse(compiler, event.require_old())?;
        let reversal = self
            .reversal
            .reverse_document(tx, old.reference(), &self.config.delete_reason)
            .at(kind, DispatchStep::Reverse)?;

        let routed = StockRouter::new(&*self.valuation)
            .route(
                tx.stock_ledger(),
                reversal.stock_reversals.clone(),
                reversal.touched_accounts(),
            )
            .at(kind, DispatchStep::Route)?;

        let point = PostingPoint::of_reversal(&reversal);
        let recomputes = vec![point.request(context, routed.touched_accounts.clone())];
        self.recompute(tx, kind, &recomputes)?;

        Ok(DispatchOutcome {
            event_id: event.event_id(),
            action: event.action(),
            journal_id: reversal.journal.journal_id(),
            touched_accounts: routed.touched_accounts,
            stock_rows_written: reversal.stock_reversals.len(),
            recomputes,
        })
    }

    fn handle_update(
        &self,
        tx: &mut dyn LedgerTx,
        compiler: &dyn DocumentCompiler,
        context: &BusinessContext,
        event: &ChangeEvent,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = compiler.kind();
        let old = parse(compiler, event.require_old())?;
        let new = parse(compiler, event.require_new())?;
        if old.reference() != new.reference() {
            return Err(DispatchError::new(
                kind,
                DispatchStep::Decode,
                DomainError::validation(format!(
                    "update moves {} to {}",
                    old.reference(),
                    new.reference()
                )),
            ));
        }

        let reversal = self
            .reversal
            .reverse_document(tx, old.reference(), &self.config.update_reason)
            .at(kind, DispatchStep::Reverse)?;
        let compiled = self.compile_and_persist(tx, compiler, &new, context, now)?;

        // Old-version reversals and new-version rows are valued in one pass.
        let mut batch: Vec<StockHistory> = reversal.stock_reversals.clone();
        batch.extend(compiled.stock_rows.iter().cloned());
        let mut known = reversal.touched_accounts().to_vec();
        merge_accounts(&mut known, compiled.touched_accounts.iter().copied());
        let routed = StockRouter::new(&*self.valuation)
            .route(tx.stock_ledger(), batch, &known)
            .at(kind, DispatchStep::Route)?;

        let old_point = PostingPoint::of_reversal(&reversal);
        let new_point = PostingPoint::of_compiled(&compiled);
        let recomputes = if old_point.same_as(&new_point) {
            vec![new_point.request(context, routed.touched_accounts.clone())]
        } else {
            let mut old_accounts = reversal.touched_accounts().to_vec();
            merge_accounts(&mut old_accounts, routed.valuation_accounts.iter().copied());
            let mut new_accounts = compiled.touched_accounts.clone();
            merge_accounts(&mut new_accounts, routed.valuation_accounts.iter().copied());
            vec![
                old_point.request(context, old_accounts),
                new_point.request(context, new_accounts),
            ]
        };
        self.recompute(tx, kind, &recomputes)?;

        Ok(DispatchOutcome {
            event_id: event.event_id(),
            action: event.action(),
            journal_id: compiled.journal.id,
            touched_accounts: routed.touched_accounts,
            stock_rows_written: reversal.stock_reversals.len() + compiled.stock_rows.len(),
            recomputes,
        })
    }

    fn compile_and_persist(
        &self,
        tx: &mut dyn LedgerTx,
        compiler: &dyn DocumentCompiler,
        document: &SourceDocument,
        context: &BusinessContext,
        now: DateTime<Utc>,
    ) -> Result<CompiledDocument, DispatchError> {
        let kind = compiler.kind();
        let compiled = compiler
            .compile(document, context, self.catalog.as_ref(), now)
            .at(kind, DispatchStep::Compile)?;

        tx.insert_journal(compiled.journal.clone())
            .at(kind, DispatchStep::Persist)?;
        for row in &compiled.stock_rows {
            tx.insert_stock_row(row.clone()).at(kind, DispatchStep::Persist)?;
        }
        Ok(compiled)
    }

    fn recompute(
        &self,
        tx: &mut dyn LedgerTx,
        kind: DocumentKind,
        requests: &[BalanceRecompute],
    ) -> Result<(), DispatchError> {
        for request in requests {
            self.balances
                .recompute(tx.journal_ledger(), request)
                .at(kind, DispatchStep::Recompute)?;
        }
        Ok(())
    }

    /// Count the failed attempt on the event record. Runs in its own
    /// transaction because the event's transaction has been rolled back.
    fn record_failure(&self, event: &ChangeEvent, err: &DispatchError, now: DateTime<Utc>) {
        let result: DomainResult<()> = self.store.transaction(|tx| {
            let mut record = tx
                .event_record(event.event_id())?
                .unwrap_or_else(|| EventRecord::received(event, now));
            record.record_failure(err.to_string());
            tx.save_event_record(record)
        });
        if let Err(e) = result {
            warn!(error = %e, "could not record event failure");
        }
    }
}

fn parse(
    compiler: &dyn DocumentCompiler,
    snapshot: DomainResult<&serde_json::Value>,
) -> Result<SourceDocument, DispatchError> {
    let kind = compiler.kind();
    compiler
        .parse_snapshot(snapshot.at(kind, DispatchStep::Decode)?)
        .at(kind, DispatchStep::Decode)
}
