//! Document → ledger compilation shared by every document kind.
//!
//! ## Algorithm
//!
//! 1. Resolve the system accounts the kind needs (control, discount, tax, adjustment).
//! 2. Apply the currency rule: stated totals are foreign when the document is not in
//!    the base currency, and base = foreign × exchange rate.
//! 3. Post the control total, then discount, tax and adjustment when nonzero.
//! 4. Accumulate line net values per target account (first-seen order) and post one
//!    line per account on the kind's detail side.
//! 5. Emit a stock row for every line whose product is inventory-tracked.
//! 6. For value-reducing kinds, emit zero-amount valuation placeholders for products
//!    with separate purchase/inventory accounts.
//!
//! The result is validated to balance in both currencies before it is returned.
//! Persisting it is the caller's job, inside the caller's transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::debug;

use ledgerpost_accounting::{AccountJournal, JournalDraft, JournalHeader, PostingAccumulator};
use ledgerpost_core::{
    AccountId, CurrencyId, CurrencyTranslation, DocumentKind, DomainError, DomainResult,
    JournalId, Side, StockRowId,
};
use ledgerpost_inventory::{StockHistory, StockReference, StockRowDraft};

use crate::model::{DetailLine, SourceDocument};
use crate::ports::{BusinessContext, ProductCatalog, SystemAccount};

/// Whether a kind brings stock in or sends it out.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockSign {
    Receive,
    Issue,
}

impl StockSign {
    pub fn apply(self, quantity: Decimal) -> Decimal {
        match self {
            StockSign::Receive => quantity,
            StockSign::Issue => -quantity,
        }
    }
}

/// Sides of the zero-amount valuation placeholders.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlaceholderSides {
    pub inventory: Side,
    pub purchase: Side,
}

/// Per-kind parameters of the shared algorithm.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompilePolicy {
    pub control: SystemAccount,
    pub control_side: Side,
    pub discount: SystemAccount,
    pub stock_sign: StockSign,
    pub valuation_placeholders: Option<PlaceholderSides>,
}

impl CompilePolicy {
    /// Expense-like kinds debit their detail accounts, revenue-like kinds credit them.
    pub fn detail_side(&self) -> Side {
        self.control_side.opposite()
    }
}

/// Ledger state produced for one document version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDocument {
    pub journal: AccountJournal,
    pub stock_rows: Vec<StockHistory>,
    pub touched_accounts: Vec<AccountId>,
    pub foreign_currency_id: Option<CurrencyId>,
}

/// Capability implemented once per document kind.
pub trait DocumentCompiler: Send + Sync {
    fn kind(&self) -> DocumentKind;

    fn policy(&self) -> CompilePolicy;

    fn parse_snapshot(&self, snapshot: &JsonValue) -> DomainResult<SourceDocument>;

    fn compile(
        &self,
        document: &SourceDocument,
        context: &BusinessContext,
        catalog: &dyn ProductCatalog,
        now: DateTime<Utc>,
    ) -> DomainResult<CompiledDocument> {
        if document.kind != self.kind() {
            return Err(DomainError::validation(format!(
                "{} compiler cannot compile a {} document",
                self.kind(),
                document.kind
            )));
        }
        compile_document(&self.policy(), document, context, catalog, now)
    }
}

pub fn compile_document(
    policy: &CompilePolicy,
    document: &SourceDocument,
    context: &BusinessContext,
    catalog: &dyn ProductCatalog,
    now: DateTime<Utc>,
) -> DomainResult<CompiledDocument> {
    let h = &document.header;
    let translation =
        CurrencyTranslation::resolve(context.base_currency_id, h.currency_id, h.exchange_rate)?;
    let detail_side = policy.detail_side();

    let mut draft = JournalDraft::new(
        JournalHeader {
            business_id: context.business_id,
            reference: document.reference(),
            branch_id: h.branch_id,
            date: h.date,
            description: Some(document.description()),
        },
        translation,
    );

    let control = context.system_account(policy.control)?;
    draft.post(control, policy.control_side, h.control_total)?;
    if !h.discount_total.is_zero() {
        let account = context.system_account(policy.discount)?;
        draft.post(account, policy.control_side, h.discount_total)?;
    }
    if !h.tax_total.is_zero() {
        let account = context.system_account(SystemAccount::TaxPayable)?;
        draft.post(account, detail_side, h.tax_total)?;
    }
    if !h.adjustment.is_zero() {
        let account = context.system_account(SystemAccount::Adjustment)?;
        draft.post(account, detail_side, h.adjustment)?;
    }

    let mut by_account = PostingAccumulator::new();
    let mut inventory_placeholders: Vec<AccountId> = Vec::new();
    let mut purchase_placeholders: Vec<AccountId> = Vec::new();
    let mut stock_rows = Vec::new();

    for line in &document.lines {
        let account = target_account(document.kind, line)?;
        by_account.add(account, line.net_value(h.tax_inclusive));

        let Some(product) = line.product else {
            continue;
        };
        if !catalog.needs_inventory_tracking(product.product_id, product.product_type)? {
            continue;
        }

        let unit_value = translation.translate(line.unit_rate)?.base;
        if !line.quantity.is_zero() {
            stock_rows.push(StockHistory::new(
                StockRowId::new(),
                StockRowDraft {
                    business_id: context.business_id,
                    warehouse_id: line.warehouse_id.or(h.warehouse_id),
                    product_id: product.product_id,
                    product_type: product.product_type,
                    batch: line.batch.clone(),
                    stock_date: h.date,
                    quantity: policy.stock_sign.apply(line.quantity),
                    unit_value,
                    description: document.description(),
                    reference: StockReference {
                        kind: document.kind,
                        document_id: h.id,
                        detail_id: Some(line.id),
                    },
                },
                now,
            ));
        }

        if policy.valuation_placeholders.is_some() {
            let accounts = catalog
                .product_valuation_accounts(product.product_id, product.product_type)?
                .and_then(|a| a.separate());
            if let Some((purchase, inventory)) = accounts {
                if !inventory_placeholders.contains(&inventory) {
                    inventory_placeholders.push(inventory);
                }
                if !purchase_placeholders.contains(&purchase) {
                    purchase_placeholders.push(purchase);
                }
            }
        }
    }

    for (account, amount) in by_account {
        draft.post(account, detail_side, amount)?;
    }
    if let Some(sides) = policy.valuation_placeholders {
        for account in inventory_placeholders {
            draft.post_placeholder(account, sides.inventory);
        }
        for account in purchase_placeholders {
            draft.post_placeholder(account, sides.purchase);
        }
    }

    let journal = draft.finish(JournalId::new(), now)?;
    let touched_accounts = journal.touched_accounts();
    debug!(
        kind = %document.kind,
        document_id = %h.id,
        postings = journal.transactions.len(),
        stock_rows = stock_rows.len(),
        "compiled document"
    );

    Ok(CompiledDocument {
        touched_accounts,
        foreign_currency_id: translation.foreign_currency(),
        stock_rows,
        journal,
    })
}

fn target_account(kind: DocumentKind, line: &DetailLine) -> DomainResult<AccountId> {
    line.account_id
        .filter(|a| !a.as_uuid().is_nil())
        .ok_or_else(|| {
            DomainError::lookup(format!("{kind} line {} has no target account", line.id))
        })
}
