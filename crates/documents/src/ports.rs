//! Lookup ports the compilers depend on (business settings, product master).
//!
//! These are injected rather than looked up globally so compilers can be
//! exercised with in-memory fakes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ledgerpost_core::{AccountId, BusinessId, CurrencyId, DomainError, DomainResult, ProductId};
use ledgerpost_inventory::ProductType;

/// Fixed accounts a compiler resolves through the business's system-account map.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAccount {
    AccountsPayable,
    AccountsReceivable,
    TaxPayable,
    PurchaseDiscount,
    SalesDiscount,
    Adjustment,
    InventoryAsset,
}

impl SystemAccount {
    pub fn code(self) -> &'static str {
        match self {
            SystemAccount::AccountsPayable => "accounts_payable",
            SystemAccount::AccountsReceivable => "accounts_receivable",
            SystemAccount::TaxPayable => "tax_payable",
            SystemAccount::PurchaseDiscount => "purchase_discount",
            SystemAccount::SalesDiscount => "sales_discount",
            SystemAccount::Adjustment => "adjustment",
            SystemAccount::InventoryAsset => "inventory_asset",
        }
    }
}

/// Per-business settings, read-only for the duration of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessContext {
    pub business_id: BusinessId,
    pub base_currency_id: CurrencyId,
    pub timezone: String,
    /// System-account code -> account id.
    #[serde(default)]
    pub system_accounts: BTreeMap<String, AccountId>,
}

impl BusinessContext {
    pub fn system_account(&self, account: SystemAccount) -> DomainResult<AccountId> {
        self.system_accounts
            .get(account.code())
            .copied()
            .filter(|id| !id.as_uuid().is_nil())
            .ok_or_else(|| {
                DomainError::lookup(format!(
                    "business {} has no '{}' system account",
                    self.business_id,
                    account.code()
                ))
            })
    }
}

/// Purchase/inventory accounts configured on a product.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuationAccounts {
    pub purchase_account_id: Option<AccountId>,
    pub inventory_account_id: Option<AccountId>,
}

impl ValuationAccounts {
    /// Both accounts present and distinct.
    pub fn separate(&self) -> Option<(AccountId, AccountId)> {
        match (self.purchase_account_id, self.inventory_account_id) {
            (Some(p), Some(i)) if p != i => Some((p, i)),
            _ => None,
        }
    }
}

pub trait BusinessDirectory: Send + Sync {
    fn resolve_business(&self, business_id: BusinessId) -> DomainResult<BusinessContext>;
}

pub trait ProductCatalog: Send + Sync {
    fn needs_inventory_tracking(
        &self,
        product_id: ProductId,
        product_type: ProductType,
    ) -> DomainResult<bool>;

    fn product_valuation_accounts(
        &self,
        product_id: ProductId,
        product_type: ProductType,
    ) -> DomainResult<Option<ValuationAccounts>>;
}

impl<D> BusinessDirectory for Arc<D>
where
    D: BusinessDirectory + ?Sized,
{
    fn resolve_business(&self, business_id: BusinessId) -> DomainResult<BusinessContext> {
        (**self).resolve_business(business_id)
    }
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn needs_inventory_tracking(
        &self,
        product_id: ProductId,
        product_type: ProductType,
    ) -> DomainResult<bool> {
        (**self).needs_inventory_tracking(product_id, product_type)
    }

    fn product_valuation_accounts(
        &self,
        product_id: ProductId,
        product_type: ProductType,
    ) -> DomainResult<Option<ValuationAccounts>> {
        (**self).product_valuation_accounts(product_id, product_type)
    }
}
