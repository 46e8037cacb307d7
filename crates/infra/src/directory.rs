//! Static lookup adapters for businesses and products.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ledgerpost_core::{AccountId, BusinessId, DomainError, DomainResult, ProductId};
use ledgerpost_documents::{BusinessContext, BusinessDirectory, ProductCatalog, ValuationAccounts};
use ledgerpost_inventory::ProductType;

#[derive(Debug, Default, Clone)]
pub struct StaticBusinessDirectory {
    businesses: HashMap<BusinessId, BusinessContext>,
}

impl StaticBusinessDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_business(mut self, context: BusinessContext) -> Self {
        self.insert(context);
        self
    }

    pub fn insert(&mut self, context: BusinessContext) {
        self.businesses.insert(context.business_id, context);
    }
}

impl BusinessDirectory for StaticBusinessDirectory {
    fn resolve_business(&self, business_id: BusinessId) -> DomainResult<BusinessContext> {
        self.businesses
            .get(&business_id)
            .cloned()
            .ok_or_else(|| DomainError::lookup(format!("business {business_id} not found")))
    }
}

fn tracked_by_default() -> bool {
    true
}

/// Product master entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub product_id: ProductId,
    #[serde(default = "tracked_by_default")]
    pub track_inventory: bool,
    #[serde(default)]
    pub purchase_account_id: Option<AccountId>,
    #[serde(default)]
    pub inventory_account_id: Option<AccountId>,
}

#[derive(Debug, Default, Clone)]
pub struct StaticProductCatalog {
    products: HashMap<ProductId, ProductEntry>,
}

impl StaticProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, entry: ProductEntry) -> Self {
        self.insert(entry);
        self
    }

    pub fn insert(&mut self, entry: ProductEntry) {
        self.products.insert(entry.product_id, entry);
    }

    fn entry(&self, product_id: ProductId) -> DomainResult<&ProductEntry> {
        self.products
            .get(&product_id)
            .ok_or_else(|| DomainError::lookup(format!("product {product_id} not found")))
    }
}

impl ProductCatalog for StaticProductCatalog {
    /// Only goods carry stock; services and digital products never do.
    fn needs_inventory_tracking(
        &self,
        product_id: ProductId,
        product_type: ProductType,
    ) -> DomainResult<bool> {
        if product_type != ProductType::Goods {
            return Ok(false);
        }
        Ok(self.entry(product_id)?.track_inventory)
    }

    fn product_valuation_accounts(
        &self,
        product_id: ProductId,
        _product_type: ProductType,
    ) -> DomainResult<Option<ValuationAccounts>> {
        let entry = self.entry(product_id)?;
        if entry.purchase_account_id.is_none() && entry.inventory_account_id.is_none() {
            return Ok(None);
        }
        Ok(Some(ValuationAccounts {
            purchase_account_id: entry.purchase_account_id,
            inventory_account_id: entry.inventory_account_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_are_never_tracked() {
        let product = ProductId::new();
        let catalog = StaticProductCatalog::new().with_product(ProductEntry {
            product_id: product,
            track_inventory: true,
            purchase_account_id: None,
            inventory_account_id: None,
        });
        assert!(catalog.needs_inventory_tracking(product, ProductType::Goods).unwrap());
        assert!(!catalog.needs_inventory_tracking(product, ProductType::Service).unwrap());
        assert!(catalog.product_valuation_accounts(product, ProductType::Goods).unwrap().is_none());
    }

    #[test]
    fn unknown_entries_are_lookup_errors() {
        let err = StaticProductCatalog::new()
            .needs_inventory_tracking(ProductId::new(), ProductType::Goods)
            .unwrap_err();
        assert!(matches!(err, DomainError::Lookup(_)));

        let err = StaticBusinessDirectory::new()
            .resolve_business(BusinessId::new())
            .unwrap_err();
        assert!(matches!(err, DomainError::Lookup(_)));
    }
}
