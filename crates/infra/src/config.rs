//! Configuration loading and representation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledgerpost_documents::BusinessContext;

use crate::directory::{ProductEntry, StaticBusinessDirectory, StaticProductCatalog};

/// Env var naming the replay config file.
pub const CONFIG_ENV: &str = "LEDGERPOST_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "ledgerpost.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_update_reason() -> String {
    "Document updated".to_string()
}

fn default_delete_reason() -> String {
    "Document deleted".to_string()
}

/// Reasons written on stock reversals made by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_update_reason")]
    pub update_reason: String,
    #[serde(default = "default_delete_reason")]
    pub delete_reason: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            update_reason: default_update_reason(),
            delete_reason: default_delete_reason(),
        }
    }
}

/// Businesses, products and dispatcher settings for a replay run.
///
/// ```toml
/// [dispatcher]
/// update_reason = "Edited upstream"
///
/// [[businesses]]
/// business_id = "0190..."
/// base_currency_id = "0190..."
/// timezone = "Asia/Karachi"
/// [businesses.system_accounts]
/// accounts_payable = "0190..."
///
/// [[products]]
/// product_id = "0190..."
/// track_inventory = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub businesses: Vec<BusinessContext>,
    #[serde(default)]
    pub products: Vec<ProductEntry>,
}

impl ReplayConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Config path from `LEDGERPOST_CONFIG`, falling back to `ledgerpost.toml`.
    pub fn path_from_env() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn directory(&self) -> StaticBusinessDirectory {
        let mut directory = StaticBusinessDirectory::new();
        for business in &self.businesses {
            directory.insert(business.clone());
        }
        directory
    }

    pub fn catalog(&self) -> StaticProductCatalog {
        let mut catalog = StaticProductCatalog::new();
        for product in &self.products {
            catalog.insert(product.clone());
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerpost_core::{AccountId, BusinessId, CurrencyId, ProductId};
    use ledgerpost_documents::{BusinessDirectory, ProductCatalog, SystemAccount};
    use ledgerpost_inventory::ProductType;

    #[test]
    fn parses_businesses_and_products() {
        let business = BusinessId::new();
        let currency = CurrencyId::new();
        let payable = AccountId::new();
        let product = ProductId::new();
        let raw = format!(
            r#"
            [dispatcher]
            delete_reason = "Voided"

            [[businesses]]
            business_id = "{business}"
            base_currency_id = "{currency}"
            timezone = "UTC"

            [businesses.system_accounts]
            accounts_payable = "{payable}"

            [[products]]
            product_id = "{product}"
            "#
        );

        let config = ReplayConfig::from_toml_str(&raw).unwrap();
        assert_eq!(config.dispatcher.delete_reason, "Voided");
        assert_eq!(config.dispatcher.update_reason, "Document updated");

        let ctx = config.directory().resolve_business(business).unwrap();
        assert_eq!(ctx.system_account(SystemAccount::AccountsPayable).unwrap(), payable);
        assert!(config.catalog().needs_inventory_tracking(product, ProductType::Goods).unwrap());
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let err = ReplayConfig::from_toml_str("[[businesses]]\nbusiness_id = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
