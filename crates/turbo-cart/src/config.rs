//! Store configuration.

use crate::cart::MAX_QUANTITY_PER_LINE;
use crate::error::CartError;
use crate::money::Currency;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Namespace the guest cart is persisted under.
pub const DEFAULT_GUEST_NAMESPACE: &str = "cart:guest";

/// Tunables for a [`CartStore`](crate::store::CartStore).
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Currency every line must be priced in.
    pub currency: Currency,
    /// Local storage key holding the guest cart.
    pub guest_namespace: String,
    /// Upper bound on the quantity of a single line.
    pub max_quantity_per_line: u32,
    /// Initial state of the apply-credit toggle.
    pub apply_credit_by_default: bool,
    /// Re-read the credit when a mutation lifts the cart over its minimum.
    pub refresh_credit_on_eligibility: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            guest_namespace: DEFAULT_GUEST_NAMESPACE.to_string(),
            max_quantity_per_line: MAX_QUANTITY_PER_LINE,
            apply_credit_by_default: false,
            refresh_credit_on_eligibility: true,
        }
    }
}

impl StoreConfig {
    /// Load from a file. `.json` files are parsed as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CartError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CartError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str::<Self>(&content).map_err(|e| {
                CartError::Config(format!("failed to parse JSON {}: {}", path.display(), e))
            })?
        } else {
            Self::from_toml_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CartError> {
        let config: Self =
            toml::from_str(content).map_err(|e| CartError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), CartError> {
        if self.max_quantity_per_line == 0 {
            return Err(CartError::Config(
                "max_quantity_per_line must be at least 1".to_string(),
            ));
        }
        if self.guest_namespace.trim().is_empty() {
            return Err(CartError::Config("guest_namespace must not be empty".to_string()));
        }
        Ok(())
    }
}
