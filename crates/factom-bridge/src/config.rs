//! Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Pricing denominator must be positive")]
    ZeroDenominator,
}

/// Minimum escrow per requested factoshi, as the ratio `numerator / denominator` wei.
///
/// A request is accepted when `escrowed_value * denominator >= requested_amount * numerator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub numerator: u128,
    pub denominator: u128,
}

impl Default for PricingRule {
    /// Any positive escrow is accepted
    fn default() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }
}

impl PricingRule {
    pub fn covers(&self, escrowed_value: u128, requested_amount: u64) -> bool {
        let offered = escrowed_value.checked_mul(self.denominator);
        let required = u128::from(requested_amount).checked_mul(self.numerator);
        match (offered, required) {
            (Some(offered), Some(required)) => offered >= required,
            // Offered side overflowed: it exceeds any representable requirement
            (None, Some(_)) => true,
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub pricing: PricingRule,
    /// Capacity of the bridge event broadcast channel
    pub events_capacity: usize,
    /// Capacity of the bridge server request channel
    pub api_requests_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            pricing: PricingRule::default(),
            events_capacity: 256,
            api_requests_capacity: 1000,
        }
    }
}

impl BridgeConfig {
    /// Load the configuration from a JSON file. Missing fields take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&data)?;
        if config.pricing.denominator == 0 {
            return Err(ConfigError::ZeroDenominator);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_pricing_rule() {
        // 10 gwei per factoshi
        let rule = PricingRule {
            numerator: 10_000_000_000,
            denominator: 1,
        };
        assert!(rule.covers(365_000_000_000_000_000_000, 36_500_000_000));
        assert!(!rule.covers(364_999_999_999_999_999_999, 36_500_000_000));
        assert!(PricingRule::default().covers(1, u64::MAX));
        assert!(rule.covers(u128::MAX, u64::MAX));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pricing": {{"numerator": 3, "denominator": 2}}}}"#
        )
        .unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.pricing,
            PricingRule {
                numerator: 3,
                denominator: 2
            }
        );
        assert_eq!(config.events_capacity, 256);
    }

    #[test]
    fn test_from_file_rejects_zero_denominator() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"pricing": {{"numerator": 3, "denominator": 0}}}}"#
        )
        .unwrap();
        assert!(matches!(
            BridgeConfig::from_file(file.path()),
            Err(ConfigError::ZeroDenominator)
        ));
    }
}
