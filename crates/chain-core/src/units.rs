// chain-core/src/units.rs

//! Ether denominations

use crate::{ChainError, ChainResult, U256};

/// Wei per gwei
pub const GWEI: u64 = 1_000_000_000;

/// Parse a decimal ether amount ("0.1", "2") into wei
pub fn parse_ether(amount: &str) -> ChainResult<U256> {
    ethers_core::utils::parse_ether(amount.trim())
        .map_err(|e| ChainError::InvalidParams(format!("invalid ether amount '{amount}': {e}")))
}

/// Format wei as a decimal ether string
pub fn format_ether(wei: U256) -> String {
    ethers_core::utils::format_ether(wei)
}

/// Whole ether to wei
pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(18)
}

/// Whole gwei to wei
pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::from(GWEI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ether() {
        assert_eq!(parse_ether("1").unwrap(), ether(1));
        assert_eq!(parse_ether("0.1").unwrap(), U256::exp10(17));
        assert_eq!(parse_ether(" 2 ").unwrap(), ether(2));
        assert!(parse_ether("one").is_err());
    }

    #[test]
    fn test_format_ether() {
        assert!(format_ether(ether(1)).starts_with("1."));
        assert!(format_ether(U256::exp10(17)).starts_with("0.1"));
    }

    #[test]
    fn test_gwei() {
        assert_eq!(gwei(1), U256::from(1_000_000_000u64));
    }

    proptest::proptest! {
        #[test]
        fn fractional_ether_parses_exactly(whole in 0u64..1_000_000, milli in 0u64..1000) {
            let parsed = parse_ether(&format!("{whole}.{milli:03}")).unwrap();
            proptest::prop_assert_eq!(parsed, ether(whole) + U256::from(milli) * U256::exp10(15));
        }
    }
}
