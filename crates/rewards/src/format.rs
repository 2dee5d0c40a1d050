// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Human-readable renderings of base-unit amounts and share prices.

use alloy_primitives::{utils::format_units, I256, U256};

use crate::{history::SharePrice, BASE_UNIT_DECIMALS};

/// Digits after the decimal point when rendering a share price.
pub const SHARE_PRICE_PRECISION: u8 = 18;

/// Format base units as whole tokens, e.g. `1500000000` as `1.500000000`.
pub fn format_base_units(value: U256) -> String {
    format_units(value, BASE_UNIT_DECIMALS).unwrap_or_else(|_| value.to_string())
}

/// Format signed base units as whole tokens, keeping the sign of losses.
pub fn format_signed_base_units(value: I256) -> String {
    format_units(value, BASE_UNIT_DECIMALS).unwrap_or_else(|_| value.to_string())
}

impl SharePrice {
    /// Render the price with `precision` decimals, rounded down.
    ///
    /// This is the only place the ratio is divided.
    pub fn to_decimal_string(&self, precision: u8) -> String {
        if self.active_shares.is_zero() {
            return "0".to_string();
        }

        let scale = U256::from(10u64).pow(U256::from(precision));
        match self.active_balance.checked_mul(scale) {
            Some(scaled) => {
                let price = scaled / self.active_shares;
                format_units(price, precision).unwrap_or_else(|_| price.to_string())
            }
            // Only reachable for balances near the top of the 256-bit range.
            None => (self.active_balance / self.active_shares).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_base_units() {
        assert_eq!(format_base_units(U256::from(1_500_000_000u64)), "1.500000000");
        assert_eq!(format_base_units(U256::from(1u64)), "0.000000001");
        assert_eq!(format_base_units(U256::ZERO), "0.000000000");
    }

    #[test]
    fn test_format_signed_base_units() {
        assert_eq!(format_signed_base_units(I256::try_from(-100).unwrap()), "-0.000000100");
        assert_eq!(
            format_signed_base_units(I256::try_from(2_250_000_000i64).unwrap()),
            "2.250000000"
        );
    }

    #[test]
    fn test_share_price_decimal() {
        let price = SharePrice { active_balance: U256::from(3), active_shares: U256::from(2) };
        assert_eq!(price.to_decimal_string(4), "1.5000");

        let price = SharePrice { active_balance: U256::from(1), active_shares: U256::from(3) };
        assert_eq!(price.to_decimal_string(6), "0.333333");

        let price = SharePrice::default();
        assert_eq!(price.to_decimal_string(SHARE_PRICE_PRECISION), "0");
    }
}
