//! Tiered cashback policy.

use paysnap_types::HbdAmount;

use crate::config::NodeConfig;

/// Pure payout calculation: purchase ordinal and invoice amount in, cashback out.
#[derive(Clone, Debug, PartialEq)]
pub struct CashbackPolicy {
    /// Rates for the 1st, 2nd and 3rd purchase.
    rates: [f64; 3],
    invoice_cap: HbdAmount,
}

impl CashbackPolicy {
    pub fn new(rates: [f64; 3], invoice_cap: HbdAmount) -> Self {
        Self { rates, invoice_cap }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            [config.rates.first, config.rates.second, config.rates.third],
            config.invoice_cap(),
        )
    }

    /// Rate for the `purchase_num`-th purchase; zero past the last tier.
    pub fn rate_for(&self, purchase_num: u32) -> f64 {
        match purchase_num {
            1..=3 => self.rates[(purchase_num - 1) as usize],
            _ => 0.0,
        }
    }

    /// `round(min(amount, cap) * rate, 3)` in HBD.
    pub fn calculate(&self, purchase_num: u32, amount: HbdAmount) -> HbdAmount {
        let capped = amount.min(self.invoice_cap);
        capped.scaled_by(self.rate_for(purchase_num))
    }
}

impl Default for CashbackPolicy {
    fn default() -> Self {
        Self::from_config(&NodeConfig::default())
    }
}
